//! Qualified package names and the symbol interner.
//!
//! Package names are qualified by their owning repo: `@repo/path/to/pkg`.
//! A name without the `@repo/` prefix is resolved against the project's
//! local repo. Repo, package, API, and setting names are heavily reused,
//! so the resolver graphs carry interned symbols rather than strings.

use crate::error::{Error, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A package name, possibly still unqualified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PkgName {
    /// Owning repo, absent until resolved against the local repo.
    repo: Option<String>,
    /// Repo-relative path, e.g. `sys/log/full`.
    path: String,
}

impl PkgName {
    /// Parse `@repo/path/to/pkg` or a bare `path/to/pkg`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::BadName {
                input: s.to_string(),
                reason: "empty name".to_string(),
            });
        }

        if let Some(rest) = s.strip_prefix('@') {
            let (repo, path) = rest.split_once('/').ok_or_else(|| Error::BadName {
                input: s.to_string(),
                reason: "qualified name needs a path after the repo".to_string(),
            })?;
            if repo.is_empty() || path.is_empty() {
                return Err(Error::BadName {
                    input: s.to_string(),
                    reason: "empty repo or path component".to_string(),
                });
            }
            Ok(Self {
                repo: Some(repo.to_string()),
                path: path.to_string(),
            })
        } else {
            Ok(Self {
                repo: None,
                path: s.to_string(),
            })
        }
    }

    /// Build an already-qualified name.
    #[must_use]
    pub fn qualified(repo: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            repo: Some(repo.into()),
            path: path.into(),
        }
    }

    /// Owning repo, if the name is qualified.
    #[must_use]
    pub fn repo(&self) -> Option<&str> {
        self.repo.as_deref()
    }

    /// Repo-relative path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve against the local repo: unqualified names acquire
    /// `local_repo` as their owner, qualified names are unchanged.
    #[must_use]
    pub fn resolve(&self, local_repo: &str) -> Self {
        match &self.repo {
            Some(_) => self.clone(),
            None => Self {
                repo: Some(local_repo.to_string()),
                path: self.path.clone(),
            },
        }
    }

    /// The canonical `@repo/path` spelling; unqualified names render
    /// without the prefix.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PkgName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repo {
            Some(repo) => write!(f, "@{repo}/{}", self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

impl std::str::FromStr for PkgName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// An interned name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sym(u32);

impl Sym {
    /// Index into the interner's table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Symbol interner. Not shared globally: each resolution owns one and
/// threads it through explicitly.
#[derive(Debug, Default)]
pub struct Interner {
    names: Vec<String>,
    map: AHashMap<String, Sym>,
}

impl Interner {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning its symbol. Repeated calls with the same
    /// name return the same symbol.
    pub fn intern(&mut self, name: &str) -> Sym {
        if let Some(&sym) = self.map.get(name) {
            return sym;
        }
        let sym = Sym(u32::try_from(self.names.len()).expect("interner overflow"));
        self.names.push(name.to_string());
        self.map.insert(name.to_string(), sym);
        sym
    }

    /// Look up a symbol's name.
    #[must_use]
    pub fn resolve(&self, sym: Sym) -> &str {
        &self.names[sym.index()]
    }

    /// Look up a name's symbol without interning it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Sym> {
        self.map.get(name).copied()
    }

    /// Number of interned names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// True if nothing has been interned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("@apache-mynewt-core/sys/log", Some("apache-mynewt-core"), "sys/log" ; "qualified")]
    #[test_case("apps/blinky", None, "apps/blinky" ; "unqualified")]
    #[test_case("@r/p", Some("r"), "p" ; "short qualified")]
    fn parse(s: &str, repo: Option<&str>, path: &str) {
        let name = PkgName::parse(s).unwrap();
        assert_eq!(name.repo(), repo);
        assert_eq!(name.path(), path);
    }

    #[test_case("" ; "empty")]
    #[test_case("@repo" ; "qualified without path")]
    #[test_case("@/path" ; "empty repo")]
    fn parse_rejects(s: &str) {
        assert!(PkgName::parse(s).is_err());
    }

    #[test]
    fn resolve_against_local_repo() {
        let name = PkgName::parse("apps/blinky").unwrap();
        let resolved = name.resolve("project");
        assert_eq!(resolved.repo(), Some("project"));
        assert_eq!(resolved.to_string(), "@project/apps/blinky");

        let already = PkgName::parse("@core/sys/log").unwrap();
        assert_eq!(already.resolve("project"), already);
    }

    #[test]
    fn display_roundtrip() {
        for s in ["@core/sys/log", "apps/blinky"] {
            assert_eq!(PkgName::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn interner_dedups() {
        let mut interner = Interner::new();
        let a = interner.intern("sys/log");
        let b = interner.intern("sys/console");
        let a2 = interner.intern("sys/log");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), "sys/log");
        assert_eq!(interner.get("sys/console"), Some(b));
        assert_eq!(interner.get("absent"), None);
        assert_eq!(interner.len(), 2);
    }
}
