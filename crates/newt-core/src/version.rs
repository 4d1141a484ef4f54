//! Version model: numeric triples, stability tags, commit forms, and
//! version requirements.
//!
//! A version is a `(major, minor, revision)` triple plus an optional
//! stability tag and an optional commit string. Ordering is lexicographic
//! on the triple only; stability and commit are informational. A version
//! whose stability tag is not `stable` is *floating* and must be
//! normalised against a repo's version map before it can be compared.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Stability tag of a version specifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    /// Released version; the parse default.
    #[default]
    Stable,
    /// Tip of development.
    Dev,
    /// Most recent release.
    Latest,
}

impl Stability {
    /// Get the tag name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Dev => "dev",
            Self::Latest => "latest",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Stability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stable" => Ok(Self::Stable),
            "dev" => Ok(Self::Dev),
            "latest" => Ok(Self::Latest),
            _ => Err(format!("unknown stability tag: {s}")),
        }
    }
}

/// The numeric view of a version: what ordering and satisfaction act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NumericVersion(pub u64, pub u64, pub u64);

impl fmt::Display for NumericVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// A version: numeric triple + stability tag + optional commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    /// Major component.
    pub major: u64,
    /// Minor component.
    pub minor: u64,
    /// Revision component.
    pub revision: u64,
    /// Stability tag; anything but `stable` marks the version floating.
    #[serde(default)]
    pub stability: Stability,
    /// Commit hash, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl Version {
    /// Create a normalised version from a numeric triple.
    #[must_use]
    pub const fn new(major: u64, minor: u64, revision: u64) -> Self {
        Self {
            major,
            minor,
            revision,
            stability: Stability::Stable,
            commit: None,
        }
    }

    /// The distinguished unspecified version (`0.0.0`). Parsing the empty
    /// string or `none` yields this value.
    #[must_use]
    pub const fn unspecified() -> Self {
        Self::new(0, 0, 0)
    }

    /// Attach a commit hash.
    #[must_use]
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// Attach a stability tag.
    #[must_use]
    pub const fn with_stability(mut self, stability: Stability) -> Self {
        self.stability = stability;
        self
    }

    /// True for the distinguished unspecified version.
    #[must_use]
    pub const fn is_unspecified(&self) -> bool {
        self.major == 0
            && self.minor == 0
            && self.revision == 0
            && matches!(self.stability, Stability::Stable)
    }

    /// A version is floating when its stability tag is not `stable`; it
    /// must be normalised via a repo's version map before comparison.
    #[must_use]
    pub const fn is_floating(&self) -> bool {
        !matches!(self.stability, Stability::Stable)
    }

    /// Numeric view, for ordering.
    #[must_use]
    pub const fn numeric(&self) -> NumericVersion {
        NumericVersion(self.major, self.minor, self.revision)
    }

    /// Lexicographic comparison on the numeric triple. Stability and
    /// commit are ignored; this is a total order on normalised versions.
    #[must_use]
    pub fn cmp_numeric(&self, other: &Self) -> Ordering {
        self.numeric().cmp(&other.numeric())
    }

    /// Parse a version string: `M[.m[.r]][-stability]`.
    ///
    /// Empty input and `none` yield [`Version::unspecified`].
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::unspecified());
        }

        let (nums, stability) = match s.split_once('-') {
            Some((nums, tag)) => {
                let stability = tag
                    .parse::<Stability>()
                    .map_err(|e| Error::bad_version(s, e))?;
                (nums, stability)
            }
            None => (s, Stability::Stable),
        };

        let mut parts = nums.split('.');
        let mut component = |name: &str| -> Result<u64> {
            match parts.next() {
                None => Ok(0),
                Some(p) => p
                    .parse::<u64>()
                    .map_err(|_| Error::bad_version(s, format!("non-numeric {name} component"))),
            }
        };
        let major = component("major")?;
        let minor = component("minor")?;
        let revision = component("revision")?;
        if parts.next().is_some() {
            return Err(Error::bad_version(s, "more than three components"));
        }

        Ok(Self {
            major,
            minor,
            revision,
            stability,
            commit: None,
        })
    }

    /// True iff every requirement in `reqs` holds for this version.
    ///
    /// An empty list means "any". Commit requirements are satisfied only
    /// by the literal commit.
    #[must_use]
    pub fn satisfies(&self, reqs: &[VerReq]) -> bool {
        reqs.iter().all(|req| self.satisfies_one(req))
    }

    fn satisfies_one(&self, req: &VerReq) -> bool {
        match req {
            VerReq::Version { op, ver } => {
                let ord = self.cmp_numeric(ver);
                match op {
                    VerOp::Lt => ord == Ordering::Less,
                    VerOp::Le => ord != Ordering::Greater,
                    VerOp::Eq => ord == Ordering::Equal,
                    VerOp::Ge => ord != Ordering::Less,
                    VerOp::Gt => ord == Ordering::Greater,
                }
            }
            VerReq::Commit(hash) => self.commit.as_deref() == Some(hash.as_str()),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)?;
        if self.is_floating() {
            write!(f, "-{}", self.stability)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Comparison operator of a version requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerOp {
    /// Strictly older.
    Lt,
    /// Older or equal.
    Le,
    /// Exactly equal.
    Eq,
    /// Newer or equal.
    Ge,
    /// Strictly newer.
    Gt,
}

impl VerOp {
    /// Operator spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ge => ">=",
            Self::Gt => ">",
        }
    }
}

impl fmt::Display for VerOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single version requirement.
///
/// The commit form binds to a literal commit and bypasses version
/// ordering entirely.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerReq {
    /// Ordered requirement: `<op> <version>`.
    Version {
        /// Comparison operator.
        op: VerOp,
        /// Version compared against.
        ver: Version,
    },
    /// Commit requirement: `<hash>-commit`.
    Commit(String),
}

impl VerReq {
    /// Build an ordered requirement.
    #[must_use]
    pub const fn version(op: VerOp, ver: Version) -> Self {
        Self::Version { op, ver }
    }

    /// Build an exact-version requirement.
    #[must_use]
    pub const fn exact(ver: Version) -> Self {
        Self::Version {
            op: VerOp::Eq,
            ver,
        }
    }

    /// Parse a requirement list: `(<op>)?<ver>` terms separated by
    /// commas, conjunctive. The empty string parses to the empty list,
    /// which any version satisfies.
    ///
    /// `^` and `~` are accepted as shorthand and expand into the
    /// equivalent `>=`/`<` pairs. `<hash>-commit` produces a commit
    /// requirement.
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Vec::new());
        }
        let mut reqs = Vec::new();
        for term in s.split(',') {
            let term = term.trim();
            if term.is_empty() {
                return Err(Error::bad_requirement(s, "empty term in list"));
            }
            Self::parse_term(term, &mut reqs)?;
        }
        Ok(reqs)
    }

    fn parse_term(term: &str, out: &mut Vec<Self>) -> Result<()> {
        if let Some(hash) = term.strip_suffix("-commit") {
            if hash.is_empty() {
                return Err(Error::bad_requirement(term, "empty commit hash"));
            }
            out.push(Self::Commit(hash.to_string()));
            return Ok(());
        }

        if let Some(rest) = term.strip_prefix('^') {
            if rest.trim().is_empty() {
                return Err(Error::bad_requirement(term, "operator without a version"));
            }
            let ver = Version::parse(rest)?;
            out.push(Self::version(VerOp::Ge, ver.clone()));
            out.push(Self::version(VerOp::Lt, caret_upper_bound(&ver)));
            return Ok(());
        }

        if let Some(rest) = term.strip_prefix('~') {
            if rest.trim().is_empty() {
                return Err(Error::bad_requirement(term, "operator without a version"));
            }
            let ver = Version::parse(rest)?;
            out.push(Self::version(VerOp::Ge, ver.clone()));
            out.push(Self::version(
                VerOp::Lt,
                Version::new(ver.major, ver.minor + 1, 0),
            ));
            return Ok(());
        }

        let (op, rest) = if let Some(rest) = term.strip_prefix("<=") {
            (VerOp::Le, rest)
        } else if let Some(rest) = term.strip_prefix(">=") {
            (VerOp::Ge, rest)
        } else if let Some(rest) = term.strip_prefix("==") {
            (VerOp::Eq, rest)
        } else if let Some(rest) = term.strip_prefix('<') {
            (VerOp::Lt, rest)
        } else if let Some(rest) = term.strip_prefix('>') {
            (VerOp::Gt, rest)
        } else {
            (VerOp::Eq, term)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(Error::bad_requirement(term, "operator without a version"));
        }
        out.push(Self::version(op, Version::parse(rest)?));
        Ok(())
    }
}

impl fmt::Display for VerReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Version { op, ver } => write!(f, "{op}{ver}"),
            Self::Commit(hash) => write!(f, "{hash}-commit"),
        }
    }
}

/// The exclusive upper bound implied by a caret requirement.
fn caret_upper_bound(ver: &Version) -> Version {
    if ver.major > 0 {
        Version::new(ver.major + 1, 0, 0)
    } else if ver.minor > 0 {
        Version::new(0, ver.minor + 1, 0)
    } else {
        Version::new(0, 0, ver.revision + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use test_case::test_case;

    // ========== Parsing ==========

    #[test_case("1.2.3", 1, 2, 3, Stability::Stable ; "full triple")]
    #[test_case("1.2", 1, 2, 0, Stability::Stable ; "two components")]
    #[test_case("4", 4, 0, 0, Stability::Stable ; "major only")]
    #[test_case("0-dev", 0, 0, 0, Stability::Dev ; "floating dev")]
    #[test_case("1-latest", 1, 0, 0, Stability::Latest ; "floating latest")]
    #[test_case("2.1.0-stable", 2, 1, 0, Stability::Stable ; "explicit stable")]
    fn parse_version(s: &str, major: u64, minor: u64, revision: u64, stability: Stability) {
        let v = Version::parse(s).unwrap();
        assert_eq!(v.numeric(), NumericVersion(major, minor, revision));
        assert_eq!(v.stability, stability);
    }

    #[test]
    fn parse_unspecified() {
        assert!(Version::parse("").unwrap().is_unspecified());
        assert!(Version::parse("none").unwrap().is_unspecified());
        assert!(Version::parse("NONE").unwrap().is_unspecified());
    }

    #[test_case("1.x" ; "non numeric component")]
    #[test_case("1.2.3.4" ; "four components")]
    #[test_case("1-frozen" ; "unknown stability tag")]
    fn parse_version_rejects(s: &str) {
        assert!(Version::parse(s).is_err());
    }

    #[test]
    fn display_roundtrip() {
        for s in ["1.2.3", "0.0.0-dev", "3.0.0-latest"] {
            let v = Version::parse(s).unwrap();
            assert_eq!(Version::parse(&v.to_string()).unwrap(), v);
        }
    }

    // ========== Requirements ==========

    #[test]
    fn parse_empty_requirement_is_any() {
        let reqs = VerReq::parse_list("").unwrap();
        assert!(reqs.is_empty());
        assert!(Version::new(9, 9, 9).satisfies(&reqs));
    }

    #[test]
    fn parse_bare_version_is_exact() {
        let reqs = VerReq::parse_list("1.2.3").unwrap();
        assert_eq!(reqs, vec![VerReq::exact(Version::new(1, 2, 3))]);
    }

    #[test]
    fn parse_operator_forms() {
        let reqs = VerReq::parse_list(">=1.0.0,<2.0.0").unwrap();
        assert_eq!(reqs.len(), 2);
        assert!(Version::new(1, 5, 0).satisfies(&reqs));
        assert!(!Version::new(2, 0, 0).satisfies(&reqs));
        assert!(!Version::new(0, 9, 0).satisfies(&reqs));
    }

    #[test]
    fn parse_caret_expands() {
        let reqs = VerReq::parse_list("^1.1.0").unwrap();
        assert!(Version::new(1, 1, 0).satisfies(&reqs));
        assert!(Version::new(1, 9, 9).satisfies(&reqs));
        assert!(!Version::new(2, 0, 0).satisfies(&reqs));
        assert!(!Version::new(1, 0, 9).satisfies(&reqs));
    }

    #[test]
    fn parse_caret_zero_major() {
        let reqs = VerReq::parse_list("^0.2.0").unwrap();
        assert!(Version::new(0, 2, 5).satisfies(&reqs));
        assert!(!Version::new(0, 3, 0).satisfies(&reqs));
    }

    #[test]
    fn parse_tilde_expands() {
        let reqs = VerReq::parse_list("~1.2").unwrap();
        assert!(Version::new(1, 2, 9).satisfies(&reqs));
        assert!(!Version::new(1, 3, 0).satisfies(&reqs));
    }

    #[test]
    fn parse_commit_requirement() {
        let reqs = VerReq::parse_list("deadbeef-commit").unwrap();
        assert_eq!(reqs, vec![VerReq::Commit("deadbeef".to_string())]);

        let at_commit = Version::new(0, 0, 0).with_commit("deadbeef");
        assert!(at_commit.satisfies(&reqs));

        // A matching version number without the commit does not satisfy.
        assert!(!Version::new(0, 0, 0).satisfies(&reqs));
        let other = Version::new(0, 0, 0).with_commit("cafef00d");
        assert!(!other.satisfies(&reqs));
    }

    #[test_case("," ; "bare comma")]
    #[test_case(">=" ; "operator without version")]
    #[test_case("-commit" ; "commit without hash")]
    fn parse_requirement_rejects(s: &str) {
        assert!(VerReq::parse_list(s).is_err());
    }

    #[test]
    fn requirement_display() {
        let reqs = VerReq::parse_list(">=1.0.0").unwrap();
        assert_eq!(reqs[0].to_string(), ">=1.0.0");
        assert_eq!(VerReq::Commit("abc123".into()).to_string(), "abc123-commit");
    }

    // ========== Ordering ==========

    #[test]
    fn compare_ignores_stability_and_commit() {
        let a = Version::new(1, 0, 0).with_stability(Stability::Dev);
        let b = Version::new(1, 0, 0).with_commit("abc");
        assert_eq!(a.cmp_numeric(&b), Ordering::Equal);
    }

    proptest! {
        /// Exactly one of <, =, > holds for any pair (total order).
        #[test]
        fn prop_total_order_trichotomy(
            a in (0u64..50, 0u64..50, 0u64..50),
            b in (0u64..50, 0u64..50, 0u64..50),
        ) {
            let va = Version::new(a.0, a.1, a.2);
            let vb = Version::new(b.0, b.1, b.2);
            let lt = va.cmp_numeric(&vb) == Ordering::Less;
            let eq = va.cmp_numeric(&vb) == Ordering::Equal;
            let gt = va.cmp_numeric(&vb) == Ordering::Greater;
            prop_assert_eq!(u8::from(lt) + u8::from(eq) + u8::from(gt), 1);
        }

        /// < is transitive.
        #[test]
        fn prop_order_transitive(
            a in (0u64..20, 0u64..20, 0u64..20),
            b in (0u64..20, 0u64..20, 0u64..20),
            c in (0u64..20, 0u64..20, 0u64..20),
        ) {
            let va = Version::new(a.0, a.1, a.2);
            let vb = Version::new(b.0, b.1, b.2);
            let vc = Version::new(c.0, c.1, c.2);
            if va.cmp_numeric(&vb) == Ordering::Less && vb.cmp_numeric(&vc) == Ordering::Less {
                prop_assert_eq!(va.cmp_numeric(&vc), Ordering::Less);
            }
        }

        /// If v1 <= v2 and v2 satisfies a <= requirement, so does v1.
        #[test]
        fn prop_le_requirement_monotone(
            v1 in (0u64..20, 0u64..20, 0u64..20),
            v2 in (0u64..20, 0u64..20, 0u64..20),
            bound in (0u64..20, 0u64..20, 0u64..20),
        ) {
            let v1 = Version::new(v1.0, v1.1, v1.2);
            let v2 = Version::new(v2.0, v2.1, v2.2);
            let req = vec![VerReq::version(VerOp::Le, Version::new(bound.0, bound.1, bound.2))];
            if v1.cmp_numeric(&v2) != Ordering::Greater && v2.satisfies(&req) {
                prop_assert!(v1.satisfies(&req));
            }
        }

        /// Display output is always re-parsable to an equal version.
        #[test]
        fn prop_display_reparses(
            n in (0u64..100, 0u64..100, 0u64..100),
            tag in prop::sample::select(vec![Stability::Stable, Stability::Dev, Stability::Latest]),
        ) {
            let v = Version::new(n.0, n.1, n.2).with_stability(tag);
            prop_assert_eq!(Version::parse(&v.to_string()).unwrap(), v);
        }
    }
}
