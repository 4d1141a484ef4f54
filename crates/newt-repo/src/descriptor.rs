//! In-memory form of a repository's manifest (`repository.yml`).
//!
//! A descriptor is immutable after load. It resolves every published
//! version specifier to a VCS commit, carries the per-version dependency
//! lists, and answers tool-compatibility queries.

use crate::error::{RepoError, Result};
use ahash::AHashSet;
use newt_core::version::NumericVersion;
use newt_core::{yaml, VerReq, Version};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Severity code in the newt-compat table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CompatCode {
    /// Pairing is fine.
    Good,
    /// Pairing works but is discouraged.
    Warn,
    /// Pairing is disallowed.
    Error,
}

impl CompatCode {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "good" => Some(Self::Good),
            "warn" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for CompatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Good => "good",
            Self::Warn => "warn",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Result of a newt-compat query: severity plus a human message (empty
/// when the pairing is good).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatStatus {
    /// Severity of the pairing.
    pub code: CompatCode,
    /// Remediation hint, when there is one.
    pub message: String,
}

impl CompatStatus {
    const fn good() -> Self {
        Self {
            code: CompatCode::Good,
            message: String::new(),
        }
    }
}

/// A requirement one repo version places on another repo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReq {
    /// The depended-on repo.
    pub repo: String,
    /// Conjunctive requirement list; empty means any version.
    pub reqs: Vec<VerReq>,
}

/// Immutable descriptor of one repository.
#[derive(Debug, Clone)]
pub struct RepoDescriptor {
    name: String,
    url: String,
    is_local: bool,
    /// Raw version map: specifier -> commit-ish or another specifier.
    vers: BTreeMap<String, String>,
    /// Per-version dependency lists, keyed by numeric version.
    deps: BTreeMap<NumericVersion, Vec<RepoReq>>,
    /// Newt-compat table, entries sorted ascending by min tool version.
    compat: BTreeMap<NumericVersion, Vec<(Version, CompatCode)>>,
}

impl RepoDescriptor {
    /// Descriptor for the local (project) repo. Never installed, never
    /// upgraded, and excluded from the version matrix.
    #[must_use]
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: String::new(),
            is_local: true,
            vers: BTreeMap::new(),
            deps: BTreeMap::new(),
            compat: BTreeMap::new(),
        }
    }

    /// Parse a `repository.yml` document.
    ///
    /// Rejects a descriptor lacking a name, one whose name disagrees with
    /// `expected_name`, and version chains that dangle.
    pub fn from_yaml(expected_name: &str, doc: &Value) -> Result<Self> {
        let ctx = format!("{expected_name}/repository.yml");
        let root = yaml::as_mapping(doc, &ctx)?;

        let name = yaml::require_str(root, "repo.name", &ctx)?;
        if name != expected_name {
            return Err(newt_core::Error::bad_manifest(
                &ctx,
                format!("repo.name is \"{name}\", expected \"{expected_name}\""),
            )
            .into());
        }

        let mut vers = BTreeMap::new();
        if let Some(map) = yaml::field(root, "repo.versions") {
            let map = yaml::as_mapping(map, &format!("{ctx}:repo.versions"))?;
            for (k, v) in map {
                let key = yaml::scalar_to_string(k).ok_or_else(|| {
                    newt_core::Error::bad_manifest(&ctx, "non-scalar version key")
                })?;
                let val = yaml::scalar_to_string(v).ok_or_else(|| {
                    newt_core::Error::bad_manifest(&ctx, "non-scalar version value")
                })?;
                // Version keys must parse; this also catches duplicates
                // spelled differently ("1.0" vs "1.0.0").
                let parsed = Version::parse(&key)
                    .map_err(|e| newt_core::Error::bad_manifest(&ctx, e.to_string()))?;
                let canonical = parsed.to_string();
                if vers.insert(canonical.clone(), val).is_some() {
                    return Err(newt_core::Error::bad_manifest(
                        &ctx,
                        format!("duplicate version key \"{canonical}\""),
                    )
                    .into());
                }
            }
        }

        let mut deps: BTreeMap<NumericVersion, Vec<RepoReq>> = BTreeMap::new();
        for (k, v) in root {
            let Some(key) = yaml::scalar_to_string(k) else {
                continue;
            };
            let Some(ver_text) = key.strip_prefix("repo.deps.") else {
                continue;
            };
            let ver = Version::parse(ver_text)
                .map_err(|e| newt_core::Error::bad_manifest(&ctx, e.to_string()))?;
            let dep_map = yaml::as_mapping(v, &format!("{ctx}:{key}"))?;
            let mut list = Vec::new();
            for (dep_name, dep_req) in dep_map {
                let repo = yaml::scalar_to_string(dep_name).ok_or_else(|| {
                    newt_core::Error::bad_manifest(&ctx, "non-scalar dep repo name")
                })?;
                let req_text = yaml::scalar_to_string(dep_req).ok_or_else(|| {
                    newt_core::Error::bad_manifest(&ctx, "non-scalar dep requirement")
                })?;
                list.push(RepoReq {
                    repo,
                    reqs: VerReq::parse_list(&req_text)?,
                });
            }
            list.sort_by(|a, b| a.repo.cmp(&b.repo));
            deps.insert(ver.numeric(), list);
        }

        let mut compat: BTreeMap<NumericVersion, Vec<(Version, CompatCode)>> = BTreeMap::new();
        if let Some(table) = yaml::field(root, "repo.newt_compatibility") {
            let table = yaml::as_mapping(table, &format!("{ctx}:repo.newt_compatibility"))?;
            for (repo_ver, row) in table {
                let repo_ver = yaml::scalar_to_string(repo_ver)
                    .ok_or_else(|| newt_core::Error::bad_manifest(&ctx, "non-scalar compat key"))
                    .and_then(|s| {
                        Version::parse(&s)
                            .map_err(|e| newt_core::Error::bad_manifest(&ctx, e.to_string()))
                    })?;
                let row = yaml::as_mapping(row, &format!("{ctx}:repo.newt_compatibility"))?;
                let mut entries = Vec::new();
                for (tool_ver, code) in row {
                    let tool_ver = yaml::scalar_to_string(tool_ver)
                        .ok_or_else(|| {
                            newt_core::Error::bad_manifest(&ctx, "non-scalar tool version")
                        })
                        .and_then(|s| {
                            Version::parse(&s)
                                .map_err(|e| newt_core::Error::bad_manifest(&ctx, e.to_string()))
                        })?;
                    let code_text = yaml::scalar_to_string(code).unwrap_or_default();
                    let code = CompatCode::parse(&code_text).ok_or_else(|| {
                        newt_core::Error::bad_manifest(
                            &ctx,
                            format!("unknown compat code \"{code_text}\""),
                        )
                    })?;
                    entries.push((tool_ver, code));
                }
                entries.sort_by(|a, b| a.0.cmp_numeric(&b.0));
                compat.insert(repo_ver.numeric(), entries);
            }
        }

        let desc = Self {
            name,
            url: String::new(),
            is_local: false,
            vers,
            deps,
            compat,
        };
        desc.validate_version_map()?;
        debug!(repo = %desc.name, versions = desc.vers.len(), "loaded repo descriptor");
        Ok(desc)
    }

    /// Attach the remote URL (it lives in the project manifest, not in
    /// `repository.yml`).
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Repo name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// True for the project-local repo.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.is_local
    }

    /// Every published normalised version, newest first, with its commit
    /// attached.
    #[must_use]
    pub fn versions(&self) -> Vec<Version> {
        let mut out: Vec<Version> = self
            .vers
            .keys()
            .filter_map(|spec| {
                let ver = Version::parse(spec).ok()?;
                if ver.is_floating() {
                    return None;
                }
                let commit = self.commit_for(spec).ok()?;
                Some(ver.with_commit(commit))
            })
            .collect();
        out.sort_by(|a, b| b.cmp_numeric(a));
        out
    }

    /// Canonical spelling of a specifier, so `1.0` and `1.0.0` hit the
    /// same map entry.
    fn canon(spec: &str) -> String {
        Version::parse(spec).map_or_else(|_| spec.to_string(), |v| v.to_string())
    }

    /// Resolve a version specifier to its commit, following
    /// version-to-version chains. Fails on a cycle or a dangling link.
    pub fn commit_for(&self, spec: &str) -> Result<String> {
        let mut seen = AHashSet::new();
        let mut cur = Self::canon(spec);
        loop {
            if !seen.insert(cur.clone()) {
                return Err(RepoError::BadVersionMap {
                    repo: self.name.clone(),
                    reason: format!("cycle through \"{cur}\""),
                });
            }
            let Some(next) = self.vers.get(&cur) else {
                return Err(RepoError::BadVersionMap {
                    repo: self.name.clone(),
                    reason: format!("no entry for version \"{cur}\""),
                });
            };
            let next_canon = Self::canon(next);
            if self.vers.contains_key(&next_canon) {
                cur = next_canon;
                continue;
            }
            // A value that parses as a version is a chain link and must
            // exist; anything else is the commit.
            match Version::parse(next) {
                Ok(v) if !v.is_unspecified() => {
                    return Err(RepoError::BadVersionMap {
                        repo: self.name.clone(),
                        reason: format!("chain links to missing version \"{next}\""),
                    });
                }
                _ => return Ok(next.clone()),
            }
        }
    }

    /// Replace a floating version by its numeric counterpart from the
    /// version map, transitively.
    pub fn normalize(&self, ver: &Version) -> Result<Version> {
        if !ver.is_floating() {
            let commit = self.commit_for(&ver.to_string())?;
            return Ok(ver.clone().with_commit(commit));
        }

        let mut seen = AHashSet::new();
        let mut cur = ver.to_string();
        loop {
            if !seen.insert(cur.clone()) {
                return Err(RepoError::BadVersionMap {
                    repo: self.name.clone(),
                    reason: format!("cycle while normalising \"{ver}\""),
                });
            }
            let Some(next) = self.vers.get(&cur) else {
                return Err(RepoError::BadVersionMap {
                    repo: self.name.clone(),
                    reason: format!("no entry for version \"{cur}\""),
                });
            };
            let next_canon = Self::canon(next);
            match Version::parse(&next_canon) {
                Ok(v) if self.vers.contains_key(&next_canon) => {
                    if v.is_floating() {
                        cur = next_canon;
                    } else {
                        let commit = self.commit_for(&next_canon)?;
                        return Ok(v.with_commit(commit));
                    }
                }
                _ => {
                    return Err(RepoError::BadVersionMap {
                        repo: self.name.clone(),
                        reason: format!("floating version \"{ver}\" never reaches a numeric one"),
                    });
                }
            }
        }
    }

    /// Dependency list of one published version.
    #[must_use]
    pub fn deps_for(&self, ver: &Version) -> &[RepoReq] {
        self.deps.get(&ver.numeric()).map_or(&[], Vec::as_slice)
    }

    /// Evaluate the newt-compat table for a repo version against the
    /// running tool version.
    ///
    /// The matching entry is the greatest one whose minimum tool version
    /// is not newer than `tool_ver`. No entry matching means the tool is
    /// too old for this repo version.
    #[must_use]
    pub fn newt_compat(&self, repo_ver: &Version, tool_ver: &Version) -> CompatStatus {
        let Some(entries) = self.compat.get(&repo_ver.numeric()) else {
            return CompatStatus::good();
        };
        if entries.is_empty() {
            return CompatStatus::good();
        }

        let match_idx = entries
            .iter()
            .rposition(|(min_tool, _)| min_tool.cmp_numeric(tool_ver) != std::cmp::Ordering::Greater);

        let Some(idx) = match_idx else {
            return CompatStatus {
                code: CompatCode::Error,
                message: format!(
                    "repo {} version {} requires a newer tool; upgrade to {} or later",
                    self.name, repo_ver, entries[0].0
                ),
            };
        };

        let (_, code) = &entries[idx];
        if *code == CompatCode::Good {
            return CompatStatus::good();
        }

        // Nearest good-coded interval, looking forward then backward.
        let hint = entries[idx + 1..]
            .iter()
            .find(|(_, c)| *c == CompatCode::Good)
            .map(|(v, _)| format!("upgrade tool to {v}"))
            .or_else(|| {
                entries[..idx]
                    .iter()
                    .rev()
                    .find(|(_, c)| *c == CompatCode::Good)
                    .map(|(v, _)| format!("downgrade tool to {v}"))
            });

        let base = format!(
            "repo {} version {} pairs {} with this tool",
            self.name, repo_ver, code
        );
        CompatStatus {
            code: *code,
            message: match hint {
                Some(hint) => format!("{base}; {hint}"),
                None => base,
            },
        }
    }

    fn validate_version_map(&self) -> Result<()> {
        for spec in self.vers.keys() {
            self.commit_for(spec)?;
        }
        Ok(())
    }

    /// In-memory constructor for tests and tools that synthesise repos.
    #[must_use]
    pub fn from_parts(
        name: impl Into<String>,
        url: impl Into<String>,
        vers: BTreeMap<String, String>,
        deps: BTreeMap<NumericVersion, Vec<RepoReq>>,
        compat: BTreeMap<NumericVersion, Vec<(Version, CompatCode)>>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            is_local: false,
            vers,
            deps,
            compat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newt_core::Stability;
    use pretty_assertions::assert_eq;

    fn descriptor(yaml: &str) -> Result<RepoDescriptor> {
        let doc: Value = serde_yaml::from_str(yaml).unwrap();
        RepoDescriptor::from_yaml("core", &doc)
    }

    const BASIC: &str = r#"
repo.name: core
repo.versions:
    "0.0.0": "master"
    "1.0.0": "core_1_0_0_tag"
    "1.1.0": "core_1_1_0_tag"
    "0-dev": "0.0.0"
    "1-latest": "1.1.0"
repo.deps.1.1.0:
    nimble: ">=1.0.0"
repo.newt_compatibility:
    "1.1.0":
        "1.0.0": good
        "0.8.0": warn
"#;

    #[test]
    fn loads_and_lists_versions() {
        let desc = descriptor(BASIC).unwrap();
        let versions = desc.versions();
        let rendered: Vec<String> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, vec!["1.1.0", "1.0.0", "0.0.0"]);
        assert_eq!(versions[0].commit.as_deref(), Some("core_1_1_0_tag"));
    }

    #[test]
    fn rejects_missing_name() {
        let doc: Value = serde_yaml::from_str("repo.versions: {}").unwrap();
        assert!(RepoDescriptor::from_yaml("core", &doc).is_err());
    }

    #[test]
    fn rejects_name_mismatch() {
        let doc: Value = serde_yaml::from_str("repo.name: other").unwrap();
        assert!(RepoDescriptor::from_yaml("core", &doc).is_err());
    }

    #[test]
    fn rejects_duplicate_version_spellings() {
        let err = descriptor(
            r#"
repo.name: core
repo.versions:
    "1.0": "a"
    "1.0.0": "b"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn commit_for_follows_chains() {
        let desc = descriptor(BASIC).unwrap();
        assert_eq!(desc.commit_for("0.0.0-dev").unwrap(), "master");
        assert_eq!(desc.commit_for("1.0.0-latest").unwrap(), "core_1_1_0_tag");
        assert_eq!(desc.commit_for("1.0.0").unwrap(), "core_1_0_0_tag");
    }

    #[test]
    fn rejects_cyclic_version_map() {
        let err = descriptor(
            r#"
repo.name: core
repo.versions:
    "0-dev": "0.0.0-latest"
    "0-latest": "0.0.0-dev"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, RepoError::BadVersionMap { .. }));
    }

    #[test]
    fn normalize_floating() {
        let desc = descriptor(BASIC).unwrap();
        let floating = Version::new(1, 0, 0).with_stability(Stability::Latest);
        let normal = desc.normalize(&floating).unwrap();
        assert_eq!(normal.numeric(), Version::new(1, 1, 0).numeric());
        assert_eq!(normal.commit.as_deref(), Some("core_1_1_0_tag"));
    }

    #[test]
    fn deps_for_version() {
        let desc = descriptor(BASIC).unwrap();
        let deps = desc.deps_for(&Version::new(1, 1, 0));
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].repo, "nimble");
        assert!(desc.deps_for(&Version::new(1, 0, 0)).is_empty());
    }

    #[test]
    fn compat_matches_greatest_entry() {
        let desc = descriptor(BASIC).unwrap();
        let repo_ver = Version::new(1, 1, 0);

        let ok = desc.newt_compat(&repo_ver, &Version::new(1, 2, 0));
        assert_eq!(ok.code, CompatCode::Good);

        let warn = desc.newt_compat(&repo_ver, &Version::new(0, 9, 0));
        assert_eq!(warn.code, CompatCode::Warn);
        assert!(warn.message.contains("upgrade tool to 1.0.0"));

        let err = desc.newt_compat(&repo_ver, &Version::new(0, 1, 0));
        assert_eq!(err.code, CompatCode::Error);
        assert!(err.message.contains("upgrade to 0.8.0"));
    }

    #[test]
    fn compat_absent_version_is_good() {
        let desc = descriptor(BASIC).unwrap();
        let status = desc.newt_compat(&Version::new(0, 0, 0), &Version::new(0, 0, 1));
        assert_eq!(status.code, CompatCode::Good);
    }
}
