//! The project manifest: which repositories the project uses, at which
//! version requirements.

use crate::error::Result;
use newt_core::{yaml, VerReq};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Requirement map: repo name -> conjunctive requirement list, as
/// declared in the project manifest.
pub type RequirementMap = BTreeMap<String, Vec<VerReq>>;

/// One `repository.<name>` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    /// VCS kind, e.g. `github` or `git`.
    pub vcs_type: String,
    /// Remote URL.
    pub url: String,
    /// Requirement list parsed from `vers`.
    pub reqs: Vec<VerReq>,
}

/// Parsed `project.yml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectManifest {
    /// Project name; also the name of the local repo.
    pub name: String,
    /// Per-repo specs, keyed by repo name.
    pub repos: BTreeMap<String, RepoSpec>,
}

impl ProjectManifest {
    /// Parse a `project.yml` document.
    ///
    /// Repos must be listed under `project.repositories` and described in
    /// a `repository.<name>` block each; a listed-but-undescribed repo is
    /// an error, an unlisted block is ignored.
    pub fn from_yaml(doc: &Value) -> Result<Self> {
        const CTX: &str = "project.yml";
        let root = yaml::as_mapping(doc, CTX)?;

        let name = yaml::require_str(root, "project.name", CTX)?;

        let listed = match yaml::field(root, "project.repositories") {
            Some(v) => yaml::string_list(v, &format!("{CTX}:project.repositories"))?,
            None => Vec::new(),
        };

        let mut repos = BTreeMap::new();
        for repo_name in listed {
            let key = format!("repository.{repo_name}");
            let block = yaml::field(root, &key).ok_or_else(|| {
                newt_core::Error::bad_manifest(
                    CTX,
                    format!("repo \"{repo_name}\" is listed but has no {key} block"),
                )
            })?;
            let block = yaml::as_mapping(block, &format!("{CTX}:{key}"))?;

            let vcs_type = yaml::str_field(block, "type", CTX)?.unwrap_or_else(|| "git".into());
            let url = yaml::require_str(block, "url", &format!("{CTX}:{key}"))?;
            let vers = yaml::str_field(block, "vers", CTX)?.unwrap_or_default();
            let reqs = VerReq::parse_list(&vers)?;

            repos.insert(
                repo_name,
                RepoSpec {
                    vcs_type,
                    url,
                    reqs,
                },
            );
        }

        Ok(Self { name, repos })
    }

    /// The requirement map repo resolution consumes.
    #[must_use]
    pub fn requirement_map(&self) -> RequirementMap {
        self.repos
            .iter()
            .map(|(name, spec)| (name.clone(), spec.reqs.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newt_core::{VerOp, Version};
    use pretty_assertions::assert_eq;

    const BASIC: &str = r#"
project.name: my_blinky
project.repositories:
    - apache-mynewt-core
    - mcuboot
repository.apache-mynewt-core:
    type: github
    vers: 1-latest
    url: "git@github.com:apache/mynewt-core.git"
repository.mcuboot:
    type: github
    vers: ">=1.0.0,<2.0.0"
    url: "git@github.com:mcu-tools/mcuboot.git"
"#;

    #[test]
    fn parses_repo_blocks() {
        let doc: Value = serde_yaml::from_str(BASIC).unwrap();
        let project = ProjectManifest::from_yaml(&doc).unwrap();
        assert_eq!(project.name, "my_blinky");
        assert_eq!(project.repos.len(), 2);

        let core = &project.repos["apache-mynewt-core"];
        assert_eq!(core.vcs_type, "github");
        assert_eq!(core.reqs.len(), 1);

        let mcuboot = &project.repos["mcuboot"];
        assert_eq!(
            mcuboot.reqs,
            vec![
                VerReq::version(VerOp::Ge, Version::new(1, 0, 0)),
                VerReq::version(VerOp::Lt, Version::new(2, 0, 0)),
            ]
        );
    }

    #[test]
    fn requirement_map_is_sorted_by_name() {
        let doc: Value = serde_yaml::from_str(BASIC).unwrap();
        let project = ProjectManifest::from_yaml(&doc).unwrap();
        let rm = project.requirement_map();
        let names: Vec<&String> = rm.keys().collect();
        assert_eq!(names, vec!["apache-mynewt-core", "mcuboot"]);
    }

    #[test]
    fn commit_override() {
        let doc: Value = serde_yaml::from_str(
            r#"
project.name: p
project.repositories:
    - core
repository.core:
    vers: deadbeef-commit
    url: "https://example.com/core.git"
"#,
        )
        .unwrap();
        let project = ProjectManifest::from_yaml(&doc).unwrap();
        assert_eq!(
            project.repos["core"].reqs,
            vec![VerReq::Commit("deadbeef".to_string())]
        );
    }

    #[test]
    fn listed_without_block_is_an_error() {
        let doc: Value = serde_yaml::from_str(
            "project.name: p\nproject.repositories: [ghost]\n",
        )
        .unwrap();
        assert!(ProjectManifest::from_yaml(&doc).is_err());
    }

    #[test]
    fn missing_vers_means_any() {
        let doc: Value = serde_yaml::from_str(
            r#"
project.name: p
project.repositories: [core]
repository.core:
    url: "https://example.com/core.git"
"#,
        )
        .unwrap();
        let project = ProjectManifest::from_yaml(&doc).unwrap();
        assert!(project.repos["core"].reqs.is_empty());
    }
}
