//! Error types for repository loading and resolution.

use newt_core::{VerReq, Version};
use std::fmt;
use thiserror::Error;

/// How a conflict was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// A matrix row was pruned to zero versions: the repo cannot satisfy
    /// its dependents in isolation, before any search ran.
    Isolated,
    /// No combination examined during search satisfied every dependent.
    Search,
}

/// One `(dependent, requirement-list)` pair that contributed to a
/// conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    /// Who imposed the requirement: `project.yml` or `repo@version`.
    pub source: String,
    /// The requirement list on the contested repo.
    pub reqs: Vec<VerReq>,
}

impl fmt::Display for Contributor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reqs: Vec<String> = self.reqs.iter().map(ToString::to_string).collect();
        write!(f, "{}:{}", self.source, reqs.join(","))
    }
}

/// A contested repo and everyone who constrained it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// The repo no version of which satisfies all contributors.
    pub repo: String,
    /// How the conflict surfaced.
    pub kind: ConflictKind,
    /// Every contributing requirement, sorted by source.
    pub contributors: Vec<Contributor>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "repo {}:", self.repo)?;
        for c in &self.contributors {
            writeln!(f, "    {c}")?;
        }
        Ok(())
    }
}

/// Errors raised while loading or resolving repositories.
#[derive(Error, Debug)]
pub enum RepoError {
    /// Core parse error (versions, manifests).
    #[error(transparent)]
    Core(#[from] newt_core::Error),

    /// Referenced repo not found.
    #[error("[E0301] unknown repo \"{name}\"")]
    UnknownRepo {
        /// The missing repo.
        name: String,
    },

    /// The version map chains versions cyclically or to a missing entry.
    #[error("[E0103] bad version map in repo \"{repo}\": {reason}")]
    BadVersionMap {
        /// Repo whose map is broken.
        repo: String,
        /// Cycle or dangling-chain description.
        reason: String,
    },

    /// A project requirement matches no published version. Reported
    /// before search begins.
    #[error(
        "[E0303] no version of repo \"{repo}\" satisfies the project requirement {}; available: {}",
        fmt_reqs(.reqs),
        fmt_vers(.available)
    )]
    RootUnsatisfiable {
        /// The repo the project constrains.
        repo: String,
        /// The project's requirement list.
        reqs: Vec<VerReq>,
        /// The versions the repo publishes.
        available: Vec<Version>,
    },

    /// The resolver could not find a satisfying version map.
    #[error("[E0302] version conflict:\n{}", fmt_conflicts(.conflicts))]
    VersionConflict {
        /// Every contested repo with its contributors, sorted.
        conflicts: Vec<Conflict>,
    },
}

fn fmt_reqs(reqs: &[VerReq]) -> String {
    if reqs.is_empty() {
        "(any)".to_string()
    } else {
        reqs.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn fmt_vers(vers: &[Version]) -> String {
    if vers.is_empty() {
        "(none)".to_string()
    } else {
        vers.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn fmt_conflicts(conflicts: &[Conflict]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("")
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use newt_core::{VerOp, VerReq, Version};

    #[test]
    fn conflict_display_lists_contributors() {
        let err = RepoError::VersionConflict {
            conflicts: vec![Conflict {
                repo: "B".to_string(),
                kind: ConflictKind::Search,
                contributors: vec![
                    Contributor {
                        source: "A@1.0.0".to_string(),
                        reqs: vec![VerReq::exact(Version::new(1, 0, 0))],
                    },
                    Contributor {
                        source: "project.yml".to_string(),
                        reqs: vec![VerReq::version(VerOp::Ge, Version::new(2, 0, 0))],
                    },
                ],
            }],
        };
        let text = err.to_string();
        assert!(text.contains("[E0302]"));
        assert!(text.contains("repo B:"));
        assert!(text.contains("A@1.0.0:==1.0.0"));
        assert!(text.contains("project.yml:>=2.0.0"));
    }

    #[test]
    fn root_unsatisfiable_display() {
        let err = RepoError::RootUnsatisfiable {
            repo: "core".to_string(),
            reqs: vec![VerReq::version(VerOp::Ge, Version::new(9, 0, 0))],
            available: vec![Version::new(1, 0, 0)],
        };
        let text = err.to_string();
        assert!(text.contains("[E0303]"));
        assert!(text.contains(">=9.0.0"));
        assert!(text.contains("1.0.0"));
    }
}
