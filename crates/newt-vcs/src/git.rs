//! Git operations via the `git` CLI.

use crate::error::{Result, VcsError};
use crate::{DirtyState, Vcs};
use std::path::Path;
use std::process::Command;
use tracing::{debug, trace};

/// Git driven through its command-line interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitCli;

impl GitCli {
    /// Create a git driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn run(args: &[&str], cwd: Option<&Path>) -> Result<String> {
        let command = format!("git {}", args.join(" "));
        trace!(%command, cwd = ?cwd, "running");

        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| VcsError::Spawn {
            command: command.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn require_repo(dest: &Path) -> Result<()> {
        if dest.join(".git").exists() {
            Ok(())
        } else {
            Err(VcsError::NotRepository {
                path: dest.to_path_buf(),
            })
        }
    }
}

impl Vcs for GitCli {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| VcsError::Spawn {
                command: format!("mkdir {}", parent.display()),
                source,
            })?;
        }
        debug!(%url, dest = %dest.display(), "cloning");
        let dest_str = dest.to_string_lossy();
        Self::run(&["clone", url, dest_str.as_ref()], None)?;
        Ok(())
    }

    fn checkout(&self, dest: &Path, commit: &str) -> Result<()> {
        Self::require_repo(dest)?;
        debug!(dest = %dest.display(), %commit, "checking out");
        // --detach even for branch names: installed repos stay detached.
        Self::run(&["checkout", "--detach", commit], Some(dest))?;
        Ok(())
    }

    fn dirty_state(&self, dest: &Path) -> Result<DirtyState> {
        Self::require_repo(dest)?;
        let out = Self::run(&["status", "--porcelain=v1", "--branch"], Some(dest))?;
        Ok(parse_status(&out))
    }

    fn current_hash(&self, dest: &Path) -> Result<String> {
        Self::require_repo(dest)?;
        let out = Self::run(&["rev-parse", "HEAD"], Some(dest))?;
        let hash = out.trim().to_string();
        if hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(hash)
        } else {
            Err(VcsError::BadOutput {
                command: "git rev-parse HEAD".to_string(),
                detail: format!("not a commit hash: \"{hash}\""),
            })
        }
    }

    fn is_detached(&self, dest: &Path) -> Result<bool> {
        Self::require_repo(dest)?;
        // symbolic-ref resolves only when HEAD points at a branch.
        let mut cmd = Command::new("git");
        cmd.args(["symbolic-ref", "-q", "HEAD"]).current_dir(dest);
        let output = cmd.output().map_err(|source| VcsError::Spawn {
            command: "git symbolic-ref -q HEAD".to_string(),
            source,
        })?;
        Ok(!output.status.success())
    }

    fn fetch(&self, dest: &Path) -> Result<()> {
        Self::require_repo(dest)?;
        debug!(dest = %dest.display(), "fetching");
        Self::run(&["fetch", "--tags", "--force"], Some(dest))?;
        Ok(())
    }

    fn latest_matching(&self, dest: &Path, reference: &str) -> Result<String> {
        Self::require_repo(dest)?;
        let out = Self::run(&["rev-list", "-n", "1", reference], Some(dest))?;
        let hash = out.trim().to_string();
        if hash.is_empty() {
            Err(VcsError::BadOutput {
                command: format!("git rev-list -n 1 {reference}"),
                detail: "no commit found".to_string(),
            })
        } else {
            Ok(hash)
        }
    }
}

/// Classify `git status --porcelain=v1 --branch` output.
///
/// Precedence: uncommitted changes, then untracked files, then ahead of
/// remote. The branch header line starts with `##`.
fn parse_status(out: &str) -> DirtyState {
    let mut untracked = false;
    let mut ahead = false;

    for line in out.lines() {
        if let Some(branch) = line.strip_prefix("## ") {
            if branch.contains("[ahead") {
                ahead = true;
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if line.starts_with("??") {
            untracked = true;
        } else {
            return DirtyState::UncommittedChanges;
        }
    }

    if untracked {
        DirtyState::UntrackedFiles
    } else if ahead {
        DirtyState::AheadOfRemote
    } else {
        DirtyState::Clean
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("## main...origin/main\n", DirtyState::Clean ; "clean")]
    #[test_case("## main...origin/main\n M src/lib.rs\n", DirtyState::UncommittedChanges ; "modified")]
    #[test_case("## main...origin/main\n?? scratch.txt\n", DirtyState::UntrackedFiles ; "untracked")]
    #[test_case("## main...origin/main [ahead 2]\n", DirtyState::AheadOfRemote ; "ahead")]
    #[test_case("## main [ahead 1]\n M a.c\n?? b.c\n", DirtyState::UncommittedChanges ; "modified wins")]
    #[test_case("## main [ahead 1]\n?? b.c\n", DirtyState::UntrackedFiles ; "untracked beats ahead")]
    #[test_case("", DirtyState::Clean ; "empty output")]
    fn status_classification(out: &str, expected: DirtyState) {
        assert_eq!(parse_status(out), expected);
    }

    #[test]
    fn dirty_state_predicate() {
        assert!(!DirtyState::Clean.is_dirty());
        assert!(DirtyState::UncommittedChanges.is_dirty());
        assert!(DirtyState::UntrackedFiles.is_dirty());
        assert!(DirtyState::AheadOfRemote.is_dirty());
    }

    #[test]
    fn missing_repo_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let git = GitCli::new();
        let err = git.dirty_state(dir.path()).unwrap_err();
        assert!(matches!(err, VcsError::NotRepository { .. }));
    }
}
