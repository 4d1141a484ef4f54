//! The installer: drives install / upgrade / sync / info over the
//! resolved version map, one repo at a time.
//!
//! Planning is separated from execution: every operation first computes
//! an action list (and runs the newt-compat and dirty checks), shows it
//! to the operator, and only then touches the filesystem. The first
//! execution failure stops the run so the on-disk state is never
//! half-mutated.

pub mod error;
pub mod prompt;

pub use error::{InstallError, Result};
pub use prompt::{AssumeYes, Confirmer, TermConfirmer};

use newt_core::Version;
use newt_repo::descriptor::{CompatCode, RepoDescriptor};
use newt_repo::VersionMap;
use newt_vcs::{Vcs, VcsError};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// State of one repo with respect to the resolved version map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    /// Not on disk.
    Absent,
    /// Cloned during the current operation.
    NewlyCloned,
    /// On disk at the resolved commit, detached.
    Installed,
    /// On disk with local modifications.
    DirtyInstalled,
    /// On disk at some other commit (or not detached).
    OutdatedInstalled,
}

impl fmt::Display for RepoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "absent",
            Self::NewlyCloned => "newly-cloned",
            Self::Installed => "installed",
            Self::DirtyInstalled => "dirty-installed",
            Self::OutdatedInstalled => "outdated-installed",
        };
        write!(f, "{s}")
    }
}

/// One planned filesystem mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Clone the repo and check out the resolved commit.
    Clone {
        /// Repo name.
        repo: String,
        /// Remote URL.
        url: String,
        /// Commit to end up on.
        commit: String,
    },
    /// Fetch and check out the resolved commit in an existing clone.
    Checkout {
        /// Repo name.
        repo: String,
        /// Commit to end up on.
        commit: String,
    },
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clone { repo, commit, .. } => write!(f, "clone    {repo} @ {commit}"),
            Self::Checkout { repo, commit } => write!(f, "checkout {repo} @ {commit}"),
        }
    }
}

/// Outcome of one installer operation.
#[derive(Debug)]
pub struct InstallReport {
    /// The planned actions, in execution order.
    pub actions: Vec<Action>,
    /// `false` when the operator cancelled; the filesystem is untouched.
    pub performed: bool,
    /// Compat and force warnings.
    pub warnings: Vec<String>,
}

/// Installer over a resolved version map.
pub struct Installer<'a> {
    vcs: &'a dyn Vcs,
    confirmer: &'a dyn Confirmer,
    repos_root: PathBuf,
    descriptors: &'a BTreeMap<String, RepoDescriptor>,
    version_map: &'a VersionMap,
    tool_version: Version,
}

impl fmt::Debug for Installer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Installer")
            .field("repos_root", &self.repos_root)
            .field("repos", &self.version_map.len())
            .field("tool_version", &self.tool_version)
            .finish_non_exhaustive()
    }
}

impl<'a> Installer<'a> {
    /// Create an installer.
    pub fn new(
        vcs: &'a dyn Vcs,
        confirmer: &'a dyn Confirmer,
        repos_root: impl Into<PathBuf>,
        descriptors: &'a BTreeMap<String, RepoDescriptor>,
        version_map: &'a VersionMap,
        tool_version: Version,
    ) -> Self {
        Self {
            vcs,
            confirmer,
            repos_root: repos_root.into(),
            descriptors,
            version_map,
            tool_version,
        }
    }

    fn repo_path(&self, repo: &str) -> PathBuf {
        self.repos_root.join(repo)
    }

    /// The commit a resolved version pins; a version without one (bare
    /// tag form) falls back to its own spelling, which git can check
    /// out.
    fn target_commit(ver: &Version) -> String {
        ver.commit.clone().unwrap_or_else(|| ver.to_string())
    }

    /// Classify one repo.
    pub fn state_of(&self, repo: &str) -> Result<RepoState> {
        let path = self.repo_path(repo);
        let dirty = match self.vcs.dirty_state(&path) {
            Err(VcsError::NotRepository { .. }) => return Ok(RepoState::Absent),
            other => other?,
        };
        if dirty.is_dirty() {
            return Ok(RepoState::DirtyInstalled);
        }

        let Some(ver) = self.version_map.get(repo) else {
            return Ok(RepoState::OutdatedInstalled);
        };
        let wanted = Self::target_commit(ver);
        if self.vcs.current_hash(&path)? == wanted && self.vcs.is_detached(&path)? {
            Ok(RepoState::Installed)
        } else {
            Ok(RepoState::OutdatedInstalled)
        }
    }

    /// Clone missing repos (all repos with `force`).
    pub fn install(&self, force: bool, ask: bool) -> Result<InstallReport> {
        let mut warnings = self.enforce_compat()?;
        let mut actions = Vec::new();

        for (repo, ver) in self.version_map {
            let desc = &self.descriptors[repo];
            if desc.is_local() {
                continue;
            }
            let commit = Self::target_commit(ver);
            match self.state_of(repo)? {
                RepoState::Absent => actions.push(Action::Clone {
                    repo: repo.clone(),
                    url: desc.url().to_string(),
                    commit,
                }),
                _ if force => actions.push(Action::Checkout {
                    repo: repo.clone(),
                    commit,
                }),
                _ => debug!(%repo, "already installed"),
            }
        }

        self.run(actions, ask, false, &mut warnings)
            .map(|(actions, performed)| InstallReport {
                actions,
                performed,
                warnings,
            })
    }

    /// Bring installed repos to the resolved commits; clone missing
    /// ones.
    pub fn upgrade(&self, force: bool, ask: bool) -> Result<InstallReport> {
        let mut warnings = self.enforce_compat()?;
        let mut actions = Vec::new();

        for (repo, ver) in self.version_map {
            let desc = &self.descriptors[repo];
            if desc.is_local() {
                continue;
            }
            let commit = Self::target_commit(ver);
            match self.state_of(repo)? {
                RepoState::Absent => actions.push(Action::Clone {
                    repo: repo.clone(),
                    url: desc.url().to_string(),
                    commit,
                }),
                RepoState::Installed => {
                    // Right commit, detached head: nothing to do.
                    debug!(%repo, "up to date");
                }
                RepoState::DirtyInstalled => {
                    let state = self.vcs.dirty_state(&self.repo_path(repo))?;
                    if !force {
                        return Err(InstallError::Dirty {
                            repo: repo.clone(),
                            state,
                        });
                    }
                    warn!(%repo, %state, "dirty; upgrading anyway (force)");
                    warnings.push(format!("repo {repo} is dirty ({state}); forced upgrade"));
                    actions.push(Action::Checkout {
                        repo: repo.clone(),
                        commit,
                    });
                }
                RepoState::NewlyCloned | RepoState::OutdatedInstalled => {
                    actions.push(Action::Checkout {
                        repo: repo.clone(),
                        commit,
                    });
                }
            }
        }

        self.run(actions, ask, true, &mut warnings)
            .map(|(actions, performed)| InstallReport {
                actions,
                performed,
                warnings,
            })
    }

    /// Fetch every repo and pin it back to the resolved commit, dirty
    /// rules as in upgrade.
    pub fn sync(&self, force: bool, ask: bool) -> Result<InstallReport> {
        let mut warnings = self.enforce_compat()?;
        let mut actions = Vec::new();

        for (repo, ver) in self.version_map {
            let desc = &self.descriptors[repo];
            if desc.is_local() {
                continue;
            }
            let commit = Self::target_commit(ver);
            match self.state_of(repo)? {
                RepoState::Absent => actions.push(Action::Clone {
                    repo: repo.clone(),
                    url: desc.url().to_string(),
                    commit,
                }),
                RepoState::DirtyInstalled if !force => {
                    let state = self.vcs.dirty_state(&self.repo_path(repo))?;
                    return Err(InstallError::Dirty {
                        repo: repo.clone(),
                        state,
                    });
                }
                RepoState::DirtyInstalled => {
                    warnings.push(format!("repo {repo} is dirty; forced sync"));
                    actions.push(Action::Checkout {
                        repo: repo.clone(),
                        commit,
                    });
                }
                _ => actions.push(Action::Checkout {
                    repo: repo.clone(),
                    commit,
                }),
            }
        }

        self.run(actions, ask, true, &mut warnings)
            .map(|(actions, performed)| InstallReport {
                actions,
                performed,
                warnings,
            })
    }

    /// Per-repo one-liners. With `remote`, fetch each repo and
    /// recompute its version map against the refreshed refs, so the
    /// needs-upgrade flag reflects commits published upstream since the
    /// resolution ran.
    pub fn info(&self, remote: bool) -> Result<Vec<String>> {
        let mut lines = Vec::new();

        for (repo, ver) in self.version_map {
            let desc = &self.descriptors[repo];
            if desc.is_local() {
                continue;
            }
            let path = self.repo_path(repo);

            if matches!(self.state_of(repo)?, RepoState::Absent) {
                lines.push(format!("{repo}: not installed (want {ver})"));
                continue;
            }

            let versions = if remote {
                self.vcs.fetch(&path)?;
                self.refreshed_versions(desc, &path)?
            } else {
                desc.versions()
            };

            let hash = self.vcs.current_hash(&path)?;
            let dirty = self.vcs.dirty_state(&path)?;

            // The resolved version's commit, taken from the recomputed
            // map; a commit pin has nothing to refresh and falls
            // through.
            let wanted = versions
                .iter()
                .find(|v| v.numeric() == ver.numeric())
                .and_then(|v| v.commit.clone())
                .unwrap_or_else(|| Self::target_commit(ver));

            // Derive a version for the current commit when the map has
            // one.
            let current_ver = versions
                .iter()
                .find(|v| v.commit.as_deref() == Some(hash.as_str()))
                .map_or_else(|| "unknown".to_string(), ToString::to_string);

            let mut line = format!("{repo}: {hash} ({current_ver})");
            if dirty.is_dirty() {
                line.push_str(&format!(" [{dirty}]"));
            }
            if hash != wanted {
                line.push_str(" [needs-upgrade]");
            }
            lines.push(line);
        }

        Ok(lines)
    }

    /// Recompute a repo's version-to-commit map by re-resolving each
    /// published version's mapped ref against the fetched remote state.
    /// Branches and tags may have moved since the descriptor was
    /// loaded.
    fn refreshed_versions(&self, desc: &RepoDescriptor, path: &Path) -> Result<Vec<Version>> {
        desc.versions()
            .into_iter()
            .map(|v| {
                let reference = Self::target_commit(&v);
                let commit = self.vcs.latest_matching(path, &reference)?;
                Ok(v.with_commit(commit))
            })
            .collect()
    }

    /// Aggregate newt-compat results over the version map: error-coded
    /// repos become a single error before anything touches disk,
    /// warn-coded repos a one-time warning each.
    fn enforce_compat(&self) -> Result<Vec<String>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for (repo, ver) in self.version_map {
            let Some(desc) = self.descriptors.get(repo) else {
                continue;
            };
            let status = desc.newt_compat(ver, &self.tool_version);
            match status.code {
                CompatCode::Good => {}
                CompatCode::Warn => {
                    warn!(%repo, "{}", status.message);
                    warnings.push(status.message);
                }
                CompatCode::Error => errors.push(status.message),
            }
        }

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(InstallError::NewtCompat { messages: errors })
        }
    }

    /// Confirm and execute an action list sequentially; first failure
    /// stops the run.
    fn run(
        &self,
        actions: Vec<Action>,
        ask: bool,
        fetch_before_checkout: bool,
        warnings: &mut Vec<String>,
    ) -> Result<(Vec<Action>, bool)> {
        if actions.is_empty() {
            return Ok((actions, true));
        }

        for action in &actions {
            info!("{action}");
        }
        if ask {
            let prompt = format!("apply {} action(s)?", actions.len());
            if !self.confirmer.confirm(&prompt) {
                warnings.push("operation cancelled; filesystem unchanged".to_string());
                return Ok((actions, false));
            }
        }

        for action in &actions {
            match action {
                Action::Clone { repo, url, commit } => {
                    let path = self.repo_path(repo);
                    self.vcs.clone_repo(url, &path)?;
                    self.vcs.checkout(&path, commit)?;
                    info!(%repo, %commit, "cloned");
                }
                Action::Checkout { repo, commit } => {
                    let path = self.repo_path(repo);
                    if fetch_before_checkout {
                        self.vcs.fetch(&path)?;
                    }
                    self.vcs.checkout(&path, commit)?;
                    info!(%repo, %commit, "checked out");
                }
            }
        }
        Ok((actions, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newt_repo::resolve;
    use newt_test_utils::{MockVcs, RepoBuilder};
    use newt_vcs::DirtyState;
    use pretty_assertions::assert_eq;

    struct Deny;
    impl Confirmer for Deny {
        fn confirm(&self, _prompt: &str) -> bool {
            false
        }
    }

    fn tool() -> Version {
        Version::new(1, 0, 0)
    }

    fn one_repo_setup() -> (BTreeMap<String, RepoDescriptor>, VersionMap) {
        let mut descriptors = BTreeMap::new();
        descriptors.insert(
            "repoA".to_string(),
            RepoBuilder::new("repoA")
                .version("1.0.0", "c1")
                .version("1.1.0", "c2")
                .version("2.0.0", "c3")
                .build(),
        );
        let mut requirements = newt_repo::RequirementMap::new();
        requirements.insert(
            "repoA".to_string(),
            newt_core::VerReq::parse_list("^1.0.0").unwrap(),
        );
        let resolution = resolve(&requirements, &descriptors).unwrap();
        (descriptors, resolution.version_map)
    }

    /// Resolving `repoA ^1.0.0` against {1.0.0, 1.1.0, 2.0.0} installs a
    /// clone of 1.1.0's commit.
    #[test]
    fn single_repo_install_clones_resolved_commit() {
        let (descriptors, version_map) = one_repo_setup();
        assert_eq!(
            version_map["repoA"].numeric(),
            Version::new(1, 1, 0).numeric()
        );

        let vcs = MockVcs::new();
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let report = installer.install(false, false).unwrap();

        assert!(report.performed);
        assert_eq!(report.actions.len(), 1);
        assert!(matches!(
            &report.actions[0],
            Action::Clone { repo, commit, .. } if repo == "repoA" && commit == "c2"
        ));
        assert_eq!(
            vcs.ops(),
            vec![
                "clone https://git.example.com/repoA.git -> /repos/repoA",
                "checkout /repos/repoA @ c2",
            ]
        );
    }

    #[test]
    fn cancel_leaves_filesystem_unchanged() {
        let (descriptors, version_map) = one_repo_setup();
        let vcs = MockVcs::new();
        let deny = Deny;
        let installer = Installer::new(&vcs, &deny, "/repos", &descriptors, &version_map, tool());
        let report = installer.install(false, true).unwrap();

        assert!(!report.performed);
        assert_eq!(report.actions.len(), 1);
        assert!(vcs.ops().is_empty());
    }

    #[test]
    fn install_skips_already_installed() {
        let (descriptors, version_map) = one_repo_setup();
        let vcs = MockVcs::new().with_repo("/repos/repoA", "c2", DirtyState::Clean, true);
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let report = installer.install(false, false).unwrap();
        assert!(report.actions.is_empty());
    }

    #[test]
    fn upgrade_skips_matching_detached_head() {
        let (descriptors, version_map) = one_repo_setup();
        let vcs = MockVcs::new().with_repo("/repos/repoA", "c2", DirtyState::Clean, true);
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let report = installer.upgrade(false, false).unwrap();
        assert!(report.actions.is_empty());
        assert!(vcs.ops().is_empty());
    }

    #[test]
    fn upgrade_fixes_attached_head() {
        let (descriptors, version_map) = one_repo_setup();
        // Right commit but on a branch: needs fixup.
        let vcs = MockVcs::new().with_repo("/repos/repoA", "c2", DirtyState::Clean, false);
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let report = installer.upgrade(false, false).unwrap();
        assert_eq!(report.actions.len(), 1);
        assert!(matches!(&report.actions[0], Action::Checkout { .. }));
    }

    #[test]
    fn upgrade_dirty_unforced_fails() {
        let (descriptors, version_map) = one_repo_setup();
        let vcs =
            MockVcs::new().with_repo("/repos/repoA", "c1", DirtyState::UncommittedChanges, true);
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let err = installer.upgrade(false, false).unwrap_err();
        assert!(matches!(err, InstallError::Dirty { .. }));
        assert!(vcs.ops().is_empty());
    }

    #[test]
    fn upgrade_dirty_forced_warns_and_proceeds() {
        let (descriptors, version_map) = one_repo_setup();
        let vcs =
            MockVcs::new().with_repo("/repos/repoA", "c1", DirtyState::UntrackedFiles, true);
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let report = installer.upgrade(true, false).unwrap();
        assert!(report.performed);
        assert!(report.warnings.iter().any(|w| w.contains("dirty")));
        assert_eq!(
            vcs.ops(),
            vec!["fetch /repos/repoA", "checkout /repos/repoA @ c2"]
        );
    }

    #[test]
    fn compat_error_blocks_before_any_mutation() {
        let mut descriptors = BTreeMap::new();
        descriptors.insert(
            "repoA".to_string(),
            RepoBuilder::new("repoA")
                .version("1.0.0", "c1")
                .compat("1.0.0", "9.0.0", newt_repo::CompatCode::Good)
                .build(),
        );
        let mut requirements = newt_repo::RequirementMap::new();
        requirements.insert(
            "repoA".to_string(),
            newt_core::VerReq::parse_list("==1.0.0").unwrap(),
        );
        let version_map = resolve(&requirements, &descriptors).unwrap().version_map;

        let vcs = MockVcs::new();
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let err = installer.install(false, false).unwrap_err();
        assert!(matches!(err, InstallError::NewtCompat { .. }));
        assert!(vcs.ops().is_empty());
    }

    #[test]
    fn compat_warn_is_surfaced_once() {
        let mut descriptors = BTreeMap::new();
        descriptors.insert(
            "repoA".to_string(),
            RepoBuilder::new("repoA")
                .version("1.0.0", "c1")
                .compat("1.0.0", "0.5.0", newt_repo::CompatCode::Warn)
                .compat("1.0.0", "2.0.0", newt_repo::CompatCode::Good)
                .build(),
        );
        let mut requirements = newt_repo::RequirementMap::new();
        requirements.insert(
            "repoA".to_string(),
            newt_core::VerReq::parse_list("==1.0.0").unwrap(),
        );
        let version_map = resolve(&requirements, &descriptors).unwrap().version_map;

        let vcs = MockVcs::new();
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let report = installer.install(false, false).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("upgrade tool to 2.0.0"));
    }

    #[test]
    fn info_lines() {
        let (descriptors, version_map) = one_repo_setup();
        let vcs = MockVcs::new().with_repo("/repos/repoA", "c1", DirtyState::UntrackedFiles, true);
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let lines = installer.info(false).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("repoA: c1 (1.0.0)"));
        assert!(lines[0].contains("[untracked files]"));
        assert!(lines[0].contains("[needs-upgrade]"));
    }

    /// With `remote`, the mapped refs are re-resolved after the fetch,
    /// so a ref that moved upstream flips the needs-upgrade flag even
    /// though the local checkout still matches the stale resolution.
    #[test]
    fn info_remote_recomputes_version_map() {
        let (descriptors, version_map) = one_repo_setup();
        let vcs = MockVcs::new()
            .with_repo("/repos/repoA", "c2", DirtyState::Clean, true)
            .with_ref("c2", "c2_moved");
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());

        // Local view: the checkout matches the old resolution.
        let lines = installer.info(false).unwrap();
        assert!(!lines[0].contains("[needs-upgrade]"));

        // Remote view: fetch, then re-resolve every published ref.
        let lines = installer.info(true).unwrap();
        assert!(lines[0].contains("[needs-upgrade]"));
        let ops = vcs.ops();
        assert!(ops.contains(&"fetch /repos/repoA".to_string()));
        assert!(ops.contains(&"rev-list /repos/repoA c2".to_string()));
    }

    #[test]
    fn sync_rechecks_out_even_when_current() {
        let (descriptors, version_map) = one_repo_setup();
        let vcs = MockVcs::new().with_repo("/repos/repoA", "c2", DirtyState::Clean, true);
        let yes = AssumeYes;
        let installer = Installer::new(&vcs, &yes, "/repos", &descriptors, &version_map, tool());
        let report = installer.sync(false, false).unwrap();
        assert_eq!(report.actions.len(), 1);
        assert_eq!(
            vcs.ops(),
            vec!["fetch /repos/repoA", "checkout /repos/repoA @ c2"]
        );
    }
}
