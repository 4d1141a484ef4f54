//! VCS access for the newt installer.
//!
//! The resolver never touches a working tree; everything that shells out
//! lives behind the [`Vcs`] trait so the installer can be tested against
//! a scripted implementation. The real implementation drives the `git`
//! CLI, which is the reliable path for network operations.

pub mod error;
pub mod git;

pub use error::{Result, VcsError};
pub use git::GitCli;

use std::fmt;
use std::path::Path;

/// Working-tree dirty state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirtyState {
    /// Nothing to report.
    Clean,
    /// Tracked files were modified.
    UncommittedChanges,
    /// Untracked files are present.
    UntrackedFiles,
    /// Local commits not pushed to the remote.
    AheadOfRemote,
}

impl DirtyState {
    /// True unless the tree is clean.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        !matches!(self, Self::Clean)
    }
}

impl fmt::Display for DirtyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Clean => "clean",
            Self::UncommittedChanges => "uncommitted changes",
            Self::UntrackedFiles => "untracked files",
            Self::AheadOfRemote => "ahead of remote",
        };
        write!(f, "{s}")
    }
}

/// The operations the installer needs from a version-control system.
///
/// Every method maps to one external process invocation; callers run
/// them sequentially, one repo at a time.
pub trait Vcs {
    /// Clone `url` into `dest`.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Check out a specific commit, detaching the working tree.
    fn checkout(&self, dest: &Path, commit: &str) -> Result<()>;

    /// Classify the working tree.
    fn dirty_state(&self, dest: &Path) -> Result<DirtyState>;

    /// Full hex hash of `HEAD`.
    fn current_hash(&self, dest: &Path) -> Result<String>;

    /// Whether `HEAD` is detached from any branch. Detached is the
    /// managed state for an installed repo.
    fn is_detached(&self, dest: &Path) -> Result<bool>;

    /// Update remote-tracking refs.
    fn fetch(&self, dest: &Path) -> Result<()>;

    /// Newest commit reachable from a branch or tag.
    fn latest_matching(&self, dest: &Path, reference: &str) -> Result<String>;
}
