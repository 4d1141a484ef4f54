//! Error types for installer operations.

use newt_vcs::DirtyState;
use thiserror::Error;

/// Errors raised while installing or upgrading repos.
///
/// Unlike the resolver, the installer stops at the first failure so it
/// never leaves the filesystem half-mutated.
#[derive(Error, Debug)]
pub enum InstallError {
    /// A repo's working tree is modified and `--force` was not given.
    #[error("[E0801] repo \"{repo}\" is dirty ({state}); commit or discard changes, or use force")]
    Dirty {
        /// The offending repo.
        repo: String,
        /// How it is dirty.
        state: DirtyState,
    },

    /// One or more repos disallow this tool version. Aggregated before
    /// any filesystem mutation.
    #[error("[E0701] tool incompatible with the resolved repos:\n{}", messages.join("\n"))]
    NewtCompat {
        /// One message per error-coded repo.
        messages: Vec<String>,
    },

    /// The external VCS failed.
    #[error(transparent)]
    Vcs(#[from] newt_vcs::VcsError),
}

/// Result type for installer operations.
pub type Result<T> = std::result::Result<T, InstallError>;
