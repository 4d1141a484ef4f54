//! Error types for VCS operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while driving the external VCS.
#[derive(Error, Debug)]
pub enum VcsError {
    /// Path is not a repository working tree.
    #[error("[E0802] not a repository: {}", path.display())]
    NotRepository {
        /// The offending path.
        path: PathBuf,
    },

    /// The external process exited non-zero.
    #[error("[E0802] {command} failed: {stderr}")]
    CommandFailed {
        /// The command line that ran.
        command: String,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The external process produced output we cannot use.
    #[error("[E0802] unexpected output from {command}: {detail}")]
    BadOutput {
        /// The command line that ran.
        command: String,
        /// What was wrong with the output.
        detail: String,
    },

    /// Spawning the process failed.
    #[error("[E0802] failed to run {command}: {source}")]
    Spawn {
        /// The command line that failed to start.
        command: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for VCS operations.
pub type Result<T> = std::result::Result<T, VcsError>;
