//! Error types for package loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or looking up packages.
#[derive(Error, Debug)]
pub enum PkgError {
    /// Core parse error (manifests, names, expressions).
    #[error(transparent)]
    Core(#[from] newt_core::Error),

    /// Referenced package not found in any loaded repo.
    #[error("[E0401] unknown package \"{name}\"")]
    UnknownPackage {
        /// The missing package.
        name: String,
    },

    /// A package name appears twice.
    #[error("[E0402] package \"{name}\" defined in both {first} and {second}")]
    DuplicatePackage {
        /// The twice-defined package.
        name: String,
        /// Where it was first seen.
        first: String,
        /// Where it was seen again.
        second: String,
    },

    /// Filesystem error while scanning a repo.
    #[error("[E0201] failed to read {}: {source}", path.display())]
    Io {
        /// The file or directory involved.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for package operations.
pub type Result<T> = std::result::Result<T, PkgError>;
