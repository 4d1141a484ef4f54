//! Error types for target resolution.

use thiserror::Error;

/// Errors raised while resolving a target.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Package loading or lookup failed.
    #[error(transparent)]
    Pkg(#[from] newt_pkg::PkgError),

    /// Syscfg validation failed.
    #[error(transparent)]
    Syscfg(#[from] newt_syscfg::SyscfgError),

    /// A required API has no provider in the closed package set.
    #[error("[E0601] api \"{api}\" required by {} has no provider", requirers.join(", "))]
    ApiUnsatisfied {
        /// The unmet API.
        api: String,
        /// Packages that require it, sorted.
        requirers: Vec<String>,
    },

    /// A required API has several providers and no tie-breaker applies.
    #[error("[E0602] api \"{api}\" provided by more than one package: {}", providers.join(", "))]
    ApiAmbiguous {
        /// The contested API.
        api: String,
        /// The competing providers, sorted.
        providers: Vec<String>,
    },

    /// Several failures, reported together.
    #[error("resolution failed:\n{}", list(.0))]
    Composite(Vec<ResolveError>),
}

fn list(errors: &[ResolveError]) -> String {
    errors
        .iter()
        .map(|e| format!("    {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ResolveError {
    /// Fold a non-empty error list into one error.
    #[must_use]
    pub fn from_list(mut errors: Vec<ResolveError>) -> Self {
        if errors.len() == 1 {
            errors.pop().expect("len checked")
        } else {
            Self::Composite(errors)
        }
    }
}

/// Result type for target resolution.
pub type Result<T> = std::result::Result<T, ResolveError>;
