//! Error types for newt operations.
//!
//! Every error carries a unique code (e.g. E0101) so messages can be
//! searched and referenced from documentation. The catalogue below spans
//! the whole workspace; subsystem crates embed the codes in their own
//! error types and this crate defines the errors raised by the core
//! parsers themselves.

use std::fmt;
use thiserror::Error;

/// Error codes for newt errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Version errors (E01xx)
    /// Unparsable version string
    E0101,
    /// Unparsable version requirement
    E0102,
    /// Version map is cyclic or dangling
    E0103,

    // Manifest errors (E02xx)
    /// Malformed manifest document
    E0201,
    /// Required field missing
    E0202,
    /// Duplicate key
    E0203,

    // Repo resolution errors (E03xx)
    /// Referenced repo not found
    E0301,
    /// No version map satisfies all requirements
    E0302,
    /// A project requirement matches no published version
    E0303,
    /// A repo has no version satisfying its dependents
    E0304,

    // Package errors (E04xx)
    /// Referenced package not found
    E0401,
    /// Package defined more than once
    E0402,
    /// Invalid package name
    E0403,

    // Syscfg errors (E05xx)
    /// Override value does not match the declared type
    E0501,
    /// Cyclic value reference
    E0502,
    /// Ambiguous overrides at equal precedence
    E0503,
    /// Override names an undefined setting
    E0504,
    /// Setting restriction violated
    E0505,

    // API errors (E06xx)
    /// Required API has no provider
    E0601,
    /// Required API has multiple providers
    E0602,

    // Compatibility errors (E07xx)
    /// Tool/repo version pairing disallowed
    E0701,

    // Installer / VCS errors (E08xx)
    /// Working tree modified and --force not given
    E0801,
    /// External VCS process failed
    E0802,

    // Expression errors (E09xx)
    /// Unparsable gating expression
    E0901,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::E0101 => "E0101",
            Self::E0102 => "E0102",
            Self::E0103 => "E0103",
            Self::E0201 => "E0201",
            Self::E0202 => "E0202",
            Self::E0203 => "E0203",
            Self::E0301 => "E0301",
            Self::E0302 => "E0302",
            Self::E0303 => "E0303",
            Self::E0304 => "E0304",
            Self::E0401 => "E0401",
            Self::E0402 => "E0402",
            Self::E0403 => "E0403",
            Self::E0501 => "E0501",
            Self::E0502 => "E0502",
            Self::E0503 => "E0503",
            Self::E0504 => "E0504",
            Self::E0505 => "E0505",
            Self::E0601 => "E0601",
            Self::E0602 => "E0602",
            Self::E0701 => "E0701",
            Self::E0801 => "E0801",
            Self::E0802 => "E0802",
            Self::E0901 => "E0901",
        }
    }

    /// Get a brief title for this error code.
    #[must_use]
    pub const fn title(&self) -> &'static str {
        match self {
            Self::E0101 => "Bad version",
            Self::E0102 => "Bad requirement",
            Self::E0103 => "Bad version map",
            Self::E0201 => "Bad manifest",
            Self::E0202 => "Missing field",
            Self::E0203 => "Duplicate key",
            Self::E0301 => "Unknown repo",
            Self::E0302 => "Version conflict",
            Self::E0303 => "Unsatisfiable root requirement",
            Self::E0304 => "Repo unsatisfiable",
            Self::E0401 => "Unknown package",
            Self::E0402 => "Duplicate package",
            Self::E0403 => "Bad package name",
            Self::E0501 => "Syscfg type mismatch",
            Self::E0502 => "Syscfg value-reference cycle",
            Self::E0503 => "Ambiguous syscfg override",
            Self::E0504 => "Unknown setting",
            Self::E0505 => "Restriction violated",
            Self::E0601 => "API unsatisfied",
            Self::E0602 => "API ambiguous",
            Self::E0701 => "Tool incompatible",
            Self::E0801 => "Repo dirty",
            Self::E0802 => "VCS failure",
            Self::E0901 => "Bad gating expression",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised by the core parsers.
#[derive(Error, Debug)]
pub enum Error {
    /// Unparsable version string.
    #[error("[E0101] bad version \"{input}\": {reason}")]
    BadVersion {
        /// The offending input.
        input: String,
        /// What went wrong.
        reason: String,
    },

    /// Unparsable version requirement.
    #[error("[E0102] bad version requirement \"{input}\": {reason}")]
    BadRequirement {
        /// The offending input.
        input: String,
        /// What went wrong.
        reason: String,
    },

    /// Invalid package name.
    #[error("[E0403] bad package name \"{input}\": {reason}")]
    BadName {
        /// The offending input.
        input: String,
        /// What went wrong.
        reason: String,
    },

    /// Unparsable gating expression.
    #[error("[E0901] bad expression \"{input}\": {reason}")]
    BadExpr {
        /// The offending input.
        input: String,
        /// What went wrong.
        reason: String,
    },

    /// Malformed manifest document.
    #[error("[E0201] bad manifest ({context}): {reason}")]
    BadManifest {
        /// Where in the document the problem is.
        context: String,
        /// What went wrong.
        reason: String,
    },

    /// Required manifest field missing.
    #[error("[E0202] missing field \"{field}\" in {context}")]
    MissingField {
        /// The absent key.
        field: String,
        /// Where the key was expected.
        context: String,
    },
}

impl Error {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::BadVersion { .. } => ErrorCode::E0101,
            Self::BadRequirement { .. } => ErrorCode::E0102,
            Self::BadName { .. } => ErrorCode::E0403,
            Self::BadExpr { .. } => ErrorCode::E0901,
            Self::BadManifest { .. } => ErrorCode::E0201,
            Self::MissingField { .. } => ErrorCode::E0202,
        }
    }

    /// Create a bad-version error.
    #[must_use]
    pub fn bad_version(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadVersion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a bad-requirement error.
    #[must_use]
    pub fn bad_requirement(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadRequirement {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a bad-expression error.
    #[must_use]
    pub fn bad_expr(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadExpr {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a bad-manifest error.
    #[must_use]
    pub fn bad_manifest(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BadManifest {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Create a missing-field error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
            context: context.into(),
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        assert_eq!(ErrorCode::E0101.as_str(), "E0101");
        assert_eq!(ErrorCode::E0101.title(), "Bad version");
        assert_eq!(ErrorCode::E0302.title(), "Version conflict");
    }

    #[test]
    fn bad_version_display() {
        let err = Error::bad_version("1.x.y", "non-numeric component");
        assert_eq!(err.code(), ErrorCode::E0101);
        assert!(err.to_string().contains("[E0101]"));
        assert!(err.to_string().contains("1.x.y"));
    }

    #[test]
    fn missing_field_display() {
        let err = Error::missing_field("repo.name", "repository.yml");
        assert_eq!(err.code(), ErrorCode::E0202);
        assert!(err.to_string().contains("repo.name"));
    }
}
