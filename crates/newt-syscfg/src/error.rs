//! Error types for syscfg resolution.

use thiserror::Error;

/// Errors raised while resolving system configuration.
#[derive(Error, Debug)]
pub enum SyscfgError {
    /// Two packages define the same setting.
    #[error("[E0203] setting {setting} defined by both {first} and {second}")]
    DuplicateDefinition {
        /// The twice-defined setting.
        setting: String,
        /// First definer.
        first: String,
        /// Second definer.
        second: String,
    },

    /// An override value does not match the setting's declared type.
    #[error(
        "[E0501] setting {setting}: value \"{value}\" from {source_pkg} is not a valid {typ}"
    )]
    TypeMismatch {
        /// The setting.
        setting: String,
        /// The offending value.
        value: String,
        /// Declared type name.
        typ: String,
        /// Package that supplied the value.
        source_pkg: String,
    },

    /// A chain of value references loops.
    #[error("[E0502] value-reference cycle: {}", chain.join(" -> "))]
    Cycle {
        /// The settings on the cycle, in reference order.
        chain: Vec<String>,
    },

    /// Conflicting engine injections; only the engine writes at this
    /// level, so disagreement is a programming error.
    #[error("[E0503] conflicting injected overrides for {setting}: \"{first}\" vs \"{second}\"")]
    Ambiguous {
        /// The setting.
        setting: String,
        /// First injected value.
        first: String,
        /// Second injected value.
        second: String,
    },

    /// Several failures, reported together.
    #[error("syscfg resolution failed:\n{}", list(.0))]
    Composite(Vec<SyscfgError>),
}

fn list(errors: &[SyscfgError]) -> String {
    errors
        .iter()
        .map(|e| format!("    {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type for syscfg operations.
pub type Result<T> = std::result::Result<T, SyscfgError>;
