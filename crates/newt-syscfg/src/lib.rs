//! System-configuration (`syscfg`) resolution.
//!
//! Every package may define settings and override other packages'
//! settings. This crate merges the definitions with the overrides under
//! the strict precedence order, validates types, restrictions, and value
//! references, detects ambiguous overrides, and projects the result to
//! the flat name -> value map the package resolver and the build
//! consume.

pub mod error;
pub mod resolver;
pub mod setting;

pub use error::{Result, SyscfgError};
pub use resolver::{AmbiguityPolicy, Syscfg, SyscfgReport};
pub use setting::{HistoryEntry, OverrideLevel, Restriction, SettingDef, SettingType};
