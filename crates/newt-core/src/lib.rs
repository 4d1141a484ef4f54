//! Core types and utilities for the newt build tool.
//!
//! This crate carries the pieces every other newt crate leans on:
//!
//! - [`version`]: the version model: numeric triples, stability tags,
//!   commit forms, and version requirements with their satisfaction rules
//! - [`name`]: `@repo/path` qualified package names and a symbol interner
//!   for the resolver graphs
//! - [`expr`]: the gating-expression AST shared by dependency entries,
//!   API declarations, and syscfg overrides
//! - [`error`]: the error-code catalogue and the core error type
//! - [`yaml`]: typed accessors over the generic YAML tree manifests parse
//!   into

pub mod error;
pub mod expr;
pub mod name;
pub mod version;
pub mod yaml;

pub use error::{Error, ErrorCode, Result};
pub use expr::{Expr, SettingLookup};
pub use name::{Interner, PkgName, Sym};
pub use version::{NumericVersion, Stability, VerOp, VerReq, Version};
