//! The package model: package manifests (`pkg.yml` + `syscfg.yml`),
//! targets, and the lazily-loading package registry.

pub mod error;
pub mod package;
pub mod registry;
pub mod target;
pub mod types;

pub use error::{PkgError, Result};
pub use package::{ApiDecl, LogDecl, OverrideVal, Package, PkgDep};
pub use registry::PkgRegistry;
pub use target::Target;
pub use types::PackageType;
