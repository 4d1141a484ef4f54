//! The package/API resolver and the `Resolution` it produces.
//!
//! Starting from a target's seed set (app, BSP, optional loader,
//! unit-test package, compiler), the resolver fix-point iterates
//! package expansion, syscfg resolution, and API binding until a full
//! pass introduces no new package, no new setting history entry, and no
//! new binding. The result is packaged into a read-only [`Resolution`]
//! for the downstream build stages.

pub mod error;
pub mod resolution;
pub mod resolver;

pub use error::{ResolveError, Result};
pub use resolution::{ApiBinding, LogEntry, Resolution, ResolvedPkg, StageFunc};
pub use resolver::{resolve_target, ResolveParams};
