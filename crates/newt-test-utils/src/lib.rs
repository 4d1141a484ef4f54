//! Testing utilities for the newt workspace.
//!
//! Resolver tests run against hand-constructed in-memory inputs; these
//! builders keep those fixtures short. `unwrap` is fair game here: a
//! malformed fixture is a test bug.

pub mod builders;
pub mod mock_vcs;

pub use builders::{PkgBuilder, RepoBuilder, TargetBuilder};
pub use mock_vcs::MockVcs;
