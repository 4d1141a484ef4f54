//! Repository handling for newt: descriptors, the project manifest, the
//! version matrix, and the repo resolution algorithm.
//!
//! A project names a set of remote repositories at version requirements;
//! each published repo version may in turn depend on other repos. The
//! [`resolve`] entry point selects one version (commit) of every repo
//! such that all requirements hold simultaneously, or reports a minimal,
//! deterministic conflict list.

pub mod descriptor;
pub mod error;
pub mod graph;
pub mod matrix;
pub mod project;
pub mod resolve;

pub use descriptor::{CompatCode, CompatStatus, RepoDescriptor, RepoReq};
pub use error::{Conflict, ConflictKind, Contributor, RepoError, Result};
pub use graph::{DepGraph, DepNode};
pub use matrix::{MatrixRow, VersionMatrix};
pub use project::{ProjectManifest, RepoSpec, RequirementMap};
pub use resolve::{resolve, RepoResolution, VersionMap};
