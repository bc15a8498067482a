//! Core data structures for hostprep.
//!
//! - Components and their declarative install recipes
//! - Step outcomes and the run summary
//! - Dotted-numeric versions
//! - Host facts (distribution, codename, architecture)

pub mod catalog;
pub mod component;
pub mod facts;
pub mod outcome;
pub mod summary;
pub mod version;

pub use component::{Component, RepositorySpec};
pub use facts::HostFacts;
pub use outcome::{GroupMembership, GroupOutcome, InstallOutcome, InstallationResult};
pub use summary::RunSummary;
pub use version::VersionCandidate;
