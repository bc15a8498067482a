//! hostprep - idempotent host bootstrap for container workloads
//!
//! This crate provides the library behind the `hostprep` binary: probing
//! and installing host components, registering package repositories,
//! reconciling group membership and verifying the final host state.

pub mod core;
pub mod ops;
pub mod util;

/// Test utilities for hostprep unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// provides a simulated host behind the command-runner seam and a fake
/// signing-key fetcher.
#[cfg(test)]
pub mod test_support;

pub use core::{Component, RunSummary};
pub use ops::{bootstrap, BootstrapError, BootstrapOptions};
pub use util::context::HostContext;
