//! Bootstrap operations.
//!
//! Each step of the pipeline lives in its own module and takes a
//! [`HostContext`](crate::util::context::HostContext).

pub mod errors;
pub mod groups;
pub mod install;
pub mod pipeline;
pub mod plan;
pub mod privilege;
pub mod refresh;
pub mod repository;
pub mod select;
pub mod stack;
pub mod verify;

pub use errors::BootstrapError;
pub use groups::{check_group_membership, ensure_group_membership};
pub use install::{install_component, probe_component, ProbeState};
pub use pipeline::{bootstrap, BootstrapOptions};
pub use plan::{describe_plan, plan_components, PlanEntry};
pub use privilege::{require_elevated_privileges, Identity};
pub use refresh::{refresh_index, HookGuard};
pub use repository::register_repository;
pub use select::select_latest_version;
pub use stack::{bring_up_stack, StackLayout};
pub use verify::{verify_all, verify_only};
