//! Outcomes reported by individual bootstrap steps.
//!
//! Each step classifies what happened into one of these enums instead of
//! deciding on its own whether the run continues; the pipeline and the final
//! verifier act on the classification.

use std::fmt;

use serde::Serialize;

/// Outcome of installing one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum InstallOutcome {
    /// The probe found the component fully present; nothing was changed.
    AlreadySatisfied,
    /// Packages were installed or the service was activated, and the re-probe passed.
    Installed,
    /// An essential step failed.
    Failed,
    /// Not attempted because a prerequisite was unavailable.
    Skipped,
}

impl InstallOutcome {
    /// Whether the component is usable afterwards.
    pub fn is_ok(&self) -> bool {
        matches!(self, InstallOutcome::AlreadySatisfied | InstallOutcome::Installed)
    }
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InstallOutcome::AlreadySatisfied => "already satisfied",
            InstallOutcome::Installed => "installed",
            InstallOutcome::Failed => "failed",
            InstallOutcome::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Result of [`crate::ops::install_component`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallationResult {
    pub component: String,
    pub outcome: InstallOutcome,
    pub detail: String,
    pub version: Option<String>,
}

impl InstallationResult {
    pub fn new(
        component: impl Into<String>,
        outcome: InstallOutcome,
        detail: impl Into<String>,
    ) -> Self {
        InstallationResult {
            component: component.into(),
            outcome,
            detail: detail.into(),
            version: None,
        }
    }

    /// Set the version.
    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }
}

/// Outcome of reconciling one user/group pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum GroupOutcome {
    AlreadyMember,
    Added,
    /// The group does not exist on this host. Informational only.
    GroupAbsent,
    Failed,
}

impl fmt::Display for GroupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupOutcome::AlreadyMember => "already a member",
            GroupOutcome::Added => "added",
            GroupOutcome::GroupAbsent => "group absent",
            GroupOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Result of [`crate::ops::ensure_group_membership`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupMembership {
    pub user: String,
    pub group: String,
    pub outcome: GroupOutcome,
    /// Whether a failure here fails the run.
    pub required: bool,
    pub detail: String,
}

impl GroupMembership {
    /// Whether this membership blocks terminal success.
    pub fn is_blocking(&self) -> bool {
        self.required && self.outcome == GroupOutcome::Failed
    }
}

/// Outcome of refreshing the package index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RefreshOutcome {
    Success,
    /// The index was refreshed, but an optional hook misbehaved.
    PartialFailure(String),
    /// The refresh was not run (`--skip-refresh`, or `verify`).
    NotRun,
}

/// Outcome of registering a package repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RegisterOutcome {
    AlreadyRegistered,
    /// Key and source are in place; `source_added` is set when this call
    /// appended the source line.
    Registered { source_added: bool },
    Failed(String),
}
