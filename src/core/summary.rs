//! Aggregated terminal outcome of a bootstrap run.

use serde::Serialize;

use crate::core::outcome::{GroupMembership, GroupOutcome, InstallOutcome, RefreshOutcome};
use crate::util::shell::{Level, Shell};

/// Per-component line of the summary: the installer's claim plus the re-probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentVerdict {
    pub component: String,
    /// What the installer reported.
    pub outcome: InstallOutcome,
    /// Whether the independent re-probe found the component satisfied.
    pub verified: bool,
    pub detail: String,
    pub version: Option<String>,
    /// systemd unit backing the component, for runtimes such as Docker
    pub service: Option<String>,
}

impl ComponentVerdict {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok() && self.verified
    }
}

/// Everything the final verifier knows about a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub refresh: RefreshOutcome,
    pub components: Vec<ComponentVerdict>,
    pub groups: Vec<GroupMembership>,
    pub elapsed_secs: f64,
}

impl RunSummary {
    /// Terminal success: every component usable and re-verified, and no
    /// required group membership failed. A missing group is not a failure.
    pub fn is_success(&self) -> bool {
        self.components.iter().all(ComponentVerdict::passed)
            && !self.groups.iter().any(GroupMembership::is_blocking)
    }

    /// The first thing that went wrong, in pipeline order.
    pub fn first_failure(&self) -> Option<String> {
        if let Some(v) = self.components.iter().find(|v| !v.passed()) {
            let what = if v.outcome.is_ok() {
                "failed verification".to_string()
            } else {
                v.outcome.to_string()
            };
            return Some(format!("{} {}: {}", v.component, what, v.detail));
        }

        self.groups
            .iter()
            .find(|g| g.is_blocking())
            .map(|g| format!("adding {} to group {} failed: {}", g.user, g.group, g.detail))
    }

    /// Groups the user was added to during this run.
    pub fn added_groups(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| g.outcome == GroupOutcome::Added)
            .map(|g| g.group.as_str())
            .collect()
    }

    /// Service-backed components (runtimes) installed or started by this run.
    pub fn new_runtimes(&self) -> Vec<&str> {
        self.components
            .iter()
            .filter(|v| v.service.is_some() && v.outcome == InstallOutcome::Installed)
            .map(|v| v.component.as_str())
            .collect()
    }

    /// Whether the user must start a new session: group changes and a
    /// freshly installed runtime's socket permissions only apply to new
    /// logins.
    pub fn relogin_required(&self) -> bool {
        !self.added_groups().is_empty() || !self.new_runtimes().is_empty()
    }

    /// Number of components that passed.
    pub fn passed_count(&self) -> usize {
        self.components.iter().filter(|v| v.passed()).count()
    }

    /// Number of components that did not pass.
    pub fn failed_count(&self) -> usize {
        self.components.len() - self.passed_count()
    }

    /// Print the human-readable summary.
    ///
    /// In JSON mode a single `summary` event is emitted instead.
    pub fn report(&self, shell: &Shell) {
        if shell.is_json() {
            let mut event = serde_json::to_value(self).unwrap_or_default();
            if let Some(obj) = event.as_object_mut() {
                obj.insert("reason".into(), "summary".into());
                obj.insert("success".into(), self.is_success().into());
                obj.insert("relogin_required".into(), self.relogin_required().into());
            }
            shell.json_event(&event);
            return;
        }

        shell.info("Summary:");
        if let RefreshOutcome::PartialFailure(reason) = &self.refresh {
            shell.warn(format!("  package index: refreshed with warnings ({})", reason));
        }

        for v in &self.components {
            let version = v
                .version
                .as_deref()
                .map(|ver| format!(" {}", ver))
                .unwrap_or_default();
            if v.passed() {
                shell.success(format!("  {}{}: {}", v.component, version, v.outcome));
            } else if v.outcome.is_ok() {
                shell.error(format!(
                    "  {}: reported {} but verification failed: {}",
                    v.component, v.outcome, v.detail
                ));
            } else {
                shell.error(format!("  {}: {}: {}", v.component, v.outcome, v.detail));
            }
        }

        for g in &self.groups {
            let line = format!("  group {} for {}: {}", g.group, g.user, g.outcome);
            match g.outcome {
                GroupOutcome::AlreadyMember | GroupOutcome::Added => shell.success(line),
                GroupOutcome::GroupAbsent => shell.info(line),
                GroupOutcome::Failed if g.required => shell.error(format!("{}: {}", line, g.detail)),
                GroupOutcome::Failed => shell.warn(format!("{}: {}", line, g.detail)),
            }
        }

        let added = self.added_groups();
        let runtimes = self.new_runtimes();
        if !added.is_empty() {
            shell.warn(format!(
                "Log out and back in (or run `newgrp {}`) for membership in {} to take effect",
                added[0],
                added.join(", ")
            ));
        } else if !runtimes.is_empty() {
            shell.warn(format!(
                "Log out and back in before using {} so your session picks up its permissions",
                runtimes.join(", ")
            ));
        }

        if self.is_success() {
            shell.success(format!(
                "Host bootstrap complete: {} component(s) ready",
                self.passed_count()
            ));
        } else if let Some(failure) = self.first_failure() {
            shell.error(format!("Host bootstrap failed: {}", failure));
        }
    }
}
