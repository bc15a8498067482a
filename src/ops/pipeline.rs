//! The bootstrap pipeline.
//!
//! privilege check → index refresh → components in dependency order →
//! group memberships → final verification.
//!
//! The index refresh is deferred until the first component that actually
//! needs work, so a run on an already provisioned host changes nothing.

use crate::core::component::Component;
use crate::core::outcome::{InstallOutcome, InstallationResult, RefreshOutcome};
use crate::core::summary::RunSummary;
use crate::ops::errors::BootstrapError;
use crate::ops::groups::ensure_group_membership;
use crate::ops::install::{install_component, probe_component};
use crate::ops::plan::plan_components;
use crate::ops::privilege::{require_elevated_privileges, Identity};
use crate::ops::refresh::refresh_index;
use crate::ops::verify::verify_all;
use crate::util::config::GroupConfig;
use crate::util::context::HostContext;
use crate::util::shell::Level;

/// Options for [`bootstrap`].
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// Do not refresh the package index before installing
    pub skip_refresh: bool,
    /// Restrict the run to these components and their prerequisites
    pub only: Vec<String>,
}

/// Run the whole bootstrap.
///
/// `Err` is returned only for fatal conditions; component and group
/// failures are recorded in the returned summary.
pub fn bootstrap(
    ctx: &HostContext<'_>,
    identity: &Identity,
    components: &[Component],
    groups: &[GroupConfig],
    opts: &BootstrapOptions,
) -> Result<RunSummary, BootstrapError> {
    require_elevated_privileges(identity)?;

    let ordered = plan_components(components, &opts.only)?;
    tracing::debug!(
        "bootstrapping {} component(s) for user {}",
        ordered.len(),
        ctx.settings.user
    );

    let mut refresh: Option<RefreshOutcome> = if opts.skip_refresh {
        Some(RefreshOutcome::NotRun)
    } else {
        None
    };
    let mut results: Vec<InstallationResult> = Vec::with_capacity(ordered.len());

    for component in &ordered {
        ctx.deadline.check()?;

        if refresh.is_none() && needs_work(ctx, component, &results) {
            refresh = Some(run_refresh(ctx)?);
        }

        let span = ctx.shell.span(format!("Processing {}", component.name));
        let result = install_component(ctx, component, &results);
        let level = match result.outcome {
            InstallOutcome::AlreadySatisfied | InstallOutcome::Installed => Level::Success,
            InstallOutcome::Skipped => Level::Warning,
            InstallOutcome::Failed => Level::Error,
        };
        span.finish(
            level,
            format!("{}: {} ({})", component.name, result.outcome, result.detail),
        );
        ctx.shell.json_event(&serde_json::json!({
            "reason": "component",
            "component": &result.component,
            "outcome": result.outcome,
            "detail": &result.detail,
            "version": &result.version,
        }));

        results.push(result);
    }

    ctx.deadline.check()?;

    let memberships = groups
        .iter()
        .map(|group| ensure_group_membership(ctx, &ctx.settings.user, group))
        .collect();

    Ok(verify_all(
        ctx,
        &ordered,
        refresh.unwrap_or(RefreshOutcome::NotRun),
        &results,
        memberships,
    ))
}

/// Whether `component` will change the host (its prerequisites are met and
/// its probe is not satisfied).
fn needs_work(ctx: &HostContext<'_>, component: &Component, prior: &[InstallationResult]) -> bool {
    let deps_ok = component
        .requires
        .iter()
        .all(|dep| prior.iter().any(|r| &r.component == dep && r.outcome.is_ok()));
    deps_ok && !probe_component(ctx, component).is_satisfied()
}

fn run_refresh(ctx: &HostContext<'_>) -> Result<RefreshOutcome, BootstrapError> {
    let span = ctx.shell.span("Refreshing package index");
    match refresh_index(ctx) {
        Ok(RefreshOutcome::PartialFailure(reason)) => {
            span.finish(
                Level::Warning,
                format!("Package index refreshed with warnings: {}", reason),
            );
            Ok(RefreshOutcome::PartialFailure(reason))
        }
        Ok(outcome) => {
            span.finish(Level::Success, "Package index refreshed");
            Ok(outcome)
        }
        Err(e) => {
            span.finish(Level::Error, "Package index refresh failed");
            Err(e)
        }
    }
}
