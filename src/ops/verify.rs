//! Final verification.
//!
//! The installer's own outcome is not trusted: every component it reports
//! as usable is probed again before the run can succeed.

use crate::core::component::Component;
use crate::core::outcome::{GroupMembership, InstallOutcome, InstallationResult, RefreshOutcome};
use crate::core::summary::{ComponentVerdict, RunSummary};
use crate::ops::groups::check_group_membership;
use crate::ops::install::{probe_component, ProbeState};
use crate::util::config::GroupConfig;
use crate::util::context::HostContext;

/// Re-probe the components of a finished run and aggregate the summary.
pub fn verify_all(
    ctx: &HostContext<'_>,
    components: &[Component],
    refresh: RefreshOutcome,
    installs: &[InstallationResult],
    groups: Vec<GroupMembership>,
) -> RunSummary {
    let verdicts = installs
        .iter()
        .map(|result| {
            let component = components.iter().find(|c| c.name == result.component);
            match component {
                Some(component) if result.outcome.is_ok() => {
                    verdict_from_probe(result, component, probe_component(ctx, component))
                }
                _ => ComponentVerdict {
                    component: result.component.clone(),
                    outcome: result.outcome,
                    verified: false,
                    detail: result.detail.clone(),
                    version: result.version.clone(),
                    service: component.and_then(Component::service).map(str::to_string),
                },
            }
        })
        .collect();

    RunSummary {
        refresh,
        components: verdicts,
        groups,
        elapsed_secs: ctx.deadline.elapsed().as_secs_f64(),
    }
}

fn verdict_from_probe(
    result: &InstallationResult,
    component: &Component,
    state: ProbeState,
) -> ComponentVerdict {
    let verified = state.is_satisfied();
    ComponentVerdict {
        component: result.component.clone(),
        outcome: result.outcome,
        verified,
        detail: if verified {
            result.detail.clone()
        } else {
            state.to_string()
        },
        version: state
            .version()
            .map(str::to_string)
            .or_else(|| result.version.clone()),
        service: component.service().map(str::to_string),
    }
}

/// Check the host without changing anything (`hostprep verify`).
pub fn verify_only(
    ctx: &HostContext<'_>,
    components: &[Component],
    groups: &[GroupConfig],
) -> RunSummary {
    let verdicts = components
        .iter()
        .map(|component| {
            let state = probe_component(ctx, component);
            let verified = state.is_satisfied();
            ComponentVerdict {
                component: component.name.clone(),
                outcome: if verified {
                    InstallOutcome::AlreadySatisfied
                } else {
                    InstallOutcome::Failed
                },
                verified,
                detail: state.to_string(),
                version: state.version().map(str::to_string),
                service: component.service().map(str::to_string),
            }
        })
        .collect();

    let user = ctx.settings.user.as_str();
    let memberships = groups
        .iter()
        .map(|group| check_group_membership(ctx, user, group))
        .collect();

    RunSummary {
        refresh: RefreshOutcome::NotRun,
        components: verdicts,
        groups: memberships,
        elapsed_secs: ctx.deadline.elapsed().as_secs_f64(),
    }
}
