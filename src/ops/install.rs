//! Probe, install and re-verify one component.
//!
//! The installer never aborts the run on its own: every problem becomes an
//! [`InstallOutcome`] on the returned [`InstallationResult`]. Fatal
//! conditions (timeouts, interrupts) are checked by the pipeline between
//! components.

use std::fmt;

use crate::core::component::{Component, Vars};
use crate::core::outcome::{InstallOutcome, InstallationResult, RefreshOutcome, RegisterOutcome};
use crate::core::version::VersionCandidate;
use crate::ops::refresh::refresh_index;
use crate::ops::repository::{register_repository, remove_source_line};
use crate::ops::select::select_latest_version;
use crate::util::context::HostContext;
use crate::util::process::ProcessBuilder;

/// What the probe found on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeState {
    /// The probe command is missing or failed.
    Absent(String),
    /// Present, but older than the configured minimum.
    Outdated { found: Option<String>, minimum: String },
    /// Present, but its service is not running.
    Inactive { unit: String, version: Option<String> },
    Satisfied { version: Option<String> },
}

impl ProbeState {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, ProbeState::Satisfied { .. })
    }

    pub fn version(&self) -> Option<&str> {
        match self {
            ProbeState::Satisfied { version } | ProbeState::Inactive { version, .. } => {
                version.as_deref()
            }
            ProbeState::Outdated { found, .. } => found.as_deref(),
            ProbeState::Absent(_) => None,
        }
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeState::Absent(reason) => write!(f, "not found ({})", reason),
            ProbeState::Outdated { found, minimum } => write!(
                f,
                "version {} is older than required {}",
                found.as_deref().unwrap_or("unknown"),
                minimum
            ),
            ProbeState::Inactive { unit, .. } => write!(f, "service {} is not active", unit),
            ProbeState::Satisfied { version: Some(v) } => write!(f, "present ({})", v),
            ProbeState::Satisfied { version: None } => f.write_str("present"),
        }
    }
}

/// Check whether `component` is present, recent enough and running.
///
/// Read-only; also used as the post-install verification.
pub fn probe_component(ctx: &HostContext<'_>, component: &Component) -> ProbeState {
    let argv = ctx.vars().render_all(&component.probe.command);
    let Some(cmd) = ProcessBuilder::from_argv(&argv) else {
        return ProbeState::Absent("empty probe command".to_string());
    };

    let output = match ctx.run(&cmd) {
        Ok(output) => output,
        Err(e) => return ProbeState::Absent(format!("{:#}", e)),
    };
    if !output.success() {
        return ProbeState::Absent(output.diagnostic());
    }

    let found = VersionCandidate::find_in(&output.stdout)
        .or_else(|| VersionCandidate::find_in(&output.stderr));
    let version = found.as_ref().map(|v| v.raw().to_string());

    if let Some(minimum) = &component.min_version {
        let ok = match (&found, VersionCandidate::parse(minimum)) {
            (Some(found), Some(min)) => found.satisfies(&min),
            _ => false,
        };
        if !ok {
            return ProbeState::Outdated {
                found: version,
                minimum: minimum.clone(),
            };
        }
    }

    if let Some(unit) = component.service() {
        if !service_active(ctx, unit) {
            return ProbeState::Inactive {
                unit: unit.to_string(),
                version,
            };
        }
    }

    ProbeState::Satisfied { version }
}

fn service_active(ctx: &HostContext<'_>, unit: &str) -> bool {
    let cmd = ProcessBuilder::new("systemctl").args(["is-active", unit]);
    matches!(ctx.run(&cmd), Ok(output) if output.success() && output.stdout_trimmed() == "active")
}

fn activate_service(ctx: &HostContext<'_>, unit: &str) -> Result<(), String> {
    let cmd = ProcessBuilder::new("systemctl").args(["enable", "--now", unit]);
    let output = ctx.run(&cmd).map_err(|e| format!("{:#}", e))?;
    if output.success() {
        ctx.shell.detail(format!("Started service {}", unit));
        Ok(())
    } else {
        Err(format!("could not start {}: {}", unit, output.diagnostic()))
    }
}

/// Bring `component` to the satisfied state.
///
/// `prior` holds the results of components processed earlier in this run;
/// a component whose prerequisite is not among the successes is skipped.
pub fn install_component(
    ctx: &HostContext<'_>,
    component: &Component,
    prior: &[InstallationResult],
) -> InstallationResult {
    let name = component.name.as_str();

    for dep in &component.requires {
        let ready = prior
            .iter()
            .any(|r| &r.component == dep && r.outcome.is_ok());
        if !ready {
            return InstallationResult::new(
                name,
                InstallOutcome::Skipped,
                format!("requires {}, which is not installed", dep),
            );
        }
    }

    let state = probe_component(ctx, component);
    let found = state.to_string();
    tracing::debug!("{}: {}", name, found);

    match state {
        ProbeState::Satisfied { version } => {
            InstallationResult::new(name, InstallOutcome::AlreadySatisfied, "already present")
                .with_version(version)
        }
        ProbeState::Inactive { unit, .. } => match activate_service(ctx, &unit) {
            Ok(()) => reverify(ctx, component, format!("service {} activated", unit)),
            Err(reason) => InstallationResult::new(name, InstallOutcome::Failed, reason),
        },
        ProbeState::Absent(_) | ProbeState::Outdated { .. } => {
            ctx.shell.detail(format!("{}: {}", name, found));
            match install_packages(ctx, component) {
                Ok(summary) => reverify(ctx, component, summary),
                Err(result) => result,
            }
        }
    }
}

/// Register the repository, pick a version, install, run post-install steps.
fn install_packages(
    ctx: &HostContext<'_>,
    component: &Component,
) -> Result<String, InstallationResult> {
    let name = component.name.as_str();
    let failed = |detail: String| InstallationResult::new(name, InstallOutcome::Failed, detail);

    if let Some(repo) = &component.repository {
        match register_repository(ctx, repo) {
            RegisterOutcome::AlreadyRegistered => {}
            RegisterOutcome::Registered { source_added } => {
                ctx.shell.info(format!("Registered package repository {}", repo.name));
                match refresh_index(ctx) {
                    Ok(RefreshOutcome::PartialFailure(reason)) => ctx
                        .shell
                        .warn(format!("package index refreshed with warnings: {}", reason)),
                    Ok(_) => {}
                    Err(e) if source_added => {
                        let detail = match remove_source_line(ctx, repo) {
                            Ok(_) => format!("{}; removed the {} source again", e, repo.name),
                            Err(undo) => format!(
                                "{}; could not remove the {} source: {:#}",
                                e, repo.name, undo
                            ),
                        };
                        return Err(failed(detail));
                    }
                    Err(e) => return Err(failed(e.to_string())),
                }
            }
            RegisterOutcome::Failed(reason) => {
                return Err(InstallationResult::new(
                    name,
                    InstallOutcome::Skipped,
                    format!("repository {} unavailable: {}", repo.name, reason),
                ));
            }
        }
    }

    let mut vars: Vars = ctx.vars();
    if let Some(query) = &component.install.version_query {
        let selected = select_latest_version(ctx, query).map_err(|e| failed(e.to_string()))?;

        if let Some(minimum) = component.min_version.as_deref().and_then(VersionCandidate::parse) {
            if !selected.satisfies(&minimum) {
                return Err(failed(format!(
                    "newest available version {} is older than required {}",
                    selected, minimum
                )));
            }
        }

        ctx.shell.detail(format!("{}: selected version {}", name, selected));
        vars = vars.with("version", selected.raw());
    }

    let packages = vars.render_all(&component.install.packages);
    if !packages.is_empty() {
        let install = ctx.apt_get(["install", "-y"]).args(&packages);
        let output = ctx.run(&install).map_err(|e| failed(format!("{:#}", e)))?;
        if !output.success() {
            return Err(failed(format!(
                "apt-get install {} failed: {}",
                packages.join(" "),
                output.diagnostic()
            )));
        }
    }

    for step in &component.install.post_install {
        let argv = vars.render_all(step);
        let Some(cmd) = ProcessBuilder::from_argv(&argv) else {
            continue;
        };
        let output = ctx.run(&cmd).map_err(|e| failed(format!("{:#}", e)))?;
        if !output.success() {
            return Err(failed(format!(
                "`{}` failed: {}",
                cmd.display_command(),
                output.diagnostic()
            )));
        }
    }

    if let Some(unit) = component.service() {
        if !service_active(ctx, unit) {
            activate_service(ctx, unit).map_err(failed)?;
        }
    }

    Ok(format!("installed {}", packages.join(" ")))
}

/// Re-probe after a change; only a satisfied probe counts as installed.
fn reverify(ctx: &HostContext<'_>, component: &Component, detail: String) -> InstallationResult {
    match probe_component(ctx, component) {
        ProbeState::Satisfied { version } => {
            InstallationResult::new(&component.name, InstallOutcome::Installed, detail)
                .with_version(version)
        }
        other => InstallationResult::new(
            &component.name,
            InstallOutcome::Failed,
            format!("still unsatisfied after install: {}", other),
        )
        .with_version(other.version().map(str::to_string)),
    }
}
