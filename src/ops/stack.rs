//! Bringing up the compose stack on a bootstrapped host.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::util::config::StackConfig;
use crate::util::context::HostContext;
use crate::util::fs;
use crate::util::process::ProcessBuilder;
use crate::util::shell::Level;

/// Where the stack lives, resolved against the host root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackLayout {
    pub project_dir: PathBuf,
    pub compose_file: PathBuf,
}

impl StackLayout {
    pub fn resolve(ctx: &HostContext<'_>, stack: &StackConfig) -> Self {
        let project_dir = if stack.project_dir.is_absolute() {
            ctx.paths.host(&stack.project_dir)
        } else {
            stack.project_dir.clone()
        };
        let compose_file = project_dir.join(&stack.compose_file);
        StackLayout {
            project_dir,
            compose_file,
        }
    }

    fn compose(&self) -> ProcessBuilder {
        ProcessBuilder::new("docker")
            .arg("compose")
            .arg("--project-directory")
            .arg(&self.project_dir)
            .arg("-f")
            .arg(&self.compose_file)
    }
}

/// Prepare the working directories and `.env`, run the init service, then
/// start the stack detached.
pub fn bring_up_stack(ctx: &HostContext<'_>, stack: &StackConfig) -> Result<StackLayout> {
    let layout = StackLayout::resolve(ctx, stack);

    if !layout.compose_file.is_file() {
        bail!(
            "compose file not found: {}",
            layout.compose_file.display()
        );
    }

    for dir in &stack.directories {
        fs::ensure_dir(&layout.project_dir.join(dir))?;
    }

    if let Some(var) = &stack.uid_variable {
        let uid = user_uid(ctx, &ctx.settings.user)?;
        ensure_env_var(&layout.project_dir.join(".env"), var, &uid)?;
    }

    if let Some(init) = &stack.init_service {
        let span = ctx.shell.span(format!("Running init service {}", init));
        let cmd = layout.compose().args(["run", "--rm", init.as_str()]);
        if let Err(e) = run_checked(ctx, &cmd) {
            span.finish(Level::Error, format!("{} failed", init));
            return Err(e);
        }
        span.finish(Level::Success, format!("{} completed", init));
    }

    run_checked(ctx, &layout.compose().args(["up", "-d"]))?;
    ctx.shell.success(format!(
        "Stack started from {}",
        layout.compose_file.display()
    ));
    Ok(layout)
}

fn run_checked(ctx: &HostContext<'_>, cmd: &ProcessBuilder) -> Result<()> {
    let output = ctx.run(cmd)?;
    if !output.success() {
        bail!("`{}` failed: {}", cmd.display_command(), output.diagnostic());
    }
    Ok(())
}

fn user_uid(ctx: &HostContext<'_>, user: &str) -> Result<String> {
    let cmd = ProcessBuilder::new("id").args(["-u", user]);
    let output = ctx
        .run(&cmd)
        .with_context(|| format!("failed to look up uid of {}", user))?;
    if !output.success() {
        bail!("failed to look up uid of {}: {}", user, output.diagnostic());
    }
    Ok(output.stdout_trimmed().to_string())
}

/// Append `var=value` to the env file unless `var` is already set there.
fn ensure_env_var(path: &Path, var: &str, value: &str) -> Result<bool> {
    let prefix = format!("{}=", var);
    let already = fs::read_to_string_opt(path)?
        .map(|contents| contents.lines().any(|l| l.trim_start().starts_with(&prefix)))
        .unwrap_or(false);
    if already {
        return Ok(false);
    }
    fs::append_line(path, &format!("{}{}", prefix, value))?;
    Ok(true)
}
