//! Command implementations

pub mod bootstrap;
pub mod completions;
pub mod plan;
pub mod up;
pub mod verify;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cli::{Cli, MessageFormat};
use hostprep::core::facts::HostFacts;
use hostprep::core::summary::RunSummary;
use hostprep::ops::Identity;
use hostprep::util::config::{load_config, Config};
use hostprep::util::context::{Deadline, HostContext, HostPaths, RunSettings};
use hostprep::util::diagnostic::Diagnostic;
use hostprep::util::fetch::KeyFetcher;
use hostprep::util::process::CommandRunner;
use hostprep::util::Shell;

/// Global flags shared by every command.
pub struct GlobalOpts {
    pub verbose: bool,
    pub quiet: bool,
    pub json: bool,
    pub color: hostprep::util::shell::ColorChoice,
    pub config: Option<PathBuf>,
    pub root: PathBuf,
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    pub fn from_cli(cli: &Cli) -> Self {
        GlobalOpts {
            verbose: cli.verbose,
            quiet: cli.quiet,
            json: cli.message_format == MessageFormat::Json,
            color: cli.color,
            config: cli.config.clone(),
            root: cli.root.clone(),
            timeout: cli.timeout,
        }
    }
}

/// Loaded configuration plus the output shell.
pub struct Session {
    pub shell: Arc<Shell>,
    pub config: Config,
    pub identity: Identity,
    pub root: PathBuf,
    timeout_secs: u64,
}

impl Session {
    /// Build the shell and load configuration; a config error ends the process.
    pub fn load(global: &GlobalOpts) -> Session {
        let shell = Arc::new(Shell::from_flags(
            global.quiet,
            global.verbose,
            global.color,
            global.json,
        ));

        let config = match load_config(global.config.as_deref(), &global.root) {
            Ok((config, source)) => {
                if let Some(path) = source {
                    shell.detail(format!("Using configuration from {}", path.display()));
                }
                config
            }
            Err(e) => fail(&shell, e.to_diagnostic()),
        };

        let identity = Identity::current(config.run.user.as_deref());
        let timeout_secs = global.timeout.unwrap_or(config.run.timeout_secs);

        Session {
            shell,
            config,
            identity,
            root: global.root.clone(),
            timeout_secs,
        }
    }

    fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Detect host facts and assemble the run context.
    pub fn context<'a>(
        &self,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn KeyFetcher,
    ) -> Result<HostContext<'a>> {
        let facts = HostFacts::detect(runner, &self.root, self.config.run.codename.as_deref())
            .context("failed to detect host facts")?;
        tracing::debug!(
            "host: {} {} ({})",
            facts.distro,
            facts.codename,
            facts.arch
        );
        if facts.codename_assumed {
            self.shell.warn(format!(
                "No release codename found in os-release, assuming `{}` (set [run].codename to override)",
                facts.codename
            ));
        }

        let settings = RunSettings {
            user: self.identity.user.clone(),
            facts,
            flaky_hooks: self.config.run.flaky_hooks.clone(),
            timeout: self.timeout(),
        };

        let deadline =
            Deadline::new(settings.timeout).with_interrupt_flag(interrupt_flag(&self.shell));
        Ok(HostContext::new(
            runner,
            fetcher,
            Arc::clone(&self.shell),
            HostPaths::new(&self.root),
            settings,
        )
        .with_deadline(deadline))
    }
}

/// Flag set by Ctrl-C; checked between components.
fn interrupt_flag(shell: &Shell) -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        shell.warn(format!("Failed to install Ctrl-C handler: {}", e));
    }
    flag
}

/// Print a fatal diagnostic and exit with status 1.
pub fn fail(shell: &Shell, diag: Diagnostic) -> ! {
    if shell.is_json() {
        shell.error(diag.to_string().trim_end());
    } else {
        for line in diag.lines() {
            shell.error(line);
        }
    }
    std::process::exit(1);
}

/// Print the summary and exit with status 1 unless it is a success.
pub fn finish(shell: &Shell, summary: &RunSummary) -> Result<()> {
    summary.report(shell);
    if !summary.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
