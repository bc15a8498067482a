//! Run context shared by every bootstrap step.
//!
//! Bundles the host seams (command runner, key fetcher), the output shell,
//! host paths, the resolved run settings and the time budget. Steps take a
//! `&HostContext` instead of reading process-global state.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::core::component::Vars;
use crate::core::facts::HostFacts;
use crate::ops::errors::BootstrapError;
use crate::util::fetch::KeyFetcher;
use crate::util::process::{CommandRunner, ProcessBuilder, ProcessOutput};
use crate::util::shell::Shell;

/// Resolves host-relative paths against the host root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    root: PathBuf,
}

impl HostPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        HostPaths { root: root.into() }
    }

    /// The host root (`/` on a real host).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of `relative` (e.g. `etc/apt/sources.list.d/docker.list`) on the host.
    pub fn host(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        let relative = relative.strip_prefix("/").unwrap_or(relative);
        self.root.join(relative)
    }
}

impl Default for HostPaths {
    fn default() -> Self {
        HostPaths::new("/")
    }
}

/// Run settings resolved from config, environment and host facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// User whose group membership is reconciled
    pub user: String,
    pub facts: HostFacts,
    /// Hooks moved aside during index refresh, relative to the root
    pub flaky_hooks: Vec<PathBuf>,
    /// Overall budget; `None` disables it
    pub timeout: Option<Duration>,
}

/// Wall-clock budget plus operator interrupt flag.
#[derive(Debug, Clone)]
pub struct Deadline {
    started: Instant,
    budget: Option<Duration>,
    interrupted: Arc<AtomicBool>,
}

impl Deadline {
    pub fn new(budget: Option<Duration>) -> Self {
        Deadline {
            started: Instant::now(),
            budget,
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an interrupt flag set by a signal handler.
    pub fn with_interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupted = flag;
        self
    }

    /// Time since the run started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Fail if the run was interrupted or ran out of time.
    pub fn check(&self) -> Result<(), BootstrapError> {
        if self.interrupted.load(Ordering::SeqCst) {
            return Err(BootstrapError::Interrupted);
        }
        if let Some(budget) = self.budget {
            if self.started.elapsed() > budget {
                return Err(BootstrapError::Timeout {
                    budget_secs: budget.as_secs(),
                });
            }
        }
        Ok(())
    }
}

/// Everything a bootstrap step needs.
pub struct HostContext<'a> {
    pub runner: &'a dyn CommandRunner,
    pub fetcher: &'a dyn KeyFetcher,
    pub shell: Arc<Shell>,
    pub paths: HostPaths,
    pub settings: RunSettings,
    pub deadline: Deadline,
}

impl<'a> HostContext<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn KeyFetcher,
        shell: Arc<Shell>,
        paths: HostPaths,
        settings: RunSettings,
    ) -> Self {
        let deadline = Deadline::new(settings.timeout);
        HostContext {
            runner,
            fetcher,
            shell,
            paths,
            settings,
            deadline,
        }
    }

    /// Replace the deadline (to share an interrupt flag).
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run an external command through the runner.
    pub fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput> {
        tracing::debug!("$ {}", cmd.display_command());
        let output = self.runner.run(cmd)?;
        if !output.success() {
            tracing::debug!(
                "`{}` exited with {:?}: {}",
                cmd.display_command(),
                output.code,
                output.diagnostic()
            );
        }
        Ok(output)
    }

    /// An `apt-get` invocation that never prompts.
    pub fn apt_get<I, S>(&self, args: I) -> ProcessBuilder
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        ProcessBuilder::new("apt-get")
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
    }

    /// Template variables for this host.
    pub fn vars(&self) -> Vars {
        self.settings
            .facts
            .vars()
            .with("user", self.settings.user.as_str())
    }
}
