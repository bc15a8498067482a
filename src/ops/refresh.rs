//! Package-index refresh with flaky-hook neutralization.
//!
//! Some images ship optional APT post-update hooks (notably the
//! `command-not-found` database updater) that crash after the index itself
//! was fetched correctly. Known hooks are moved aside for the duration of
//! `apt-get update` by a [`HookGuard`], which puts them back on every exit
//! path. A failure that only names a post-update hook is downgraded to a
//! partial failure as long as apt reported no index download errors. The
//! lists on disk are not consulted: when every source answers `Hit:` apt
//! leaves them untouched.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::core::outcome::RefreshOutcome;
use crate::ops::errors::BootstrapError;
use crate::util::context::{HostContext, HostPaths};

/// Suffix appended to a hook while it is disabled.
pub const DISABLED_SUFFIX: &str = ".hostprep-disabled";

static HOOK_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(APT::Update::Post-Invoke|command-not-found|cnf-update-db)")
        .expect("valid hook regex")
});

/// apt diagnostics that mean some index could not be downloaded.
const FETCH_ERRORS: &[&str] = &[
    "Failed to fetch",
    "W: Failed",
    "Some index files failed",
    "does not have a Release file",
];

/// Moves optional hooks aside and restores them when dropped.
#[derive(Debug)]
pub struct HookGuard {
    moved: Vec<(PathBuf, PathBuf)>,
    problems: Vec<String>,
}

impl HookGuard {
    /// Disable every hook in `hooks` (relative to the host root) that exists.
    ///
    /// A hook left disabled by an earlier, aborted run is adopted so that it
    /// is restored this time. Failures are collected, not returned.
    pub fn neutralize(paths: &HostPaths, hooks: &[PathBuf]) -> Self {
        let mut guard = HookGuard {
            moved: Vec::new(),
            problems: Vec::new(),
        };

        for hook in hooks {
            let original = paths.host(hook);
            let aside = disabled_path(&original);

            if aside.exists() && !original.exists() {
                tracing::debug!("adopting previously disabled hook {}", original.display());
                guard.moved.push((original, aside));
                continue;
            }
            if !original.exists() {
                continue;
            }

            match fs::rename(&original, &aside) {
                Ok(()) => {
                    tracing::debug!("disabled hook {}", original.display());
                    guard.moved.push((original, aside));
                }
                Err(e) => guard
                    .problems
                    .push(format!("could not disable {}: {}", original.display(), e)),
            }
        }

        guard
    }

    /// Hooks currently disabled by this guard.
    pub fn disabled(&self) -> impl Iterator<Item = &Path> {
        self.moved.iter().map(|(original, _)| original.as_path())
    }

    /// Restore every hook now and report all problems seen by the guard.
    pub fn restore(mut self) -> Vec<String> {
        self.restore_all();
        std::mem::take(&mut self.problems)
    }

    fn restore_all(&mut self) {
        for (original, aside) in self.moved.drain(..) {
            if let Err(e) = fs::rename(&aside, &original) {
                tracing::debug!("failed to restore hook {}: {}", original.display(), e);
                self.problems
                    .push(format!("could not restore {}: {}", original.display(), e));
            } else {
                tracing::debug!("restored hook {}", original.display());
            }
        }
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        self.restore_all();
    }
}

fn disabled_path(original: &Path) -> PathBuf {
    let mut name = original.as_os_str().to_owned();
    name.push(DISABLED_SUFFIX);
    PathBuf::from(name)
}

/// Refresh the package index.
///
/// Returns `Err` only for a genuine index-fetch failure, which aborts the run.
pub fn refresh_index(ctx: &HostContext<'_>) -> Result<RefreshOutcome, BootstrapError> {
    let guard = HookGuard::neutralize(&ctx.paths, &ctx.settings.flaky_hooks);
    for hook in guard.disabled() {
        ctx.shell
            .detail(format!("Temporarily disabled {}", hook.display()));
    }

    let result = ctx.run(&ctx.apt_get(["update"]));
    let mut problems = guard.restore();

    let output = result.map_err(|e| BootstrapError::IndexRefresh {
        message: format!("{:#}", e),
    })?;

    if !output.success() {
        let diagnostic = output.diagnostic();
        if hook_failure_only(&output.stdout, &output.stderr) {
            problems.insert(0, format!("post-update hook failed: {}", diagnostic));
        } else {
            return Err(BootstrapError::IndexRefresh {
                message: diagnostic,
            });
        }
    }

    if problems.is_empty() {
        Ok(RefreshOutcome::Success)
    } else {
        Ok(RefreshOutcome::PartialFailure(problems.join("; ")))
    }
}

/// Whether a failed `apt-get update` only complained about a post-update hook.
fn hook_failure_only(stdout: &str, stderr: &str) -> bool {
    HOOK_FAILURE.is_match(stderr)
        && !FETCH_ERRORS
            .iter()
            .any(|e| stderr.contains(e) || stdout.contains(e))
}
