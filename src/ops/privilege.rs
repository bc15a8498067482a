//! Pre-flight privilege check and invoking-user resolution.

use crate::ops::errors::BootstrapError;

/// Who is running hostprep, and on whose behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Effective uid of this process.
    pub euid: u32,
    /// The human user to reconcile group membership for.
    pub user: String,
}

impl Identity {
    /// Identity of the current process.
    ///
    /// The user is taken from `configured`, then `SUDO_USER` (the account
    /// that invoked sudo), then `USER`, then `root`.
    pub fn current(configured: Option<&str>) -> Self {
        let euid = rustix::process::geteuid().as_raw();
        let user = configured
            .map(str::to_string)
            .or_else(|| non_empty_env("SUDO_USER"))
            .or_else(|| non_empty_env("USER"))
            .unwrap_or_else(|| "root".to_string());
        Identity { euid, user }
    }

    pub fn is_privileged(&self) -> bool {
        self.euid == 0
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Fail unless the process runs with elevated privileges.
pub fn require_elevated_privileges(identity: &Identity) -> Result<(), BootstrapError> {
    if identity.is_privileged() {
        Ok(())
    } else {
        Err(BootstrapError::Permission {
            euid: identity.euid,
        })
    }
}
