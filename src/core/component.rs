//! Declarative description of one installable unit of host software.
//!
//! A [`Component`] says how to tell whether it is present (its [`Probe`],
//! which also serves as the post-install verification), how to install it
//! ([`InstallAction`]), which package source it needs ([`RepositorySpec`])
//! and which other components must succeed first.
//!
//! String fields that end up on a command line or in a source list may use
//! `{placeholders}`; see [`Vars`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One installable unit (runtime, compose plugin, interpreter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    /// Unique name; identity of the component.
    pub name: String,

    /// Human-readable description for `plan` output.
    #[serde(default)]
    pub description: String,

    /// Read-only presence check, reused for verification.
    pub probe: Probe,

    /// What to run when the probe says the component is missing.
    pub install: InstallAction,

    /// Components that must be installed successfully first.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Third-party package source needed by the install action.
    #[serde(default)]
    pub repository: Option<RepositorySpec>,

    /// Lowest acceptable version (dotted numeric).
    #[serde(default)]
    pub min_version: Option<String>,
}

impl Component {
    /// Whether the component is backed by a system service.
    pub fn service(&self) -> Option<&str> {
        self.probe.service.as_deref()
    }
}

/// Presence check for a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    /// Command whose success means "binary present"; its output carries the version.
    pub command: Vec<String>,

    /// systemd unit that must be active for the component to count as satisfied.
    #[serde(default)]
    pub service: Option<String>,
}

/// How to install a missing component.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstallAction {
    /// Packages passed to `apt-get install -y`.
    pub packages: Vec<String>,

    /// Discover `{version}` from the package index before installing.
    #[serde(default)]
    pub version_query: Option<IndexQuery>,

    /// Commands run after a successful package install.
    #[serde(default)]
    pub post_install: Vec<Vec<String>>,
}

/// A read-only package-index query that yields version identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexQuery {
    /// Command listing candidate identifiers, one per line.
    pub command: Vec<String>,

    /// Regex applied to each line; capture group 1 is the version.
    pub pattern: String,
}

/// A third-party APT source plus its signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySpec {
    /// Short name used in log lines.
    pub name: String,

    /// Source-list line, e.g. `deb [signed-by={keyring}] https://... {codename} stable`.
    pub source: String,

    /// Source-list file, relative to the host root.
    pub list_file: PathBuf,

    /// Keyring file the key is stored in, relative to the host root.
    pub keyring: PathBuf,

    /// Where to download the signing key (may use placeholders).
    #[serde(default)]
    pub key_url: Option<String>,

    /// Legacy keyserver import tried when the download fails.
    #[serde(default)]
    pub keyserver: Option<KeyserverFallback>,
}

/// Legacy `apt-key` keyserver import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyserverFallback {
    pub server: String,
    pub key_id: String,
}

/// Values substituted into `{placeholders}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vars(BTreeMap<String, String>);

impl Vars {
    pub fn new() -> Self {
        Vars(BTreeMap::new())
    }

    /// Return a copy with `key` set to `value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Replace every known `{key}` in `template`; unknown placeholders stay as-is.
    pub fn render(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.0 {
            out = out.replace(&format!("{{{}}}", key), value);
        }
        out
    }

    /// Render every element of an argv list.
    pub fn render_all(&self, argv: &[String]) -> Vec<String> {
        argv.iter().map(|a| self.render(a)).collect()
    }
}
