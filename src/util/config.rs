//! Configuration file support for hostprep.
//!
//! Configuration is looked up in order:
//! - `--config <path>` - must exist when given
//! - `<root>/etc/hostprep/config.toml` - host-wide settings
//! - `~/.config/hostprep/config.toml` - per-user settings (only when root is `/`)
//!
//! The first file found wins; with none, built-in defaults apply.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::catalog;
use crate::core::component::{Component, Vars};
use crate::core::version::VersionCandidate;
use crate::util::diagnostic::Diagnostic;

/// Default overall wall-clock budget for a bootstrap run.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// APT hook that is known to crash `apt-get update` on some images.
pub const COMMAND_NOT_FOUND_HOOK: &str = "etc/apt/apt.conf.d/50command-not-found";

/// hostprep configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run settings
    pub run: RunConfig,

    /// Groups the invoking user should belong to
    pub groups: Vec<GroupConfig>,

    /// Compose stack brought up by `hostprep up`
    pub stack: StackConfig,

    /// Replaces the built-in component catalog when set
    pub components: Option<Vec<Component>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            run: RunConfig::default(),
            groups: vec![GroupConfig {
                name: "docker".to_string(),
                required: true,
            }],
            stack: StackConfig::default(),
            components: None,
        }
    }
}

/// Settings that used to be global script state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// User to reconcile group membership for (defaults to SUDO_USER, then USER)
    pub user: Option<String>,

    /// Distribution codename override (defaults to /etc/os-release)
    pub codename: Option<String>,

    /// Overall time budget in seconds; 0 disables it
    pub timeout_secs: u64,

    /// Optional APT hooks moved aside while the package index refreshes,
    /// relative to the host root
    pub flaky_hooks: Vec<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            user: None,
            codename: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            flaky_hooks: vec![PathBuf::from(COMMAND_NOT_FOUND_HOOK)],
        }
    }
}

/// One group membership to reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,

    /// A failed (not absent) membership fails the run
    #[serde(default = "default_true")]
    pub required: bool,
}

/// Compose stack settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Directory holding the compose file
    pub project_dir: PathBuf,

    /// Compose file name, relative to `project_dir`
    pub compose_file: PathBuf,

    /// One-shot service run before `up` (e.g. database migrations)
    pub init_service: Option<String>,

    /// Directories created under `project_dir` before starting
    pub directories: Vec<PathBuf>,

    /// Variable written to `.env` with the invoking user's uid
    pub uid_variable: Option<String>,
}

impl Default for StackConfig {
    fn default() -> Self {
        StackConfig {
            project_dir: PathBuf::from("."),
            compose_file: PathBuf::from("docker-compose.yaml"),
            init_service: Some("airflow-init".to_string()),
            directories: ["dags", "logs", "plugins", "config"]
                .iter()
                .map(PathBuf::from)
                .collect(),
            uid_variable: Some("AIRFLOW_UID".to_string()),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Error loading or validating configuration.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {}", .path.display())]
    #[diagnostic(code(hostprep::config::read))]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}", .path.display())]
    #[diagnostic(
        code(hostprep::config::parse),
        help("check the TOML syntax and field names against `hostprep plan`")
    )]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(hostprep::config::invalid))]
    Invalid { message: String },
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }

    /// Convert to a user-friendly diagnostic, keeping the miette code and help.
    pub fn to_diagnostic(&self) -> Diagnostic {
        use miette::Diagnostic as _;

        let mut diag = Diagnostic::error(self.to_string());
        match self {
            ConfigError::Read { path, source } => {
                diag = diag.with_location(path).with_context(source.to_string());
            }
            ConfigError::Parse { path, source } => {
                diag = diag
                    .with_location(path)
                    .with_context(source.message().to_string());
            }
            ConfigError::Invalid { .. } => {}
        }
        if let Some(code) = self.code() {
            diag = diag.with_context(format!("code: {}", code));
        }
        if let Some(help) = self.help() {
            diag = diag.with_suggestion(help.to_string());
        }
        diag
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// The configured components, or the built-in catalog.
    pub fn components(&self) -> Vec<Component> {
        self.components
            .clone()
            .unwrap_or_else(catalog::default_components)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let components = self.components();
        if components.is_empty() {
            return Err(ConfigError::invalid("at least one component is required"));
        }

        let mut seen = HashSet::new();
        for c in &components {
            if c.name.trim().is_empty() {
                return Err(ConfigError::invalid("component with an empty name"));
            }
            if !seen.insert(c.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "component `{}` is declared twice",
                    c.name
                )));
            }
            if c.probe.command.is_empty() {
                return Err(ConfigError::invalid(format!(
                    "component `{}` has an empty probe command",
                    c.name
                )));
            }
            if let Some(min) = &c.min_version {
                if VersionCandidate::parse(min).is_none() {
                    return Err(ConfigError::invalid(format!(
                        "component `{}` has unparsable min_version `{}`",
                        c.name, min
                    )));
                }
            }
            if let Some(query) = &c.install.version_query {
                let re = Regex::new(&query.pattern).map_err(|e| {
                    ConfigError::invalid(format!(
                        "component `{}` has an invalid version pattern: {}",
                        c.name, e
                    ))
                })?;
                if re.captures_len() < 2 {
                    return Err(ConfigError::invalid(format!(
                        "component `{}` version pattern needs a capture group",
                        c.name
                    )));
                }
            }
        }

        for repo in components.iter().filter_map(|c| c.repository.as_ref()) {
            if let Some(template) = &repo.key_url {
                let rendered = sample_vars().render(template);
                url::Url::parse(&rendered).map_err(|e| {
                    ConfigError::invalid(format!(
                        "repository `{}` has an invalid key_url `{}`: {}",
                        repo.name, template, e
                    ))
                })?;
            }
        }

        if let Some(g) = self.groups.iter().find(|g| g.name.trim().is_empty()) {
            return Err(ConfigError::invalid(format!(
                "group entry with empty name (required = {})",
                g.required
            )));
        }

        Ok(())
    }
}

/// Representative values for checking templates before host facts are known.
fn sample_vars() -> Vars {
    Vars::new()
        .with("distro", "ubuntu")
        .with("codename", "jammy")
        .with("arch", "amd64")
        .with("keyring", "/etc/apt/keyrings/sample.asc")
        .with("user", "root")
}

/// Host-wide config path under `root`.
pub fn host_config_path(root: &Path) -> PathBuf {
    root.join("etc").join("hostprep").join("config.toml")
}

/// Per-user config path (`~/.config/hostprep/config.toml` on Linux).
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "hostprep").map(|d| d.config_dir().join("config.toml"))
}

/// Resolve and load configuration.
///
/// Returns the config together with the file it came from, if any.
pub fn load_config(
    explicit: Option<&Path>,
    root: &Path,
) -> Result<(Config, Option<PathBuf>), ConfigError> {
    if let Some(path) = explicit {
        return Ok((Config::load(path)?, Some(path.to_path_buf())));
    }

    let mut candidates = vec![host_config_path(root)];
    if root == Path::new("/") {
        candidates.extend(user_config_path());
    }

    for path in candidates {
        if path.is_file() {
            tracing::debug!("loading config from {}", path.display());
            return Ok((Config::load(&path)?, Some(path)));
        }
    }

    tracing::debug!("no config file found, using defaults");
    Ok((Config::default(), None))
}
