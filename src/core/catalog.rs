//! Built-in component catalog.
//!
//! Used when the configuration file does not declare its own `[[components]]`.

use std::path::PathBuf;

use crate::core::component::{
    Component, IndexQuery, InstallAction, KeyserverFallback, Probe, RepositorySpec,
};

pub const DOCKER_ENGINE: &str = "docker-engine";
pub const COMPOSE_PLUGIN: &str = "compose-plugin";
pub const PYTHON: &str = "python";

/// Signing key of the deadsnakes PPA.
const DEADSNAKES_KEY_ID: &str = "F23C5A6CF475977595C89F51BA6932366A755776";

fn argv(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The default components, in dependency-compatible order.
pub fn default_components() -> Vec<Component> {
    vec![docker_engine(), compose_plugin(), python()]
}

/// Docker Engine from Docker's APT repository.
pub fn docker_engine() -> Component {
    Component {
        name: DOCKER_ENGINE.to_string(),
        description: "Docker Engine container runtime".to_string(),
        probe: Probe {
            command: argv(&["docker", "--version"]),
            service: Some("docker".to_string()),
        },
        install: InstallAction {
            packages: argv(&[
                "docker-ce",
                "docker-ce-cli",
                "containerd.io",
                "docker-buildx-plugin",
            ]),
            version_query: None,
            post_install: Vec::new(),
        },
        requires: Vec::new(),
        repository: Some(RepositorySpec {
            name: "docker".to_string(),
            source: "deb [arch={arch} signed-by={keyring}] https://download.docker.com/linux/{distro} {codename} stable".to_string(),
            list_file: PathBuf::from("etc/apt/sources.list.d/docker.list"),
            keyring: PathBuf::from("etc/apt/keyrings/docker.asc"),
            key_url: Some("https://download.docker.com/linux/{distro}/gpg".to_string()),
            keyserver: None,
        }),
        min_version: None,
    }
}

/// The `docker compose` CLI plugin.
pub fn compose_plugin() -> Component {
    Component {
        name: COMPOSE_PLUGIN.to_string(),
        description: "Docker Compose v2 plugin".to_string(),
        probe: Probe {
            command: argv(&["docker", "compose", "version"]),
            service: None,
        },
        install: InstallAction {
            packages: argv(&["docker-compose-plugin"]),
            version_query: None,
            post_install: Vec::new(),
        },
        requires: vec![DOCKER_ENGINE.to_string()],
        repository: None,
        min_version: None,
    }
}

/// The newest Python 3 available from the deadsnakes PPA, linked as `python3`.
pub fn python() -> Component {
    Component {
        name: PYTHON.to_string(),
        description: "Recent CPython interpreter".to_string(),
        probe: Probe {
            command: argv(&["python3", "--version"]),
            service: None,
        },
        install: InstallAction {
            packages: argv(&["python{version}", "python{version}-venv"]),
            version_query: Some(IndexQuery {
                command: argv(&["apt-cache", "pkgnames", "python3."]),
                pattern: r"^python(3\.\d+)$".to_string(),
            }),
            post_install: vec![argv(&[
                "update-alternatives",
                "--install",
                "/usr/bin/python3",
                "python3",
                "/usr/bin/python{version}",
                "1",
            ])],
        },
        requires: Vec::new(),
        repository: Some(RepositorySpec {
            name: "deadsnakes".to_string(),
            source: "deb [signed-by={keyring}] https://ppa.launchpadcontent.net/deadsnakes/ppa/ubuntu {codename} main".to_string(),
            list_file: PathBuf::from("etc/apt/sources.list.d/deadsnakes.list"),
            keyring: PathBuf::from("etc/apt/keyrings/deadsnakes.asc"),
            key_url: Some(format!(
                "https://keyserver.ubuntu.com/pks/lookup?op=get&search=0x{}",
                DEADSNAKES_KEY_ID
            )),
            keyserver: Some(KeyserverFallback {
                server: "keyserver.ubuntu.com".to_string(),
                key_id: DEADSNAKES_KEY_ID.to_string(),
            }),
        }),
        min_version: Some("3.11".to_string()),
    }
}
