//! Canned data shared by unit tests.

use std::path::PathBuf;

use crate::core::component::{Component, InstallAction, Probe, RepositorySpec};

/// Armored key served by the default [`super::FakeKeyFetcher`].
pub const DOCKER_KEY: &[u8] =
    b"-----BEGIN PGP PUBLIC KEY BLOCK-----\ndocker\n-----END PGP PUBLIC KEY BLOCK-----\n";

/// A config file declaring its own component list.
pub const CUSTOM_CONFIG: &str = r#"
[run]
user = "deploy"
timeout_secs = 120

[[groups]]
name = "docker"

[[groups]]
name = "kvm"
required = false

[[components]]
name = "engine"
[components.probe]
command = ["docker", "--version"]
service = "docker"
[components.install]
packages = ["docker-ce", "docker-ce-cli"]

[[components]]
name = "compose"
requires = ["engine"]
[components.probe]
command = ["docker", "compose", "version"]
[components.install]
packages = ["docker-compose-plugin"]
"#;

/// A bare component with no repository and the given dependencies.
pub fn component(name: &str, requires: &[&str]) -> Component {
    Component {
        name: name.to_string(),
        description: String::new(),
        probe: Probe {
            command: vec!["docker".to_string(), "--version".to_string()],
            service: None,
        },
        install: InstallAction {
            packages: vec!["docker-ce-cli".to_string()],
            ..InstallAction::default()
        },
        requires: requires.iter().map(|r| r.to_string()).collect(),
        repository: None,
        min_version: None,
    }
}

/// A repository with a single signing-key URL.
pub fn docker_repository() -> RepositorySpec {
    RepositorySpec {
        name: "docker".to_string(),
        source: "deb [arch={arch} signed-by={keyring}] https://download.docker.com/linux/{distro} {codename} stable".to_string(),
        list_file: PathBuf::from("etc/apt/sources.list.d/docker.list"),
        keyring: PathBuf::from("etc/apt/keyrings/docker.asc"),
        key_url: Some("https://download.docker.com/linux/{distro}/gpg".to_string()),
        keyserver: None,
    }
}
