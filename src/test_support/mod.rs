//! Test utilities for hostprep unit tests.
//!
//! [`FakeHost`] implements [`CommandRunner`] by interpreting the handful of
//! commands hostprep issues (`apt-get`, `systemctl`, `getent`, `usermod`, ...)
//! against an in-memory model of a Debian-family host. It records every
//! call so tests can assert which mutations happened. Files (source lists,
//! keyrings, hooks) live in a real scratch directory owned by [`TestEnv`].
//!
//! # Example
//!
//! ```rust,ignore
//! let env = TestEnv::new(FakeHost::fresh());
//! let ctx = env.context();
//! let result = install_component(&ctx, &catalog::docker_engine(), &[]);
//! assert_eq!(env.host.count_calls("apt-get install"), 1);
//! ```

pub mod fixtures;

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use url::Url;

use crate::core::facts::HostFacts;
use crate::util::context::{HostContext, HostPaths, RunSettings};
use crate::util::fetch::KeyFetcher;
use crate::util::process::{CommandRunner, ProcessBuilder, ProcessOutput};
use crate::util::shell::{Shell, Verbosity};

pub use fixtures::*;

/// Command prefixes that change host state.
const MUTATING_PREFIXES: &[&str] = &[
    "apt-get",
    "systemctl enable",
    "systemctl start",
    "usermod",
    "update-alternatives",
    "apt-key adv",
    "docker compose",
];

/// Mutable model of the simulated host.
#[derive(Debug, Clone, Default)]
struct HostState {
    packages: BTreeSet<String>,
    /// systemd units and whether they are active
    services: BTreeMap<String, bool>,
    groups: BTreeMap<String, BTreeSet<String>>,
    /// Version `python3` currently points at
    python3: String,
    legacy_keys: BTreeSet<String>,
}

/// Simulated Debian/Ubuntu host.
#[derive(Debug)]
pub struct FakeHost {
    state: RefCell<HostState>,
    calls: RefCell<Vec<String>>,
    root: Option<PathBuf>,
    flaky_hook: Option<PathBuf>,
    offline_index: bool,
    /// `apt-get update` finds every source unchanged and rewrites no lists
    current_index: bool,
    /// Registered sources whose mirror answers 404
    broken_sources: HashSet<String>,
    /// Installing docker-ce creates the `docker` group
    package_groups: bool,
    keyserver_ok: bool,
    broken_packages: HashSet<String>,
    /// Units that refuse to start
    broken_services: HashSet<String>,
    /// Python minor versions published by the deadsnakes source
    deadsnakes_versions: Vec<String>,
}

impl FakeHost {
    /// A freshly installed Ubuntu host: system Python 3.10, no Docker.
    pub fn fresh() -> Self {
        let mut state = HostState {
            python3: "3.10".to_string(),
            ..HostState::default()
        };
        state.packages.insert("python3.10".to_string());
        state
            .groups
            .insert("sudo".to_string(), BTreeSet::from(["alice".to_string()]));

        FakeHost {
            state: RefCell::new(state),
            calls: RefCell::new(Vec::new()),
            root: None,
            flaky_hook: None,
            offline_index: false,
            current_index: false,
            broken_sources: HashSet::new(),
            package_groups: true,
            keyserver_ok: true,
            broken_packages: HashSet::new(),
            broken_services: HashSet::new(),
            deadsnakes_versions: vec!["3.9".into(), "3.10".into(), "3.11".into(), "3.12".into()],
        }
    }

    /// Docker packages present but the daemon stopped.
    pub fn with_docker_stopped(self) -> Self {
        {
            let mut state = self.state.borrow_mut();
            for pkg in ["docker-ce", "docker-ce-cli", "containerd.io", "docker-compose-plugin"] {
                state.packages.insert(pkg.to_string());
            }
            state.services.insert("docker".to_string(), false);
            state.groups.entry("docker".to_string()).or_default();
        }
        self
    }

    /// A Python at least as new as the default minimum is already `python3`.
    pub fn with_recent_python(self) -> Self {
        {
            let mut state = self.state.borrow_mut();
            state.packages.insert("python3.12".to_string());
            state.python3 = "3.12".to_string();
        }
        self
    }

    /// `apt-get update` fails while this hook file exists.
    pub fn with_flaky_hook(mut self, relative: impl Into<PathBuf>) -> Self {
        self.flaky_hook = Some(relative.into());
        self
    }

    /// `apt-get update` cannot reach any mirror.
    pub fn with_offline_index(mut self) -> Self {
        self.offline_index = true;
        self
    }

    /// Every source answers `Hit:`; the lists on disk are left untouched.
    pub fn with_current_index(mut self) -> Self {
        self.current_index = true;
        self
    }

    /// `apt-get update` fails with a 404 while this source is registered.
    pub fn with_broken_source(mut self, name: &str) -> Self {
        self.broken_sources.insert(name.to_string());
        self
    }

    /// Packages do not create their system groups.
    pub fn without_package_groups(mut self) -> Self {
        self.package_groups = false;
        self
    }

    /// The legacy keyserver is unreachable too.
    pub fn with_keyserver_down(mut self) -> Self {
        self.keyserver_ok = false;
        self
    }

    /// `apt-get install` of this package fails.
    pub fn with_broken_package(mut self, pkg: &str) -> Self {
        self.broken_packages.insert(pkg.to_string());
        self
    }

    /// `systemctl enable --now` of this unit fails.
    pub fn with_broken_service(mut self, unit: &str) -> Self {
        self.broken_services.insert(unit.to_string());
        self
    }

    /// Python versions offered once the deadsnakes source is registered.
    pub fn with_deadsnakes_versions(mut self, versions: &[&str]) -> Self {
        self.deadsnakes_versions = versions.iter().map(|v| v.to_string()).collect();
        self
    }

    /// Add a group with the given members.
    pub fn with_group(self, group: &str, members: &[&str]) -> Self {
        self.state.borrow_mut().groups.insert(
            group.to_string(),
            members.iter().map(|m| m.to_string()).collect(),
        );
        self
    }

    fn attach_root(&mut self, root: &Path) {
        self.root = Some(root.to_path_buf());
    }

    /// All commands run so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Commands that changed host state.
    pub fn mutations(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| MUTATING_PREFIXES.iter().any(|p| c.starts_with(p)))
            .filter(|c| !c.ends_with("compose version"))
            .cloned()
            .collect()
    }

    /// Number of calls starting with `prefix`.
    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    /// Forget recorded calls (state is kept).
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn has_package(&self, pkg: &str) -> bool {
        self.state.borrow().packages.contains(pkg)
    }

    pub fn is_member(&self, user: &str, group: &str) -> bool {
        self.state
            .borrow()
            .groups
            .get(group)
            .is_some_and(|m| m.contains(user))
    }

    pub fn service_active(&self, unit: &str) -> bool {
        self.state.borrow().services.get(unit).copied().unwrap_or(false)
    }

    /// Stop a unit behind hostprep's back.
    pub fn stop_service(&self, unit: &str) {
        if let Some(active) = self.state.borrow_mut().services.get_mut(unit) {
            *active = false;
        }
    }

    pub fn python3_version(&self) -> String {
        self.state.borrow().python3.clone()
    }

    fn file_exists(&self, relative: &str) -> bool {
        self.root
            .as_ref()
            .is_some_and(|root| root.join(relative).exists())
    }

    fn source_registered(&self, name: &str) -> bool {
        self.root.as_ref().is_some_and(|root| {
            std::fs::read_to_string(root.join(format!("etc/apt/sources.list.d/{}.list", name)))
                .is_ok_and(|list| list.lines().any(|l| l.trim_start().starts_with("deb")))
        })
    }

    /// Which source a package comes from, if it is not in the base archive.
    fn package_source(pkg: &str) -> Option<&'static str> {
        if pkg.starts_with("docker-") || pkg == "containerd.io" {
            Some("docker")
        } else if pkg.starts_with("python3.") && !pkg.starts_with("python3.10") {
            Some("deadsnakes")
        } else {
            None
        }
    }

    fn apt_update(&self) -> ProcessOutput {
        if self.offline_index {
            return ProcessOutput::failed(
                100,
                "E: Failed to fetch http://archive.ubuntu.com/ubuntu/dists/jammy/InRelease  Temporary failure resolving 'archive.ubuntu.com'\nE: Some index files failed to download.",
            );
        }

        if let Some(source) = self.broken_sources.iter().find(|s| self.source_registered(s)) {
            return ProcessOutput::failed(
                100,
                format!(
                    "E: Failed to fetch https://{}.example/dists/jammy/InRelease  404  Not Found\nE: Some index files failed to download. They have been ignored, or old ones used instead.",
                    source
                ),
            );
        }

        let stdout = if self.current_index {
            "Hit:1 http://archive.ubuntu.com/ubuntu jammy InRelease\nReading package lists..."
        } else {
            if let Some(root) = &self.root {
                let lists = root.join("var/lib/apt/lists");
                let _ = std::fs::create_dir_all(&lists);
                let _ = std::fs::write(lists.join("archive.ubuntu.com_ubuntu_dists_jammy_InRelease"), "fresh");
            }
            "Get:1 http://archive.ubuntu.com/ubuntu jammy InRelease [270 kB]\nReading package lists..."
        };

        if let Some(hook) = &self.flaky_hook {
            if self.file_exists(&hook.to_string_lossy()) {
                return ProcessOutput {
                    code: Some(100),
                    stdout: stdout.to_string(),
                    stderr: "E: Problem executing scripts APT::Update::Post-Invoke-Success 'if /usr/bin/test -w /var/lib/command-not-found/ -a -e /usr/lib/cnf-update-db; then /usr/lib/cnf-update-db > /dev/null; fi'\nE: Sub-process returned an error code".to_string(),
                };
            }
        }

        ProcessOutput::ok(format!("{} Done", stdout))
    }

    fn apt_install(&self, pkgs: &[&str]) -> ProcessOutput {
        for pkg in pkgs {
            if let Some(source) = Self::package_source(pkg) {
                if !self.source_registered(source) {
                    return ProcessOutput::failed(
                        100,
                        format!("E: Unable to locate package {}", pkg),
                    );
                }
            }
            if pkg.starts_with("python3.") {
                let version = pkg.trim_start_matches("python").trim_end_matches("-venv");
                if version != "3.10" && !self.deadsnakes_versions.iter().any(|v| v == version) {
                    return ProcessOutput::failed(100, format!("E: Unable to locate package {}", pkg));
                }
            }
            if self.broken_packages.contains(*pkg) {
                return ProcessOutput::failed(
                    100,
                    format!("E: Sub-process /usr/bin/dpkg returned an error code (1) while installing {}", pkg),
                );
            }
        }

        let mut state = self.state.borrow_mut();
        for pkg in pkgs {
            state.packages.insert(pkg.to_string());
            if *pkg == "docker-ce" {
                let start = !self.broken_services.contains("docker");
                state.services.insert("docker".to_string(), start);
                if self.package_groups {
                    state.groups.entry("docker".to_string()).or_default();
                }
            }
        }
        ProcessOutput::ok("Setting up packages ... done")
    }

    fn systemctl(&self, args: &[&str]) -> ProcessOutput {
        match args {
            ["is-active", unit] => match self.state.borrow().services.get(*unit) {
                Some(true) => ProcessOutput::ok("active\n"),
                Some(false) => ProcessOutput {
                    code: Some(3),
                    stdout: "inactive\n".to_string(),
                    stderr: String::new(),
                },
                None => ProcessOutput {
                    code: Some(4),
                    stdout: "inactive\n".to_string(),
                    stderr: String::new(),
                },
            },
            ["enable", "--now", unit] => {
                let mut state = self.state.borrow_mut();
                match state.services.get_mut(*unit) {
                    Some(_) if self.broken_services.contains(*unit) => ProcessOutput::failed(
                        1,
                        format!("Job for {}.service failed because the control process exited with error code.", unit),
                    ),
                    Some(active) => {
                        *active = true;
                        ProcessOutput::ok("")
                    }
                    None => ProcessOutput::failed(
                        1,
                        format!("Failed to enable unit: Unit file {}.service does not exist.", unit),
                    ),
                }
            }
            _ => ProcessOutput::failed(1, "unsupported systemctl invocation"),
        }
    }

    fn docker(&self, args: &[&str]) -> ProcessOutput {
        let state = self.state.borrow();
        if !state.packages.contains("docker-ce-cli") {
            return ProcessOutput::not_found(Path::new("docker"));
        }
        match args {
            ["--version"] => ProcessOutput::ok("Docker version 24.0.7, build afdd53b\n"),
            ["compose", "version"] if state.packages.contains("docker-compose-plugin") => {
                ProcessOutput::ok("Docker Compose version v2.21.0\n")
            }
            ["compose", "version"] => {
                ProcessOutput::failed(1, "docker: 'compose' is not a docker command.")
            }
            ["compose", ..] if state.packages.contains("docker-compose-plugin") => {
                ProcessOutput::ok("")
            }
            _ => ProcessOutput::failed(1, "unsupported docker invocation"),
        }
    }

    fn python3(&self, args: &[&str]) -> ProcessOutput {
        match args {
            ["--version"] => {
                ProcessOutput::ok(format!("Python {}.4\n", self.state.borrow().python3))
            }
            _ => ProcessOutput::failed(2, "unsupported python3 invocation"),
        }
    }

    fn apt_cache_pkgnames(&self, prefix: &str) -> ProcessOutput {
        let mut names: Vec<String> = vec!["python3.10".into(), "python3.10-venv".into()];
        if self.source_registered("deadsnakes") {
            for v in &self.deadsnakes_versions {
                names.push(format!("python{}", v));
                names.push(format!("python{}-venv", v));
                names.push(format!("python{}-dev", v));
            }
        }
        names.retain(|n| n.starts_with(prefix));
        names.sort();
        names.dedup();
        ProcessOutput::ok(names.join("\n") + "\n")
    }

    fn update_alternatives(&self, args: &[&str]) -> ProcessOutput {
        match args {
            ["--install", "/usr/bin/python3", "python3", target, _priority] => {
                let version = target.trim_start_matches("/usr/bin/python");
                let mut state = self.state.borrow_mut();
                if !state.packages.contains(&format!("python{}", version)) {
                    return ProcessOutput::failed(
                        2,
                        format!("update-alternatives: error: alternative path {} doesn't exist", target),
                    );
                }
                state.python3 = version.to_string();
                ProcessOutput::ok("")
            }
            _ => ProcessOutput::failed(2, "unsupported update-alternatives invocation"),
        }
    }

    fn getent_group(&self, group: &str) -> ProcessOutput {
        match self.state.borrow().groups.get(group) {
            Some(members) => ProcessOutput::ok(format!(
                "{}:x:999:{}\n",
                group,
                members.iter().cloned().collect::<Vec<_>>().join(",")
            )),
            None => ProcessOutput::failed(2, ""),
        }
    }

    fn id_groups(&self, user: &str) -> ProcessOutput {
        let state = self.state.borrow();
        let mut groups = vec![user.to_string()];
        groups.extend(
            state
                .groups
                .iter()
                .filter(|(_, members)| members.contains(user))
                .map(|(g, _)| g.clone()),
        );
        ProcessOutput::ok(groups.join(" ") + "\n")
    }

    fn usermod(&self, group: &str, user: &str) -> ProcessOutput {
        let mut state = self.state.borrow_mut();
        match state.groups.get_mut(group) {
            Some(members) => {
                members.insert(user.to_string());
                ProcessOutput::ok("")
            }
            None => ProcessOutput::failed(6, format!("usermod: group '{}' does not exist", group)),
        }
    }

    fn apt_key(&self, args: &[&str]) -> ProcessOutput {
        match args {
            ["adv", "--keyserver", _, "--recv-keys", id] if self.keyserver_ok => {
                self.state.borrow_mut().legacy_keys.insert(id.to_string());
                ProcessOutput::ok(format!("gpg: key {}: public key imported", id))
            }
            ["adv", ..] => ProcessOutput::failed(
                2,
                "gpg: keyserver receive failed: Server indicated a failure",
            ),
            ["export", id] if self.state.borrow().legacy_keys.contains(*id) => ProcessOutput::ok(
                "-----BEGIN PGP PUBLIC KEY BLOCK-----\nlegacy\n-----END PGP PUBLIC KEY BLOCK-----\n",
            ),
            ["export", _] => ProcessOutput::ok(""),
            _ => ProcessOutput::failed(1, "unsupported apt-key invocation"),
        }
    }
}

impl CommandRunner for FakeHost {
    fn run(&self, cmd: &ProcessBuilder) -> Result<ProcessOutput> {
        let line = cmd.display_command();
        self.calls.borrow_mut().push(line.clone());

        let program = cmd.get_program().to_string_lossy().into_owned();
        let args: Vec<&str> = cmd.get_args().iter().map(String::as_str).collect();

        let output = match (program.as_str(), args.as_slice()) {
            ("dpkg", ["--print-architecture"]) => ProcessOutput::ok("amd64\n"),
            ("apt-get", ["update"]) => self.apt_update(),
            ("apt-get", ["install", "-y", pkgs @ ..]) => self.apt_install(pkgs),
            ("apt-cache", ["pkgnames", prefix]) => self.apt_cache_pkgnames(prefix),
            ("apt-key", rest) => self.apt_key(rest),
            ("systemctl", rest) => self.systemctl(rest),
            ("docker", rest) => self.docker(rest),
            ("python3", rest) => self.python3(rest),
            ("update-alternatives", rest) => self.update_alternatives(rest),
            ("getent", ["group", group]) => self.getent_group(group),
            ("id", ["-nG", user]) => self.id_groups(user),
            ("id", ["-u", _]) => ProcessOutput::ok("1000\n"),
            ("usermod", ["-aG", group, user]) => self.usermod(group, user),
            _ => bail!("unexpected command: {}", line),
        };
        Ok(output)
    }
}

/// Key fetcher that serves fixed bytes or always fails.
#[derive(Debug)]
pub struct FakeKeyFetcher {
    key: Option<Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl FakeKeyFetcher {
    pub fn serving(key: &[u8]) -> Self {
        FakeKeyFetcher {
            key: Some(key.to_vec()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        FakeKeyFetcher {
            key: None,
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl KeyFetcher for FakeKeyFetcher {
    fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        self.requests.borrow_mut().push(url.to_string());
        match &self.key {
            Some(key) => Ok(key.clone()),
            None => bail!("failed to download key from {}: connection refused", url),
        }
    }
}

/// A scratch host root plus fakes, ready to build a [`HostContext`].
pub struct TestEnv {
    pub tmp: tempfile::TempDir,
    pub host: FakeHost,
    pub fetcher: FakeKeyFetcher,
    pub shell: Arc<Shell>,
}

impl TestEnv {
    pub fn new(host: FakeHost) -> Self {
        Self::with_fetcher(host, FakeKeyFetcher::serving(DOCKER_KEY))
    }

    pub fn with_fetcher(mut host: FakeHost, fetcher: FakeKeyFetcher) -> Self {
        let tmp = tempfile::TempDir::new().expect("create scratch root");
        host.attach_root(tmp.path());
        TestEnv {
            tmp,
            host,
            fetcher,
            shell: Arc::new(Shell::capturing(Verbosity::Verbose)),
        }
    }

    /// Absolute path of a host-relative path inside the scratch root.
    pub fn path(&self, relative: &str) -> PathBuf {
        self.tmp.path().join(relative)
    }

    /// Write a file inside the scratch root, creating parents.
    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.path(relative);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        std::fs::write(path, contents).expect("write file");
    }

    /// Read a file inside the scratch root.
    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative)).unwrap_or_default()
    }

    pub fn settings(&self) -> RunSettings {
        RunSettings {
            user: "alice".to_string(),
            facts: HostFacts {
                distro: "ubuntu".to_string(),
                codename: "jammy".to_string(),
                arch: "amd64".to_string(),
                codename_assumed: false,
            },
            flaky_hooks: vec![PathBuf::from(crate::util::config::COMMAND_NOT_FOUND_HOOK)],
            timeout: Some(Duration::from_secs(600)),
        }
    }

    pub fn context(&self) -> HostContext<'_> {
        HostContext::new(
            &self.host,
            &self.fetcher,
            Arc::clone(&self.shell),
            HostPaths::new(self.tmp.path()),
            self.settings(),
        )
    }

    /// Lines printed so far.
    pub fn output(&self) -> Vec<String> {
        self.shell.captured().into_iter().map(|(_, l)| l).collect()
    }
}
