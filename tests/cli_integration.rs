//! CLI integration tests for hostprep.
//!
//! These tests exercise the read-only surface of the binary against a
//! scratch host root; nothing here installs packages.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get the hostprep binary command, isolated from any real configuration.
fn hostprep(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("hostprep").unwrap();
    cmd.env_remove("HOSTPREP_CONFIG")
        .env("HOME", root)
        .env("XDG_CONFIG_HOME", root.join(".config"))
        .arg("--root")
        .arg(root);
    cmd
}

/// Create a temporary host root.
fn temp_root() -> TempDir {
    TempDir::new().unwrap()
}

fn write_config(root: &Path, contents: &str) -> std::path::PathBuf {
    let path = root.join("hostprep.toml");
    fs::write(&path, contents).unwrap();
    path
}

const TWO_COMPONENTS: &str = r#"
[[groups]]
name = "docker"

[[groups]]
name = "kvm"
required = false

[[components]]
name = "compose"
requires = ["engine"]
[components.probe]
command = ["docker", "compose", "version"]
[components.install]
packages = ["docker-compose-plugin"]

[[components]]
name = "engine"
[components.probe]
command = ["docker", "--version"]
service = "docker"
[components.install]
packages = ["docker-ce"]
"#;

// ============================================================================
// hostprep --help / --version
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let tmp = temp_root();

    hostprep(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bootstrap"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("up"));
}

#[test]
fn test_version() {
    let tmp = temp_root();

    hostprep(tmp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("hostprep "));
}

// ============================================================================
// hostprep plan
// ============================================================================

#[test]
fn test_plan_default_catalog() {
    let tmp = temp_root();

    hostprep(tmp.path())
        .args(["plan", "--color", "never"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. docker-engine"))
        .stdout(predicate::str::contains("2. compose-plugin"))
        .stdout(predicate::str::contains("3. python"))
        .stdout(predicate::str::contains("repository: docker"))
        .stdout(predicate::str::contains("group: docker (required)"));
}

#[test]
fn test_plan_orders_custom_components() {
    let tmp = temp_root();
    let config = write_config(tmp.path(), TWO_COMPONENTS);

    hostprep(tmp.path())
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. engine"))
        .stdout(predicate::str::contains("2. compose"))
        .stdout(predicate::str::contains("requires: engine"))
        .stdout(predicate::str::contains("group: kvm (optional)"));
}

#[test]
fn test_plan_reads_host_config() {
    let tmp = temp_root();
    let dir = tmp.path().join("etc/hostprep");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.toml"), TWO_COMPONENTS).unwrap();

    hostprep(tmp.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("1. engine"));
}

#[test]
fn test_plan_json() {
    let tmp = temp_root();

    let output = hostprep(tmp.path())
        .args(["--message-format", "json", "plan"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let event: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(event["reason"], "plan");
    assert_eq!(event["components"][0]["name"], "docker-engine");
    assert_eq!(event["components"][1]["requires"][0], "docker-engine");
    assert_eq!(event["groups"][0]["name"], "docker");
}

#[test]
fn test_plan_quiet_prints_nothing() {
    let tmp = temp_root();

    hostprep(tmp.path())
        .args(["-q", "plan"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// ============================================================================
// configuration errors
// ============================================================================

#[test]
fn test_invalid_toml_fails() {
    let tmp = temp_root();
    let config = write_config(tmp.path(), "[run\n");

    hostprep(tmp.path())
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("failed to parse config file"))
        .stderr(predicate::str::contains("ERROR"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let tmp = temp_root();

    hostprep(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("nope.toml"))
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read config file"));
}

#[test]
fn test_dependency_cycle_fails() {
    let tmp = temp_root();
    let config = write_config(
        tmp.path(),
        r#"
[[components]]
name = "a"
requires = ["b"]
[components.probe]
command = ["true"]
[components.install]
packages = []

[[components]]
name = "b"
requires = ["a"]
[components.probe]
command = ["true"]
[components.install]
packages = []
"#,
    );

    hostprep(tmp.path())
        .arg("--config")
        .arg(&config)
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle"))
        .stderr(predicate::str::contains("hostprep plan"));
}

// ============================================================================
// hostprep verify (read-only)
// ============================================================================

#[test]
fn test_json_verify_keeps_stderr_clean() {
    let tmp = temp_root();

    // No os-release under the root, so the codename fallback is reported.
    let output = hostprep(tmp.path())
        .args(["--message-format", "json", "verify"])
        .output()
        .unwrap();

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(!stderr.contains("WARN"), "{}", stderr);
    assert!(!stderr.contains('\u{1b}'), "{}", stderr);

    let stdout = String::from_utf8(output.stdout).unwrap();
    let events: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events.last().unwrap()["reason"], "summary");
}

#[test]
fn test_verify_warnings_go_to_stdout() {
    let tmp = temp_root();

    hostprep(tmp.path())
        .args(["--color", "never", "verify"])
        .assert()
        .stdout(predicate::str::contains("WARNING No release codename found"))
        .stderr(predicate::str::contains("WARN ").not())
        .stderr(predicate::str::contains("no release codename").not());
}

// ============================================================================
// hostprep bootstrap
// ============================================================================

#[test]
fn test_bootstrap_unknown_component_fails() {
    let tmp = temp_root();

    // Fails on the privilege check or on the unknown name, before any change.
    hostprep(tmp.path())
        .args(["bootstrap", "--only", "ruby"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("ERROR"));
}

// ============================================================================
// hostprep completions
// ============================================================================

#[test]
fn test_completions_bash() {
    let tmp = temp_root();

    hostprep(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hostprep"));
}
