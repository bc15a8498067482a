//! Facts about the host discovered once per run.

use std::path::Path;

use anyhow::Result;

use crate::core::component::Vars;
use crate::util::fs::read_to_string_opt;
use crate::util::process::{CommandRunner, ProcessBuilder};

/// Distribution identity used to render repository templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFacts {
    /// `ID` from os-release (`ubuntu`, `debian`)
    pub distro: String,
    /// Release codename (`jammy`, `bookworm`)
    pub codename: String,
    /// Debian architecture name (`amd64`, `arm64`)
    pub arch: String,
    /// No codename was configured or found, so [`FALLBACK_CODENAME`] is used
    pub codename_assumed: bool,
}

/// Codename used when neither the config nor os-release names one.
pub const FALLBACK_CODENAME: &str = "jammy";

impl HostFacts {
    /// Discover facts from `<root>/etc/os-release` and `dpkg`.
    ///
    /// `codename` overrides whatever os-release says.
    pub fn detect(
        runner: &dyn CommandRunner,
        root: &Path,
        codename: Option<&str>,
    ) -> Result<HostFacts> {
        let os_release = read_to_string_opt(&root.join("etc/os-release"))?.unwrap_or_default();
        let parsed = parse_os_release(&os_release);

        let distro = parsed.id.unwrap_or_else(|| "ubuntu".to_string());
        let found = codename.map(str::to_string).or(parsed.codename);
        let codename_assumed = found.is_none();
        let codename = found.unwrap_or_else(|| FALLBACK_CODENAME.to_string());

        let dpkg = runner.run(&ProcessBuilder::new("dpkg").arg("--print-architecture"))?;
        let arch = if dpkg.success() && !dpkg.stdout_trimmed().is_empty() {
            dpkg.stdout_trimmed().to_string()
        } else {
            debian_arch(std::env::consts::ARCH).to_string()
        };

        Ok(HostFacts {
            distro,
            codename,
            arch,
            codename_assumed,
        })
    }

    /// Template variables for these facts.
    pub fn vars(&self) -> Vars {
        Vars::new()
            .with("distro", self.distro.as_str())
            .with("codename", self.codename.as_str())
            .with("arch", self.arch.as_str())
    }
}

/// Fields of interest from os-release.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: Option<String>,
    pub codename: Option<String>,
}

/// Parse os-release text; `VERSION_CODENAME` wins over `UBUNTU_CODENAME`.
pub fn parse_os_release(text: &str) -> OsRelease {
    let mut release = OsRelease::default();
    let mut ubuntu_codename = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
        if value.is_empty() {
            continue;
        }
        match key {
            "ID" => release.id = Some(value),
            "VERSION_CODENAME" => release.codename = Some(value),
            "UBUNTU_CODENAME" => ubuntu_codename = Some(value),
            _ => {}
        }
    }

    if release.codename.is_none() {
        release.codename = ubuntu_codename;
    }
    release
}

/// Map a Rust target arch to the Debian architecture name.
fn debian_arch(rust_arch: &str) -> &str {
    match rust_arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "arm" => "armhf",
        "x86" => "i386",
        other => other,
    }
}
