//! Registration of third-party package repositories.
//!
//! A repository is registered when its source line is present in its list
//! file and its signing key is on disk. Both writes are skipped when the
//! existing content already matches, so re-registration never changes the
//! host.

use std::path::Path;

use url::Url;

use crate::core::component::{KeyserverFallback, RepositorySpec, Vars};
use crate::core::outcome::RegisterOutcome;
use crate::util::context::HostContext;
use crate::util::process::ProcessBuilder;
use crate::util::{fs, hash};

/// Make sure `repo` is configured on the host.
///
/// Never returns an error: any failure is reported as
/// [`RegisterOutcome::Failed`] so the caller can skip just the component
/// that needs this repository.
pub fn register_repository(ctx: &HostContext<'_>, repo: &RepositorySpec) -> RegisterOutcome {
    let vars = repository_vars(ctx, repo);
    let line = vars.render(&repo.source);
    let list = ctx.paths.host(&repo.list_file);
    let keyring = ctx.paths.host(&repo.keyring);
    let needs_key = repo.key_url.is_some() || repo.keyserver.is_some();

    let listed = match fs::contains_line(&list, &line) {
        Ok(listed) => listed,
        Err(e) => return RegisterOutcome::Failed(format!("{:#}", e)),
    };

    if listed && (!needs_key || keyring.exists()) {
        tracing::debug!("repository {} already registered", repo.name);
        return RegisterOutcome::AlreadyRegistered;
    }

    if needs_key {
        if let Err(reason) = install_key(ctx, repo, &vars, &keyring) {
            return RegisterOutcome::Failed(reason);
        }
    }

    if !listed {
        if let Err(e) = fs::append_line(&list, &line) {
            return RegisterOutcome::Failed(format!("{:#}", e));
        }
        tracing::debug!("added `{}` to {}", line, list.display());
    }

    RegisterOutcome::Registered {
        source_added: !listed,
    }
}

/// Take `repo`'s source line back out of its list file.
///
/// Used when a freshly added source breaks `apt-get update`, so the next
/// run does not abort on the same broken source. The signing key is left
/// in place; apt ignores a keyring no source refers to.
pub fn remove_source_line(ctx: &HostContext<'_>, repo: &RepositorySpec) -> anyhow::Result<bool> {
    let line = repository_vars(ctx, repo).render(&repo.source);
    let removed = fs::remove_line(&ctx.paths.host(&repo.list_file), &line)?;
    if removed {
        tracing::debug!("removed `{}` from {}", line, repo.list_file.display());
    }
    Ok(removed)
}

/// Host facts plus `{keyring}` as seen from inside the host.
fn repository_vars(ctx: &HostContext<'_>, repo: &RepositorySpec) -> Vars {
    let keyring_on_host = Path::new("/").join(&repo.keyring);
    ctx.vars()
        .with("keyring", keyring_on_host.display().to_string())
}

/// Download (or import) the signing key and store it at `keyring`.
fn install_key(
    ctx: &HostContext<'_>,
    repo: &RepositorySpec,
    vars: &Vars,
    keyring: &Path,
) -> Result<(), String> {
    let downloaded = match &repo.key_url {
        Some(template) => download_key(ctx, &vars.render(template)),
        None => Err("no key URL configured".to_string()),
    };

    let key = match (downloaded, &repo.keyserver) {
        (Ok(key), _) => key,
        (Err(reason), Some(fallback)) => {
            ctx.shell.warn(format!(
                "{}: signing key download failed ({}); trying keyserver {}",
                repo.name, reason, fallback.server
            ));
            import_from_keyserver(ctx, fallback).map_err(|fallback_reason| {
                format!(
                    "signing key download failed: {}; keyserver import failed: {}",
                    reason, fallback_reason
                )
            })?
        }
        (Err(reason), None) => return Err(format!("signing key download failed: {}", reason)),
    };

    store_key(keyring, &key)
}

fn download_key(ctx: &HostContext<'_>, rendered: &str) -> Result<Vec<u8>, String> {
    let url = Url::parse(rendered).map_err(|e| format!("invalid key URL `{}`: {}", rendered, e))?;
    ctx.fetcher.fetch(&url).map_err(|e| format!("{:#}", e))
}

/// Legacy path: receive the key into apt-key's store, then export it armored.
fn import_from_keyserver(
    ctx: &HostContext<'_>,
    fallback: &KeyserverFallback,
) -> Result<Vec<u8>, String> {
    let server = if fallback.server.contains("://") {
        fallback.server.clone()
    } else {
        format!("hkp://{}:80", fallback.server)
    };

    let recv = ProcessBuilder::new("apt-key")
        .args(["adv", "--keyserver", &server, "--recv-keys", &fallback.key_id]);
    let output = ctx.run(&recv).map_err(|e| format!("{:#}", e))?;
    if !output.success() {
        return Err(output.diagnostic());
    }

    let export = ProcessBuilder::new("apt-key").args(["export", &fallback.key_id]);
    let output = ctx.run(&export).map_err(|e| format!("{:#}", e))?;
    if !output.success() || output.stdout_trimmed().is_empty() {
        return Err(format!("key {} could not be exported", fallback.key_id));
    }

    Ok(output.stdout.into_bytes())
}

/// Write `key` unless the keyring already holds exactly these bytes.
fn store_key(keyring: &Path, key: &[u8]) -> Result<(), String> {
    let existing = hash::sha256_file_opt(keyring).map_err(|e| format!("{:#}", e))?;
    if existing.as_deref() == Some(hash::sha256_bytes(key).as_str()) {
        tracing::debug!("keyring {} unchanged", keyring.display());
        return Ok(());
    }

    fs::write_atomic(keyring, key).map_err(|e| format!("{:#}", e))?;
    tracing::debug!("wrote signing key to {}", keyring.display());
    Ok(())
}
