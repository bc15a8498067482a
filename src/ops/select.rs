//! Picking the newest version a package index offers.

use anyhow::{anyhow, Context};
use regex::Regex;

use crate::core::component::IndexQuery;
use crate::core::version::{select_latest, VersionCandidate};
use crate::ops::errors::BootstrapError;
use crate::util::context::HostContext;
use crate::util::process::ProcessBuilder;

/// Run `query` and return the highest version it yields.
///
/// Every output line is matched against the query pattern; capture group 1
/// (or the whole match when the pattern has no group) is a candidate.
/// Candidates are ordered numerically, so `3.10` beats `3.9`.
pub fn select_latest_version(
    ctx: &HostContext<'_>,
    query: &IndexQuery,
) -> Result<VersionCandidate, BootstrapError> {
    let argv = ctx.vars().render_all(&query.command);
    let cmd = ProcessBuilder::from_argv(&argv)
        .ok_or_else(|| anyhow!("version query has an empty command"))?;
    let pattern = Regex::new(&query.pattern)
        .with_context(|| format!("invalid version pattern `{}`", query.pattern))?;

    let output = ctx.run(&cmd)?;
    if !output.success() {
        return Err(anyhow!(
            "`{}` failed: {}",
            cmd.display_command(),
            output.diagnostic()
        )
        .into());
    }

    let candidates = extract_candidates(&pattern, &output.stdout);
    tracing::debug!("version candidates: {:?}", candidates);

    select_latest(&candidates).ok_or_else(|| BootstrapError::NoCandidates {
        query: cmd.display_command(),
        pattern: query.pattern.clone(),
    })
}

fn extract_candidates(pattern: &Regex, text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
        .map(|m| m.as_str().to_string())
        .collect()
}
