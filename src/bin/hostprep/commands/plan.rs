//! `hostprep plan` command

use anyhow::Result;

use super::{fail, GlobalOpts, Session};
use crate::cli::PlanArgs;
use hostprep::ops::{describe_plan, plan_components, PlanEntry};
use hostprep::util::fetch::HttpKeyFetcher;
use hostprep::util::process::SystemRunner;
use hostprep::util::Shell;

pub fn execute(args: PlanArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::load(global);
    let components = session.config.components();

    let ordered = match plan_components(&components, &[]) {
        Ok(ordered) => ordered,
        Err(e) => fail(&session.shell, e.to_diagnostic()),
    };

    let entries = if args.probe {
        let runner = SystemRunner;
        let fetcher = HttpKeyFetcher::default();
        let ctx = session.context(&runner, &fetcher)?;
        describe_plan(Some(&ctx), &ordered)
    } else {
        describe_plan(None, &ordered)
    };

    print_plan(&session, &entries);
    Ok(())
}

fn print_plan(session: &Session, entries: &[PlanEntry]) {
    let shell: &Shell = &session.shell;

    if shell.is_json() {
        shell.json_event(&serde_json::json!({
            "reason": "plan",
            "components": entries,
            "groups": &session.config.groups,
        }));
        return;
    }

    for (i, entry) in entries.iter().enumerate() {
        let mut line = format!("{}. {}", i + 1, entry.name);
        if !entry.description.is_empty() {
            line.push_str(&format!(" - {}", entry.description));
        }
        shell.info(line);

        if !entry.requires.is_empty() {
            shell.info(format!("     requires: {}", entry.requires.join(", ")));
        }
        if let Some(repo) = &entry.repository {
            shell.info(format!("     repository: {}", repo));
        }
        shell.info(format!("     packages: {}", entry.packages.join(" ")));
        if let Some(service) = &entry.service {
            shell.info(format!("     service: {}", service));
        }
        match (entry.satisfied, &entry.state) {
            (Some(true), Some(state)) => shell.success(format!("     {}", state)),
            (Some(false), Some(state)) => shell.warn(format!("     {}", state)),
            _ => {}
        }
    }

    for group in &session.config.groups {
        let required = if group.required { "required" } else { "optional" };
        shell.info(format!("group: {} ({})", group.name, required));
    }
}
