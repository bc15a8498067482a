//! `hostprep bootstrap` command

use anyhow::Result;

use super::{fail, finish, GlobalOpts, Session};
use crate::cli::BootstrapArgs;
use hostprep::ops::{bootstrap, BootstrapOptions};
use hostprep::util::fetch::HttpKeyFetcher;
use hostprep::util::process::SystemRunner;

pub fn execute(args: BootstrapArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::load(global);
    let runner = SystemRunner;
    let fetcher = HttpKeyFetcher::default();
    let ctx = session.context(&runner, &fetcher)?;

    let options = BootstrapOptions {
        skip_refresh: args.skip_refresh,
        only: args.only,
    };

    let components = session.config.components();
    match bootstrap(
        &ctx,
        &session.identity,
        &components,
        &session.config.groups,
        &options,
    ) {
        Ok(summary) => finish(&session.shell, &summary),
        Err(e) => fail(&session.shell, e.to_diagnostic()),
    }
}
