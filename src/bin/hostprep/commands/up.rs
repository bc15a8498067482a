//! `hostprep up` command

use anyhow::Result;

use super::{fail, GlobalOpts, Session};
use crate::cli::UpArgs;
use hostprep::ops::{bring_up_stack, verify_only, BootstrapError};
use hostprep::util::fetch::HttpKeyFetcher;
use hostprep::util::process::SystemRunner;

pub fn execute(args: UpArgs, global: &GlobalOpts) -> Result<()> {
    let session = Session::load(global);
    let runner = SystemRunner;
    let fetcher = HttpKeyFetcher::default();
    let ctx = session.context(&runner, &fetcher)?;

    if !args.skip_verify {
        let summary = verify_only(&ctx, &session.config.components(), &session.config.groups);
        if !summary.is_success() {
            summary.report(&session.shell);
            session
                .shell
                .error("Host is not ready; run `hostprep bootstrap` first");
            std::process::exit(1);
        }
    }

    if let Err(e) = bring_up_stack(&ctx, &session.config.stack) {
        fail(&session.shell, BootstrapError::from(e).to_diagnostic());
    }
    Ok(())
}
