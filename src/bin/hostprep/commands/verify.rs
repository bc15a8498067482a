//! `hostprep verify` command
//!
//! Read-only: probes every component and checks group membership.

use anyhow::Result;

use super::{finish, GlobalOpts, Session};
use hostprep::ops::verify_only;
use hostprep::util::fetch::HttpKeyFetcher;
use hostprep::util::process::SystemRunner;

pub fn execute(global: &GlobalOpts) -> Result<()> {
    let session = Session::load(global);
    let runner = SystemRunner;
    let fetcher = HttpKeyFetcher::default();
    let ctx = session.context(&runner, &fetcher)?;

    let summary = verify_only(&ctx, &session.config.components(), &session.config.groups);
    finish(&session.shell, &summary)
}
