//! hostprep CLI - idempotent host bootstrap for container workloads

use std::io::IsTerminal;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::GlobalOpts;
use hostprep::ops::BootstrapError;
use hostprep::util::Shell;

fn main() {
    let cli = Cli::parse();
    let global = GlobalOpts::from_cli(&cli);

    if let Err(e) = run(cli, &global) {
        let shell = Shell::from_flags(global.quiet, global.verbose, global.color, global.json);
        commands::fail(&shell, BootstrapError::from(e).to_diagnostic());
    }
}

fn run(cli: Cli, global: &GlobalOpts) -> Result<()> {
    // Diagnostics only; everything user-facing goes through `Shell`.
    let filter = if cli.verbose {
        EnvFilter::new("hostprep=debug")
    } else {
        EnvFilter::new("hostprep=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .init();

    // Execute command
    match cli.command {
        Commands::Bootstrap(args) => commands::bootstrap::execute(args, global),
        Commands::Verify => commands::verify::execute(global),
        Commands::Plan(args) => commands::plan::execute(args, global),
        Commands::Up(args) => commands::up::execute(args, global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
