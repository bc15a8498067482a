//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use hostprep::util::shell::ColorChoice;

/// hostprep - idempotent host bootstrap for container workloads
#[derive(Parser)]
#[command(name = "hostprep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: ColorChoice,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    /// Configuration file (defaults to /etc/hostprep/config.toml)
    #[arg(long, global = true, env = "HOSTPREP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host root every host path is resolved against
    #[arg(long, global = true, hide = true, default_value = "/")]
    pub root: PathBuf,

    /// Overall time budget in seconds (0 disables it)
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install missing components and reconcile group membership
    Bootstrap(BootstrapArgs),

    /// Check the host without changing anything
    Verify,

    /// Show the components that would be processed, in order
    Plan(PlanArgs),

    /// Verify the host, then start the compose stack
    Up(UpArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BootstrapArgs {
    /// Do not refresh the package index first
    #[arg(long)]
    pub skip_refresh: bool,

    /// Only process these components (and what they require)
    #[arg(long, value_name = "COMPONENT")]
    pub only: Vec<String>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Also probe the host for each component's current state
    #[arg(long)]
    pub probe: bool,
}

#[derive(Args)]
pub struct UpArgs {
    /// Start the stack without verifying the host first
    #[arg(long)]
    pub skip_verify: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
