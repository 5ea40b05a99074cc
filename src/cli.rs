use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stratum")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge declared resources in dependency order", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Number of parallel workers
    #[arg(short, long, global = true, env = "STRATUM_JOBS")]
    pub jobs: Option<usize>,

    /// State file location
    #[arg(long, global = true, env = "STRATUM_STATE_FILE")]
    pub state: Option<String>,

    /// Attribute path to strip before a backend sees it (repeatable)
    #[arg(long = "ignore-field", value_name = "DOT.PATH", global = true)]
    pub ignore_fields: Vec<String>,

    /// Directory used by the Local backend
    #[arg(long, global = true)]
    pub local_root: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Converge resources to match a manifest
    Apply(ApplyArgs),

    /// Delete every resource recorded in the state file
    Destroy(DestroyArgs),

    /// Re-read every recorded resource and update the state file
    Refresh,

    /// Print the execution order of a manifest
    Graph {
        /// Manifest file (.json or .toml)
        manifest: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Manifest file (.json or .toml)
    pub manifest: PathBuf,

    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show the plan without applying it
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show the plan without destroying anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}
