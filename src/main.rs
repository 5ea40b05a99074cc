mod backend;
mod cli;
mod commands;
mod config;
mod engine;
mod manifest;
mod paths;
mod progress;
mod state;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

use config::{Overrides, RunSettings, Settings};
use engine::RunOptions;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "stratum", &mut io::stdout());
        return Ok(());
    }

    let overrides = Overrides {
        jobs: cli.jobs,
        ignore_fields: cli.ignore_fields,
        state_file: cli.state,
        local_root: cli.local_root,
    };
    let settings = RunSettings::resolve(Settings::load()?, overrides, &paths::state_dir()?);
    log::debug!("Effective settings: {settings:?}");

    match cli.command {
        Command::Apply(args) => commands::apply::run(
            &ctx,
            &settings,
            &args.manifest,
            &RunOptions {
                dry_run: args.dry_run,
                yes: args.yes,
            },
        ),
        Command::Destroy(args) => commands::destroy::run(
            &ctx,
            &settings,
            &RunOptions {
                dry_run: args.dry_run,
                yes: args.yes,
            },
        ),
        Command::Refresh => commands::refresh::run(&ctx, &settings),
        Command::Graph { manifest } => commands::graph::run(&ctx, &settings, &manifest),
        Command::Completions { .. } => Ok(()),
    }
}
