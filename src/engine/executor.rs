//! Execution engine - confirmation, graph walk with progress, summary

use anyhow::{Context as AnyhowContext, Result, bail};
use colored::Colorize;
use converge::{
    ExecuteOptions, Graph, OperationType, ResourceNode, RunContext, RunSummary, State,
};
use std::sync::Arc;

use super::differ::display_plan;
use super::planner::{PlannedChange, has_changes};
use crate::Context;
use crate::backend;
use crate::config::RunSettings;
use crate::progress::Reporter;
use crate::state::FileStateStorage;

/// Options for one invocation
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
}

/// Build the graph for `changes`, confirm, walk it and print the summary.
///
/// `state` is the loaded state file; the run continues its serial.
pub fn execute(
    ctx: &Context,
    settings: &RunSettings,
    operation: OperationType,
    changes: Vec<PlannedChange>,
    state: State,
    opts: &RunOptions,
) -> Result<RunSummary> {
    display_plan(operation, &changes, ctx.verbose > 0);

    let needs_run = match operation {
        OperationType::Refresh => !changes.is_empty(),
        OperationType::Apply | OperationType::Destroy => has_changes(&changes),
    };
    if !needs_run {
        if operation != OperationType::Refresh && !changes.is_empty() {
            println!();
            println!("  {} No changes needed", "✓".green());
        }
        return Ok(RunSummary::default());
    }

    let total = changes.len();
    let nodes = changes
        .into_iter()
        .map(|change| ResourceNode::new(change.resource, change.action));
    let graph = Graph::build(operation, nodes).context("Invalid resource graph")?;

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(RunSummary::default());
    }

    if !opts.yes && operation != OperationType::Refresh && !confirm_proceed(operation)? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(RunSummary::default());
    }

    let storage = Arc::new(FileStateStorage::new(&settings.state_file));
    let (progress, reporter) = Reporter::spawn(total, ctx.quiet);
    let run = RunContext::builder(operation)
        .prior_state(state.to_index())
        .state(state)
        .ignore_fields(settings.ignore_fields.iter().cloned())
        .backends(backend::registry(settings))
        .storage(storage.clone())
        .progress(progress)
        .build();

    println!();
    println!(
        "  {} Running {} on {} resources...",
        "→".cyan(),
        operation,
        graph.len()
    );
    let walked = graph.walk(
        &run,
        &ExecuteOptions {
            jobs: settings.jobs,
        },
    );

    // Dropping the run context closes the progress channel.
    drop(run);
    let tally = reporter.finish();
    log::debug!("progress stream: {tally:?}");

    let summary = walked.context("Failed to walk resource graph")?;
    log::debug!("State recorded in {}", storage.path().display());
    print_summary(operation, &summary);
    Ok(summary)
}

/// Turn a failed run into an error for the exit code
pub fn ensure_success(summary: &RunSummary) -> Result<()> {
    if summary.is_success() {
        return Ok(());
    }
    bail!(
        "{} resources failed, {} skipped",
        summary.failed,
        summary.skipped
    )
}

/// Confirm with user
fn confirm_proceed(operation: OperationType) -> Result<bool> {
    use dialoguer::Confirm;

    let prompt = match operation {
        OperationType::Destroy => "Destroy all listed resources?",
        _ => "Continue?",
    };
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(operation != OperationType::Destroy)
        .interact()
        .context("Failed to read confirmation")?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(operation: OperationType, summary: &RunSummary) {
    println!();
    if summary.is_success() {
        println!("  {} {} finished successfully!", "✓".green().bold(), operation);
    } else {
        println!("  {} {} finished with errors", "⚠".yellow().bold(), operation);
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.updated > 0 {
        println!("    • {} resources updated", summary.updated);
    }
    if summary.deleted > 0 {
        println!("    • {} resources deleted", summary.deleted);
    }
    if summary.refreshed > 0 {
        println!("    • {} resources refreshed", summary.refreshed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }

    for (key, status) in &summary.failures {
        println!("    {} {}: {}", "✗".red(), key, status.to_string().dimmed());
    }
}
