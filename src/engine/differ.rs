//! Plan display - what a run is about to change

use colored::Colorize;
use converge::{Action, OperationType};

use super::planner::PlannedChange;

/// Counts of planned actions
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlanCounts {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
    pub unchanged: usize,
}

impl PlanCounts {
    pub fn of(changes: &[PlannedChange]) -> Self {
        let mut counts = Self::default();
        for change in changes {
            match change.action {
                Action::Create => counts.create += 1,
                Action::Update => counts.update += 1,
                Action::Delete => counts.delete += 1,
                Action::Unchanged => counts.unchanged += 1,
            }
        }
        counts
    }
}

/// Display the planned changes in a user-friendly format
pub fn display_plan(operation: OperationType, changes: &[PlannedChange], verbose: bool) {
    if changes.is_empty() {
        println!();
        println!("  {} Nothing to {}", "✓".green(), operation);
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        format!("Plan: {operation}").bold()
    );
    println!("│");

    for change in changes {
        let resource = &change.resource;
        let symbol = match (operation, change.action) {
            (OperationType::Refresh, _) => "↻".cyan(),
            (_, Action::Create) => "+".green(),
            (_, Action::Update) => "~".yellow(),
            (_, Action::Delete) => "-".red(),
            (_, Action::Unchanged) if verbose => "=".dimmed(),
            (_, Action::Unchanged) => continue,
        };

        let deps = if resource.depends_on.is_empty() {
            String::new()
        } else {
            let names: Vec<_> = resource.depends_on.iter().map(ToString::to_string).collect();
            format!(" (after {})", names.join(", "))
        };

        println!(
            "│   {} {:<30} {}{}",
            symbol,
            resource.id,
            resource.resource_type.to_string().dimmed(),
            deps.dimmed()
        );
    }
    println!("│");

    let counts = PlanCounts::of(changes);
    println!("├─────────────────────────────────────────────────────┤");
    if operation == OperationType::Refresh {
        println!(
            "│ Summary: {} resources to read back",
            changes.len().to_string().bold()
        );
    } else {
        println!(
            "│ Summary: {} to create, {} to update, {} to delete, {} unchanged",
            counts.create.to_string().green(),
            counts.update.to_string().yellow(),
            counts.delete.to_string().red(),
            counts.unchanged.to_string().dimmed()
        );
    }
    println!("└─────────────────────────────────────────────────────┘");
}
