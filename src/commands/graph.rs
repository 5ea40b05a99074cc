use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use converge::{Graph, OperationType, ResourceNode};
use std::path::Path;

use crate::Context;
use crate::config::RunSettings;
use crate::engine;
use crate::manifest::Manifest;
use crate::state::FileStateStorage;
use crate::ui;

/// Print the order an apply of `manifest` would run in
pub fn run(_ctx: &Context, settings: &RunSettings, manifest: &Path) -> Result<()> {
    let manifest = Manifest::load(manifest)?;
    let prior = FileStateStorage::new(&settings.state_file).load()?.to_index();
    let changes = engine::plan_apply(&manifest.resources, &prior, &settings.ignore_fields);

    let nodes = changes
        .into_iter()
        .map(|change| ResourceNode::new(change.resource, change.action));
    let graph = Graph::build(OperationType::Apply, nodes).context("Invalid resource graph")?;

    ui::header("Execution Order");
    for (position, key) in graph.execution_order().iter().enumerate() {
        let action = graph
            .get(key.as_str())
            .map(|node| node.action().to_string())
            .unwrap_or_default();
        let deps = graph.dependencies(key.as_str());
        let after = if deps.is_empty() {
            String::new()
        } else {
            let names: Vec<_> = deps.iter().map(ToString::to_string).collect();
            format!("after {}", names.join(", "))
        };

        println!(
            "  {} {:<30} {:<10} {}",
            format!("{:>3}.", position + 1).blue(),
            key,
            action,
            after.dimmed()
        );
    }
    println!();
    Ok(())
}
