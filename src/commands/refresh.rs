use anyhow::Result;
use converge::OperationType;

use crate::Context;
use crate::config::RunSettings;
use crate::engine::{self, RunOptions};
use crate::state::FileStateStorage;
use crate::ui;

/// Read back every recorded resource; never asks for confirmation
pub fn run(ctx: &Context, settings: &RunSettings) -> Result<()> {
    let state = FileStateStorage::new(&settings.state_file).load()?;
    if !ctx.quiet {
        ui::state_header(&settings.state_file, &state);
    }

    let changes = engine::plan_refresh(&state.to_index());
    let opts = RunOptions {
        dry_run: false,
        yes: true,
    };
    let summary = engine::execute(ctx, settings, OperationType::Refresh, changes, state, &opts)?;
    engine::ensure_success(&summary)
}
