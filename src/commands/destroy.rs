use anyhow::Result;
use converge::OperationType;

use crate::Context;
use crate::config::RunSettings;
use crate::engine::{self, RunOptions};
use crate::state::FileStateStorage;
use crate::ui;

pub fn run(ctx: &Context, settings: &RunSettings, opts: &RunOptions) -> Result<()> {
    let state = FileStateStorage::new(&settings.state_file).load()?;
    if !ctx.quiet {
        ui::state_header(&settings.state_file, &state);
    }

    let changes = engine::plan_destroy(&state.to_index());
    let summary = engine::execute(ctx, settings, OperationType::Destroy, changes, state, opts)?;
    engine::ensure_success(&summary)
}
