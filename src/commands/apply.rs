use anyhow::Result;
use converge::OperationType;
use std::path::Path;

use crate::Context;
use crate::config::RunSettings;
use crate::engine::{self, RunOptions};
use crate::manifest::Manifest;
use crate::state::FileStateStorage;
use crate::ui;

pub fn run(
    ctx: &Context,
    settings: &RunSettings,
    manifest: &Path,
    opts: &RunOptions,
) -> Result<()> {
    let manifest = Manifest::load(manifest)?;
    let state = FileStateStorage::new(&settings.state_file).load()?;
    if !ctx.quiet {
        ui::state_header(&settings.state_file, &state);
    }

    let changes = engine::plan_apply(
        &manifest.resources,
        &state.to_index(),
        &settings.ignore_fields,
    );
    let summary = engine::execute(ctx, settings, OperationType::Apply, changes, state, opts)?;
    engine::ensure_success(&summary)
}
