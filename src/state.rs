//! State file: the persisted record of what exists after each run

use anyhow::{Context, Result};
use converge::{State, StateStorage};
use std::fs;
use std::path::{Path, PathBuf};

/// Stores the accumulated state as pretty JSON in one file
#[derive(Debug, Clone)]
pub struct FileStateStorage {
    path: PathBuf,
}

impl FileStateStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state from disk, or return an empty state if the file doesn't exist
    pub fn load(&self) -> Result<State> {
        if !self.path.exists() {
            log::debug!("State file does not exist, starting empty");
            return Ok(State::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;
        let state: State = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))?;

        log::debug!(
            "Loaded state serial {} with {} resources from {}",
            state.serial,
            state.resources.len(),
            self.path.display()
        );
        Ok(state)
    }
}

impl StateStorage for FileStateStorage {
    /// Write to a sibling temp file and rename it over the state file, so a
    /// crash mid-write leaves the previous state intact.
    fn persist(&self, state: &State) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(state).context("Failed to serialize state to JSON")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;

        log::debug!("Saved state serial {} to {}", state.serial, self.path.display());
        Ok(())
    }
}
