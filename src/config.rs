//! User settings from `config.toml` merged with command-line overrides

use anyhow::{Context, Result};
use converge::FieldPath;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;

/// Default number of parallel workers
pub const DEFAULT_JOBS: usize = 4;

/// Settings file contents; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Parallel workers for the graph walk
    pub jobs: Option<usize>,
    /// Dot paths removed from attributes before they reach a backend
    pub ignore_fields: Vec<String>,
    /// Where the state file lives
    pub state_file: Option<String>,
    /// Directory the `Local` backend writes into
    pub local_root: Option<String>,
}

impl Settings {
    /// Load `config.toml` from the config directory, or defaults if absent
    pub fn load() -> Result<Self> {
        let path = paths::config_dir()?.join("config.toml");
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;
        let settings: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub jobs: Option<usize>,
    pub ignore_fields: Vec<String>,
    pub state_file: Option<String>,
    pub local_root: Option<String>,
}

/// Effective settings for one invocation
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub jobs: usize,
    pub ignore_fields: Vec<FieldPath>,
    pub state_file: PathBuf,
    pub local_root: PathBuf,
}

impl RunSettings {
    /// Merge file settings with overrides; flags win, ignore fields add up.
    ///
    /// Unset paths fall back to locations under `state_dir`.
    pub fn resolve(settings: Settings, overrides: Overrides, state_dir: &Path) -> Self {
        let jobs = overrides.jobs.or(settings.jobs).unwrap_or(DEFAULT_JOBS);

        let mut ignore_fields: Vec<FieldPath> = Vec::new();
        for field in settings.ignore_fields.iter().chain(&overrides.ignore_fields) {
            let path = FieldPath::parse(field);
            if !path.is_empty() && !ignore_fields.contains(&path) {
                ignore_fields.push(path);
            }
        }

        let state_file = overrides
            .state_file
            .or(settings.state_file)
            .map(|p| paths::expand(&p))
            .unwrap_or_else(|| state_dir.join("state.json"));
        let local_root = overrides
            .local_root
            .or(settings.local_root)
            .map(|p| paths::expand(&p))
            .unwrap_or_else(|| state_dir.join("resources"));

        Self {
            jobs,
            ignore_fields,
            state_file,
            local_root,
        }
    }
}
