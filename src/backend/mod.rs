//! Backends built into the stratum binary
//!
//! Each backend serves one resource type tag. The registry is assembled
//! once per run from the effective settings.

pub mod local;

use converge::BackendRegistry;
use std::sync::Arc;

use crate::config::RunSettings;

pub use local::{LOCAL, LocalBackend};

/// Registry with every built-in backend
pub fn registry(settings: &RunSettings) -> BackendRegistry {
    BackendRegistry::new().with(LOCAL, Arc::new(LocalBackend::new(&settings.local_root)))
}
