//! Accumulated run state and the storage capability that persists it

use crate::resource::{Resource, ResourceIndex};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Resources known to exist after the mutations applied so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Incremented on every recorded mutation
    #[serde(default)]
    pub serial: u64,
    /// Time of the last recorded mutation
    pub last_modified: DateTime<Utc>,
    /// Resources sorted by key
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl State {
    pub fn new() -> Self {
        Self {
            serial: 0,
            last_modified: Utc::now(),
            resources: Vec::new(),
        }
    }

    /// Replace the resource list with a snapshot of `index` and bump the serial
    pub fn record(&mut self, index: &ResourceIndex) {
        let mut resources: Vec<Resource> = index.values().cloned().collect();
        resources.sort_by(|a, b| a.id.cmp(&b.id));
        self.resources = resources;
        self.serial += 1;
        self.last_modified = Utc::now();
    }

    /// Index the resources by key
    pub fn to_index(&self) -> ResourceIndex {
        self.resources
            .iter()
            .map(|r| (r.resource_key(), r.clone()))
            .collect()
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

/// Persistence capability for the accumulated state
///
/// Called after every successful mutation while the run lock is held, so
/// implementations never see concurrent calls from one run.
pub trait StateStorage: Send + Sync {
    /// Persist the full accumulated state
    fn persist(&self, state: &State) -> Result<()>;
}

/// Storage that keeps every persisted snapshot in memory
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshots: Mutex<Vec<State>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent snapshot
    pub fn latest(&self) -> Option<State> {
        self.lock().last().cloned()
    }

    /// Number of persist calls received
    pub fn persist_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<State>> {
        match self.snapshots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl StateStorage for MemoryStorage {
    fn persist(&self, state: &State) -> Result<()> {
        self.lock().push(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sorts_and_bumps_serial() {
        let mut index = ResourceIndex::new();
        for id in ["pony", "eric", "jack"] {
            let resource = Resource::new(id, "Kubernetes");
            index.insert(resource.resource_key(), resource);
        }

        let mut state = State::new();
        state.record(&index);

        let ids: Vec<_> = state.resources.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["eric", "jack", "pony"]);
        assert_eq!(state.serial, 1);
        assert_eq!(state.to_index().len(), 3);
    }

    #[test]
    fn test_memory_storage_keeps_snapshots() {
        let storage = MemoryStorage::new();
        let mut state = State::new();
        storage.persist(&state).unwrap();
        state.serial = 7;
        storage.persist(&state).unwrap();

        assert_eq!(storage.persist_count(), 2);
        assert_eq!(storage.latest().unwrap().serial, 7);
    }

    #[test]
    fn test_state_json_shape() {
        let mut index = ResourceIndex::new();
        let resource = Resource::new("jack", "Local");
        index.insert(resource.resource_key(), resource);
        let mut state = State::new();
        state.record(&index);

        let json = serde_json::to_string(&state).unwrap();
        let back: State = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
