//! Options and results of a graph walk

use crate::context::OperationType;
use crate::error::Status;
use crate::resource::{Action, ResourceKey};

/// Options for walking a graph
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of parallel workers (0 is treated as 1)
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { jobs: 4 }
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Every failing or skipped node with its status
    pub failures: Vec<(ResourceKey, Status)>,
}

impl RunSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    /// Check if every node succeeded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Total number of nodes accounted for
    pub fn total(&self) -> usize {
        self.created
            + self.updated
            + self.deleted
            + self.unchanged
            + self.refreshed
            + self.failed
            + self.skipped
    }

    /// Count a node that finished successfully
    pub fn add_success(&mut self, operation: OperationType, action: Action) {
        if operation == OperationType::Refresh {
            self.refreshed += 1;
            return;
        }
        match action {
            Action::Create => self.created += 1,
            Action::Update => self.updated += 1,
            Action::Delete => self.deleted += 1,
            Action::Unchanged => self.unchanged += 1,
        }
    }

    /// Record a node that failed or never ran
    pub fn add_failure(&mut self, key: ResourceKey, status: Status) {
        if status.kind.is_skip() {
            self.skipped += 1;
        } else {
            self.failed += 1;
        }
        self.failures.push((key, status));
    }

    /// Status recorded for `key`, if it did not succeed
    pub fn failure(&self, key: &str) -> Option<&Status> {
        self.failures
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, status)| status)
    }
}
