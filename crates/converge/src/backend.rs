//! Backend abstraction for infrastructure targets.
//!
//! The [`Backend`] trait is the only thing the engine knows about real
//! infrastructure. Each resource type is served by one backend instance,
//! looked up in a [`BackendRegistry`] built once per run, enabling:
//! - cluster and cloud API implementations living in other crates
//! - alternate implementations injected as test doubles

use crate::error::{Status, StatusKind};
use crate::resource::{Resource, ResourceType};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Request to converge a resource to its planned state.
#[derive(Debug, Clone, Copy)]
pub struct ApplyRequest<'a> {
    /// Last persisted state, `None` when the resource is being created
    pub prior: Option<&'a Resource>,
    /// Planned state with references resolved and ignore fields removed
    pub planned: &'a Resource,
    /// Cancelled when the run is aborted
    pub cancel: &'a CancellationToken,
}

/// Request to remove a resource from live infrastructure.
#[derive(Debug, Clone, Copy)]
pub struct DeleteRequest<'a> {
    /// Resource to delete
    pub prior: &'a Resource,
    /// Cancelled when the run is aborted
    pub cancel: &'a CancellationToken,
}

/// Request to observe the live state of a resource.
#[derive(Debug, Clone, Copy)]
pub struct ReadRequest<'a> {
    /// Last known state, used to locate the live object
    pub prior: &'a Resource,
    /// Cancelled when the run is aborted
    pub cancel: &'a CancellationToken,
}

/// Capability set implemented once per infrastructure target.
///
/// Calls are blocking I/O; the engine runs each one on the worker that owns
/// the node. A returned [`Status`] fails the node verbatim.
pub trait Backend: Send + Sync {
    /// Create or update a resource and return its resulting state.
    fn apply(&self, request: ApplyRequest<'_>) -> Result<Resource, Status>;

    /// Delete a resource.
    fn delete(&self, request: DeleteRequest<'_>) -> Result<(), Status>;

    /// Read a resource's live state, `None` when it no longer exists.
    fn read(&self, request: ReadRequest<'_>) -> Result<Option<Resource>, Status>;
}

/// Maps resource types to their backend.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<ResourceType, Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend, replacing any previous one for the same type.
    pub fn register(&mut self, resource_type: impl Into<ResourceType>, backend: Arc<dyn Backend>) {
        self.backends.insert(resource_type.into(), backend);
    }

    /// Builder form of [`BackendRegistry::register`].
    pub fn with(mut self, resource_type: impl Into<ResourceType>, backend: Arc<dyn Backend>) -> Self {
        self.register(resource_type, backend);
        self
    }

    /// Look up the backend serving `resource_type`.
    pub fn get(&self, resource_type: &ResourceType) -> Result<&dyn Backend, Status> {
        self.backends
            .get(resource_type)
            .map(|backend| backend.as_ref())
            .ok_or_else(|| {
                Status::new(
                    StatusKind::BackendNotFound,
                    format!("no backend registered for resource type {resource_type}"),
                )
            })
    }

    pub fn contains(&self, resource_type: &ResourceType) -> bool {
        self.backends.contains_key(resource_type)
    }

    /// Registered types, sorted.
    pub fn types(&self) -> Vec<&ResourceType> {
        let mut types: Vec<_> = self.backends.keys().collect();
        types.sort();
        types
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("types", &self.types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingBackend;

    #[test]
    fn test_registry_lookup() {
        let registry = BackendRegistry::new().with("Kubernetes", Arc::new(RecordingBackend::new()));

        assert!(registry.contains(&ResourceType::from("Kubernetes")));
        assert!(registry.get(&ResourceType::from("Kubernetes")).is_ok());
    }

    #[test]
    fn test_registry_missing_type() {
        let registry = BackendRegistry::new();
        let status = registry.get(&ResourceType::from("Terraform")).err().unwrap();

        assert_eq!(status.kind, StatusKind::BackendNotFound);
        assert!(status.message.contains("Terraform"));
    }

    #[test]
    fn test_registry_replaces_backend() {
        let mut registry = BackendRegistry::new();
        registry.register("Local", Arc::new(RecordingBackend::new()));
        registry.register("Local", Arc::new(RecordingBackend::new()));
        registry.register("Kubernetes", Arc::new(RecordingBackend::new()));

        let types: Vec<_> = registry.types().into_iter().map(ResourceType::as_str).collect();
        assert_eq!(types, ["Kubernetes", "Local"]);
    }
}
