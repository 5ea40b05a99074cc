//! Error types for graph construction and node execution.
//!
//! Two layers are kept apart: [`Error`] is returned while building a
//! dependency graph (a malformed plan never starts executing), and
//! [`Status`] is the failure value a single node reports while the graph
//! is being walked. A run collects every failing [`Status`], not just the
//! first one.

use crate::resource::ResourceKey;
use std::fmt;
use thiserror::Error;

/// Categories of node failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// Broken or unresolvable reference, or otherwise invalid manifest content
    IllegalManifest,
    /// Failure reported by a backend's Apply/Delete/Read
    BackendFailure,
    /// No backend is registered for the resource type
    BackendNotFound,
    /// The state storage rejected a persist call
    StorageFailure,
    /// Not executed because a dependency failed or was skipped
    DependencyFailed,
    /// Not executed because the run was cancelled
    Cancelled,
}

impl StatusKind {
    /// Whether the node never reached its own execution.
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::DependencyFailed | Self::Cancelled)
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IllegalManifest => "IllegalManifest",
            Self::BackendFailure => "BackendFailure",
            Self::BackendNotFound => "BackendNotFound",
            Self::StorageFailure => "StorageFailure",
            Self::DependencyFailed => "DependencyFailed",
            Self::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Failure status of a single node.
///
/// Success is the absence of a status (`Ok(())`).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Status {
    /// Failure category
    pub kind: StatusKind,
    /// Human-readable detail, consumed verbatim by tooling for some kinds
    pub message: String,
}

impl Status {
    pub fn new(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn illegal_manifest(message: impl Into<String>) -> Self {
        Self::new(StatusKind::IllegalManifest, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(StatusKind::BackendFailure, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(StatusKind::StorageFailure, message)
    }

    /// Status recorded for a node whose predecessor did not succeed.
    pub fn dependency_failed(dependency: &ResourceKey) -> Self {
        Self::new(
            StatusKind::DependencyFailed,
            format!("blocked by failed dependency: {dependency}"),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(StatusKind::Cancelled, "run cancelled before node started")
    }
}

/// Errors raised while building a dependency graph.
#[derive(Debug, Error)]
pub enum Error {
    /// Two resources share one key
    #[error("duplicate resource key: {0}")]
    DuplicateResource(ResourceKey),

    /// A declared dependency names a resource that is not part of the plan
    #[error("resource {resource} depends on unknown resource {dependency}")]
    MissingDependency {
        /// Resource declaring the dependency
        resource: ResourceKey,
        /// Key that could not be found
        dependency: ResourceKey,
    },

    /// Declared or implicit dependencies form a cycle
    #[error("dependency cycle detected at resource {0}")]
    Cycle(ResourceKey),

    /// The worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Result type for graph operations.
pub type Result<T> = std::result::Result<T, Error>;
