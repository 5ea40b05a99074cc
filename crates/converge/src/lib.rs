//! # Converge
//!
//! Dependency-ordered execution of infrastructure resources.
//!
//! This crate takes a planned set of resources, orders them by their
//! declared and implicit dependencies, and converges each one through a
//! pluggable backend while persisting the accumulated state after every
//! successful change.
//!
//! ## Core Concepts
//!
//! - **Resource**: A typed, identified attribute tree plus its dependencies
//! - **Implicit reference**: A `$converge_path.<key>.<path>` string that is
//!   replaced with another resource's attribute before the backend call
//! - **ResourceNode**: One resource with its planned action and execution state
//! - **Graph**: The dependency DAG, walked with bounded parallelism
//! - **RunContext**: Indices, accumulated state and storage shared by one run
//!
//! ## Example
//!
//! ```ignore
//! use converge::{
//!     Action, BackendRegistry, ExecuteOptions, Graph, OperationType, Resource,
//!     ResourceNode, RunContext,
//! };
//! use std::sync::Arc;
//!
//! let ctx = RunContext::builder(OperationType::Apply)
//!     .prior_state(prior)
//!     .backends(BackendRegistry::new().with("Local", Arc::new(LocalBackend::new(root))))
//!     .storage(Arc::new(storage))
//!     .build();
//!
//! let nodes = planned.into_iter().map(|(r, a)| ResourceNode::new(r, a));
//! let graph = Graph::build(OperationType::Apply, nodes)?;
//! let summary = graph.walk(&ctx, &ExecuteOptions::default())?;
//! for (key, status) in &summary.failures {
//!     eprintln!("{key}: {status}");
//! }
//! ```
//!
//! ## Capability Traits
//!
//! - [`Backend`]: Applies, deletes and reads resources of one type
//! - [`StateStorage`]: Persists the accumulated state
//!
//! Both are injected through the [`RunContext`] builder, so the crate has
//! no dependency on any concrete provider or storage location.

pub mod backend;
pub mod context;
pub mod error;
pub mod graph;
pub mod node;
pub mod pruner;
pub mod reference;
pub mod resource;
pub mod storage;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types at crate root
pub use backend::{ApplyRequest, Backend, BackendRegistry, DeleteRequest, ReadRequest};
pub use context::{Message, Mutation, OperationType, Phase, RunContext, RunContextBuilder};
pub use error::{Error, Result, Status, StatusKind};
pub use graph::Graph;
pub use node::{NodeState, ResourceNode};
pub use pruner::{FieldPath, prune_fields, remove_nested_field};
pub use reference::{IMPLICIT_REF_PREFIX, implicit_ref, resolve_implicit_refs};
pub use resource::{Action, Attributes, Resource, ResourceIndex, ResourceKey, ResourceType};
pub use storage::{MemoryStorage, State, StateStorage};
pub use types::{ExecuteOptions, RunSummary};

pub use tokio_util::sync::CancellationToken;
