//! Run context shared by every node of one execution
//!
//! The context is built once per run and passed by reference to the workers
//! walking the graph. Read-only inputs (operation type, prior state, ignore
//! fields, backends) are plain fields. The indices that nodes mutate, the
//! accumulated state and the storage calls all sit behind one mutex.

use crate::backend::{Backend, BackendRegistry};
use crate::error::Status;
use crate::pruner::FieldPath;
use crate::reference::resolve_implicit_refs;
use crate::resource::{Attributes, Resource, ResourceIndex, ResourceKey, ResourceType};
use crate::storage::{MemoryStorage, State, StateStorage};
use std::fmt;
use std::sync::mpsc::{SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Kind of run being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    /// Converge live infrastructure to the plan
    Apply,
    /// Delete everything in the plan, dependents first
    Destroy,
    /// Re-read live state for every resource
    Refresh,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Destroy => write!(f, "destroy"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

/// Lifecycle point reported on the progress stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The node started executing
    Started,
    /// The node finished and its result was persisted
    Succeeded,
    /// The node failed
    Failed,
    /// The node was never executed
    Skipped,
}

/// Progress event for one node
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub node_id: ResourceKey,
    pub phase: Phase,
    pub status: Option<Status>,
}

impl Message {
    pub fn new(node_id: ResourceKey, phase: Phase) -> Self {
        Self {
            node_id,
            phase,
            status: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
}

/// Change recorded for a resource after a successful backend call
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Insert or replace the resource
    Upsert(Resource),
    /// Remove the resource
    Remove,
}

/// Mutable run state guarded by the run lock
#[derive(Debug)]
struct Shared {
    context: ResourceIndex,
    result: ResourceIndex,
    state: State,
}

/// Shared state of one execution
pub struct RunContext {
    operation: OperationType,
    prior: ResourceIndex,
    ignore_fields: Vec<FieldPath>,
    backends: BackendRegistry,
    storage: Arc<dyn StateStorage>,
    progress: Option<SyncSender<Message>>,
    cancel: CancellationToken,
    shared: Mutex<Shared>,
}

impl RunContext {
    pub fn builder(operation: OperationType) -> RunContextBuilder {
        RunContextBuilder::new(operation)
    }

    pub fn operation(&self) -> OperationType {
        self.operation
    }

    /// Last persisted state of `key`
    pub fn prior(&self, key: &ResourceKey) -> Option<&Resource> {
        self.prior.get(key)
    }

    pub fn ignore_fields(&self) -> &[FieldPath] {
        &self.ignore_fields
    }

    pub fn backend(&self, resource_type: &ResourceType) -> Result<&dyn Backend, Status> {
        self.backends.get(resource_type)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolve implicit references against the context index
    pub fn resolve_references(&self, attributes: &Attributes) -> Result<Attributes, Status> {
        let shared = self.lock();
        resolve_implicit_refs(attributes, &shared.context)
    }

    /// Record a successful mutation and persist the accumulated state.
    ///
    /// Both the result index and the context index are updated, so later
    /// references resolve against what the backend returned. If persisting
    /// fails, indices and state are put back as they were.
    pub fn commit(&self, key: &ResourceKey, mutation: Mutation) -> Result<(), Status> {
        let mut shared = self.lock();
        let Shared {
            context,
            result,
            state,
        } = &mut *shared;

        let (old_context, old_result) = match mutation {
            Mutation::Upsert(resource) => (
                context.insert(key.clone(), resource.clone()),
                result.insert(key.clone(), resource),
            ),
            Mutation::Remove => (context.remove(key), result.remove(key)),
        };
        let old_state = state.clone();
        state.record(result);

        if let Err(e) = self.storage.persist(state) {
            restore(context, key, old_context);
            restore(result, key, old_result);
            *state = old_state;
            return Err(Status::storage(format!(
                "failed to persist state after {key}: {e:#}"
            )));
        }
        Ok(())
    }

    /// Send a progress event without blocking.
    ///
    /// A full or disconnected channel drops the event.
    pub fn emit(&self, message: Message) {
        let Some(progress) = &self.progress else {
            return;
        };

        match progress.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                log::debug!("progress channel full, dropping event for {}", message.node_id);
            }
            Err(TrySendError::Disconnected(message)) => {
                log::debug!("progress consumer gone, dropping event for {}", message.node_id);
            }
        }
    }

    /// Copy of the result index
    pub fn result_index(&self) -> ResourceIndex {
        self.lock().result.clone()
    }

    /// Copy of the context index
    pub fn context_index(&self) -> ResourceIndex {
        self.lock().context.clone()
    }

    /// Copy of the accumulated state
    pub fn state(&self) -> State {
        self.lock().state.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn restore(index: &mut ResourceIndex, key: &ResourceKey, previous: Option<Resource>) {
    match previous {
        Some(resource) => {
            index.insert(key.clone(), resource);
        }
        None => {
            index.remove(key);
        }
    }
}

impl fmt::Debug for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunContext")
            .field("operation", &self.operation)
            .field("prior", &self.prior.len())
            .field("ignore_fields", &self.ignore_fields)
            .field("backends", &self.backends)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RunContext`]
pub struct RunContextBuilder {
    operation: OperationType,
    prior: ResourceIndex,
    context: Option<ResourceIndex>,
    result: Option<ResourceIndex>,
    state: State,
    ignore_fields: Vec<FieldPath>,
    backends: BackendRegistry,
    storage: Option<Arc<dyn StateStorage>>,
    progress: Option<SyncSender<Message>>,
    cancel: CancellationToken,
}

impl RunContextBuilder {
    pub fn new(operation: OperationType) -> Self {
        Self {
            operation,
            prior: ResourceIndex::new(),
            context: None,
            result: None,
            state: State::new(),
            ignore_fields: Vec::new(),
            backends: BackendRegistry::new(),
            storage: None,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Last persisted state; also the default context and result index
    pub fn prior_state(mut self, prior: ResourceIndex) -> Self {
        self.prior = prior;
        self
    }

    /// Index used for reference resolution
    pub fn context_index(mut self, context: ResourceIndex) -> Self {
        self.context = Some(context);
        self
    }

    /// Starting content of the result index
    pub fn result_index(mut self, result: ResourceIndex) -> Self {
        self.result = Some(result);
        self
    }

    /// Accumulator to continue from (keeps the serial of a loaded state)
    pub fn state(mut self, state: State) -> Self {
        self.state = state;
        self
    }

    pub fn ignore_fields(mut self, fields: impl IntoIterator<Item = FieldPath>) -> Self {
        self.ignore_fields = fields.into_iter().filter(|f| !f.is_empty()).collect();
        self
    }

    pub fn backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = backends;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StateStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn progress(mut self, sender: SyncSender<Message>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> RunContext {
        let context = self.context.unwrap_or_else(|| self.prior.clone());
        let result = self.result.unwrap_or_else(|| self.prior.clone());
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()) as Arc<dyn StateStorage>);

        RunContext {
            operation: self.operation,
            prior: self.prior,
            ignore_fields: self.ignore_fields,
            backends: self.backends,
            storage,
            progress: self.progress,
            cancel: self.cancel,
            shared: Mutex::new(Shared {
                context,
                result,
                state: self.state,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusKind;
    use crate::testing::{FailingStorage, index_of, resource};
    use serde_json::json;
    use std::sync::mpsc;

    #[test]
    fn test_defaults_seed_indices_from_prior() {
        let prior = index_of([resource("jack", json!({"a": {"b": "c"}}))]);
        let ctx = RunContext::builder(OperationType::Apply)
            .prior_state(prior)
            .build();

        assert!(ctx.prior(&ResourceKey::from("jack")).is_some());
        assert_eq!(ctx.context_index().len(), 1);
        assert_eq!(ctx.result_index().len(), 1);
    }

    #[test]
    fn test_commit_updates_indices_and_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let ctx = RunContext::builder(OperationType::Apply)
            .storage(storage.clone())
            .build();
        let jack = resource("jack", json!({"a": 1}));

        ctx.commit(&jack.resource_key(), Mutation::Upsert(jack.clone()))
            .unwrap();
        assert_eq!(ctx.result_index()[&jack.resource_key()], jack);
        assert_eq!(ctx.context_index()[&jack.resource_key()], jack);
        assert_eq!(storage.latest().unwrap().resources, vec![jack.clone()]);

        ctx.commit(&jack.resource_key(), Mutation::Remove).unwrap();
        assert!(ctx.result_index().is_empty());
        assert!(ctx.context_index().is_empty());
        assert_eq!(storage.persist_count(), 2);
        assert_eq!(ctx.state().serial, 2);
    }

    #[test]
    fn test_commit_surfaces_storage_failure() {
        let ctx = RunContext::builder(OperationType::Apply)
            .storage(Arc::new(FailingStorage))
            .build();
        let jack = resource("jack", json!({}));

        let status = ctx
            .commit(&jack.resource_key(), Mutation::Upsert(jack))
            .unwrap_err();
        assert_eq!(status.kind, StatusKind::StorageFailure);
        assert!(status.message.contains("disk full"));
    }

    #[test]
    fn test_failed_persist_restores_indices_and_state() {
        let prior = index_of([resource("jack", json!({"a": "prior"}))]);
        let ctx = RunContext::builder(OperationType::Apply)
            .prior_state(prior.clone())
            .storage(Arc::new(FailingStorage))
            .build();
        let jack = ResourceKey::from("jack");
        let pony = resource("pony", json!({}));

        ctx.commit(&jack, Mutation::Upsert(resource("jack", json!({"a": "new"}))))
            .unwrap_err();
        ctx.commit(&jack, Mutation::Remove).unwrap_err();
        ctx.commit(&pony.resource_key(), Mutation::Upsert(pony.clone()))
            .unwrap_err();

        assert_eq!(ctx.result_index(), prior);
        assert_eq!(ctx.context_index(), prior);
        assert_eq!(ctx.state().serial, 0);
        assert!(ctx.state().resources.is_empty());
    }

    #[test]
    fn test_emit_never_blocks_without_consumer() {
        let (tx, rx) = mpsc::sync_channel(1);
        let ctx = RunContext::builder(OperationType::Apply)
            .progress(tx)
            .build();

        for id in ["jack", "pony", "eric"] {
            ctx.emit(Message::new(ResourceKey::from(id), Phase::Started));
        }

        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_emit_after_consumer_dropped() {
        let (tx, rx) = mpsc::sync_channel(4);
        drop(rx);
        let ctx = RunContext::builder(OperationType::Apply)
            .progress(tx)
            .build();

        ctx.emit(Message::new(ResourceKey::from("jack"), Phase::Succeeded));
    }

    #[test]
    fn test_resolve_references_uses_context_index() {
        let ctx = RunContext::builder(OperationType::Apply)
            .prior_state(index_of([resource("jack", json!({"a": "prior"}))]))
            .context_index(index_of([resource("jack", json!({"a": "live"}))]))
            .build();

        let resolved = ctx
            .resolve_references(&crate::testing::attrs(json!({"x": "$converge_path.jack.a"})))
            .unwrap();
        assert_eq!(resolved["x"], json!("live"));
    }

    #[test]
    fn test_ignore_fields_drop_empty_paths() {
        let ctx = RunContext::builder(OperationType::Apply)
            .ignore_fields([FieldPath::parse("status"), FieldPath::parse("")])
            .build();
        assert_eq!(ctx.ignore_fields(), [FieldPath::parse("status")]);
    }
}
