//! Resource node - one resource plus its planned action
//!
//! A node runs through `Pending -> Resolving -> Executing -> Succeeded` or
//! stops in `Failed`. Reference resolution always happens before any
//! backend call, and indices are only touched after the backend reported
//! success.

use crate::backend::{ApplyRequest, DeleteRequest, ReadRequest};
use crate::context::{Message, Mutation, OperationType, Phase, RunContext};
use crate::error::Status;
use crate::pruner::prune_fields;
use crate::resource::{Action, Resource, ResourceKey};
use std::sync::{Mutex, MutexGuard};

/// Execution state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Waiting for the walker
    Pending,
    /// Materializing implicit references
    Resolving,
    /// Backend call in flight
    Executing,
    /// Finished and persisted
    Succeeded,
    /// Finished with a failure status
    Failed,
}

/// A resource scheduled for execution
#[derive(Debug)]
pub struct ResourceNode {
    key: ResourceKey,
    action: Action,
    resource: Resource,
    state: Mutex<NodeState>,
}

impl ResourceNode {
    pub fn new(resource: Resource, action: Action) -> Self {
        Self {
            key: resource.resource_key(),
            action,
            resource,
            state: Mutex::new(NodeState::Pending),
        }
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn action(&self) -> Action {
        self.action
    }

    /// Desired (or, for deletes, last known) state of the resource
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn state(&self) -> NodeState {
        *self.lock()
    }

    /// Execute the node against the run context.
    ///
    /// A node runs at most once; later calls return without side effects.
    pub fn execute(&self, ctx: &RunContext) -> Result<(), Status> {
        {
            let mut state = self.lock();
            if *state != NodeState::Pending {
                log::warn!("node {} already executed, ignoring", self.key);
                return Ok(());
            }
            *state = NodeState::Resolving;
        }
        log::debug!("executing node {} ({} {})", self.key, ctx.operation(), self.action);

        let result = match ctx.operation() {
            OperationType::Refresh => self.refresh(ctx),
            OperationType::Apply | OperationType::Destroy => self.converge(ctx),
        };

        match &result {
            Ok(()) => {
                self.set_state(NodeState::Succeeded);
                let phase = if self.is_noop(ctx) {
                    Phase::Skipped
                } else {
                    Phase::Succeeded
                };
                ctx.emit(Message::new(self.key.clone(), phase));
            }
            Err(status) => {
                log::debug!("node {} failed: {status}", self.key);
                self.set_state(NodeState::Failed);
                ctx.emit(Message::new(self.key.clone(), Phase::Failed).with_status(status.clone()));
            }
        }
        result
    }

    fn converge(&self, ctx: &RunContext) -> Result<(), Status> {
        match self.action {
            Action::Create | Action::Update => {
                let mut planned = self.resource.clone();
                planned.attributes = ctx.resolve_references(&self.resource.attributes)?;
                prune_fields(&mut planned.attributes, ctx.ignore_fields());

                let backend = ctx.backend(&planned.resource_type)?;
                self.begin_executing(ctx);
                let mut applied = backend.apply(ApplyRequest {
                    prior: ctx.prior(&self.key),
                    planned: &planned,
                    cancel: ctx.cancel_token(),
                })?;
                applied.depends_on = planned.depends_on;

                ctx.commit(&self.key, Mutation::Upsert(applied))?;
                log::info!("{} {}", self.action, self.key);
                Ok(())
            }
            Action::Delete => {
                let prior = ctx.prior(&self.key).unwrap_or(&self.resource);
                let backend = ctx.backend(&prior.resource_type)?;
                self.begin_executing(ctx);
                backend.delete(DeleteRequest {
                    prior,
                    cancel: ctx.cancel_token(),
                })?;

                ctx.commit(&self.key, Mutation::Remove)?;
                log::info!("deleted {}", self.key);
                Ok(())
            }
            Action::Unchanged => match ctx.prior(&self.key) {
                Some(prior) => ctx.commit(&self.key, Mutation::Upsert(prior.clone())),
                None => Ok(()),
            },
        }
    }

    fn refresh(&self, ctx: &RunContext) -> Result<(), Status> {
        let prior = ctx.prior(&self.key).unwrap_or(&self.resource);
        let backend = ctx.backend(&prior.resource_type)?;
        self.begin_executing(ctx);
        let observed = backend.read(ReadRequest {
            prior,
            cancel: ctx.cancel_token(),
        })?;

        match observed {
            Some(mut observed) => {
                observed.depends_on = prior.depends_on.clone();
                ctx.commit(&self.key, Mutation::Upsert(observed))?;
                log::info!("refreshed {}", self.key);
            }
            None => {
                ctx.commit(&self.key, Mutation::Remove)?;
                log::info!("{} no longer exists, dropped from state", self.key);
            }
        }
        Ok(())
    }

    fn is_noop(&self, ctx: &RunContext) -> bool {
        self.action == Action::Unchanged && ctx.operation() != OperationType::Refresh
    }

    fn begin_executing(&self, ctx: &RunContext) {
        self.set_state(NodeState::Executing);
        ctx.emit(Message::new(self.key.clone(), Phase::Started));
    }

    fn set_state(&self, state: NodeState) {
        *self.lock() = state;
    }

    fn lock(&self) -> MutexGuard<'_, NodeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
