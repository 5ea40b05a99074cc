//! Test doubles shared by the unit tests

use crate::backend::{ApplyRequest, Backend, DeleteRequest, ReadRequest};
use crate::error::Status;
use crate::resource::{Attributes, Resource, ResourceIndex, ResourceKey};
use crate::storage::{State, StateStorage};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

pub const KUBERNETES: &str = "Kubernetes";

pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("not a map: {other}"),
    }
}

pub fn resource(id: &str, attributes: Value) -> Resource {
    Resource::new(id, KUBERNETES).with_attributes(attrs(attributes))
}

pub fn index_of(resources: impl IntoIterator<Item = Resource>) -> ResourceIndex {
    resources
        .into_iter()
        .map(|r| (r.resource_key(), r))
        .collect()
}

/// Backend call as observed by [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// Apply started with the planned resource
    Apply(Resource),
    /// Delete started
    Delete(ResourceKey),
    /// Read started
    Read(ResourceKey),
    /// Any call finished
    Done(ResourceKey),
}

/// Backend that records every call and echoes the planned state back
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    failing: HashSet<ResourceKey>,
    gone: HashSet<ResourceKey>,
    cancel_on: Option<ResourceKey>,
    latency: Option<Duration>,
    assign_uid: bool,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call made for `key`
    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing.insert(ResourceKey::from(key));
        self
    }

    /// Report `key` as absent on Read
    pub fn gone(mut self, key: &str) -> Self {
        self.gone.insert(ResourceKey::from(key));
        self
    }

    /// Cancel the run while applying `key`
    pub fn cancel_on(mut self, key: &str) -> Self {
        self.cancel_on = Some(ResourceKey::from(key));
        self
    }

    /// Add a server-side `uid` attribute to every applied resource
    pub fn assigning_uid(mut self) -> Self {
        self.assign_uid = true;
        self
    }

    /// Sleep inside every call
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    /// Planned resources handed to Apply, in call order
    pub fn applied(&self) -> Vec<Resource> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                Call::Apply(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Keys of the calls started, in call order
    pub fn started(&self) -> Vec<ResourceKey> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                Call::Apply(r) => Some(r.resource_key()),
                Call::Delete(k) | Call::Read(k) => Some(k.clone()),
                Call::Done(_) => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.lock().push(call);
    }

    fn finish(&self, key: &ResourceKey) -> Result<(), Status> {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
        self.record(Call::Done(key.clone()));
        if self.failing.contains(key) {
            return Err(Status::backend(format!("backend rejected {key}")));
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        match self.calls.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Backend for RecordingBackend {
    fn apply(&self, request: ApplyRequest<'_>) -> Result<Resource, Status> {
        let key = request.planned.resource_key();
        self.record(Call::Apply(request.planned.clone()));
        if self.cancel_on.as_ref() == Some(&key) {
            request.cancel.cancel();
        }
        self.finish(&key)?;
        let mut applied = request.planned.clone();
        if self.assign_uid {
            applied
                .attributes
                .insert("uid".to_string(), Value::String(format!("uid-{key}")));
        }
        Ok(applied)
    }

    fn delete(&self, request: DeleteRequest<'_>) -> Result<(), Status> {
        let key = request.prior.resource_key();
        self.record(Call::Delete(key.clone()));
        self.finish(&key)
    }

    fn read(&self, request: ReadRequest<'_>) -> Result<Option<Resource>, Status> {
        let key = request.prior.resource_key();
        self.record(Call::Read(key.clone()));
        self.finish(&key)?;
        if self.gone.contains(&key) {
            return Ok(None);
        }
        let mut observed = request.prior.clone();
        observed
            .attributes
            .insert("observed".to_string(), Value::Bool(true));
        Ok(Some(observed))
    }
}

/// Storage whose persist always fails
#[derive(Debug)]
pub struct FailingStorage;

impl StateStorage for FailingStorage {
    fn persist(&self, _state: &State) -> anyhow::Result<()> {
        anyhow::bail!("disk full")
    }
}
