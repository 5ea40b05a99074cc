//! Resource model shared by the graph, the nodes and the backends
//!
//! A [`Resource`] is the planned (or observed) description of one
//! infrastructure object. Its attribute tree mirrors a parsed structured
//! config document, so it is carried as a [`serde_json::Map`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// Nested tree of maps, ordered lists and scalars
pub type Attributes = Map<String, Value>;

/// Resources of one run indexed by their key
pub type ResourceIndex = HashMap<ResourceKey, Resource>;

/// Backend type tag of a resource (e.g. "Kubernetes", "Local")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Stable identity of a resource within a run
///
/// The key is the resource id, unique across every resource type of a run.
/// It is also the first segment of an implicit reference, which is why it
/// must not contain a `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl std::borrow::Borrow<str> for ResourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One declared infrastructure object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Identifier assigned by the planner, unique within a run
    pub id: String,
    /// Backend type tag used for dispatch
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    /// Attribute tree handed to the backend
    #[serde(default)]
    pub attributes: Attributes,
    /// Keys of resources that must complete before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ResourceKey>,
}

impl Resource {
    pub fn new(id: impl Into<String>, resource_type: impl Into<ResourceType>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            attributes: Attributes::new(),
            depends_on: Vec::new(),
        }
    }

    /// Replace the attribute tree
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    /// Append a declared dependency
    pub fn with_dependency(mut self, key: impl Into<ResourceKey>) -> Self {
        self.depends_on.push(key.into());
        self
    }

    pub fn resource_key(&self) -> ResourceKey {
        ResourceKey::new(self.id.clone())
    }
}

/// Change planned for a resource before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Create,
    Update,
    Delete,
    Unchanged,
}

impl Action {
    /// Whether the node must resolve references and call backend Apply
    pub fn is_apply(&self) -> bool {
        matches!(self, Self::Create | Self::Update)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Unchanged => "unchanged",
        };
        f.write_str(name)
    }
}
