//! Implicit cross-resource references
//!
//! A string attribute of the form `$converge_path.<key>.<path>` stands for
//! the value found at `<path>` inside the attributes of resource `<key>`.
//! References are materialized into a resolved copy of the attribute tree
//! before the backend sees it, and they also imply a dependency edge from
//! the referenced resource to the referencing one.

use crate::error::Status;
use crate::resource::{Attributes, ResourceIndex, ResourceKey};
use serde_json::Value;

/// Marker that starts an implicit reference
pub const IMPLICIT_REF_PREFIX: &str = "$converge_path.";

/// Return the reference body if `value` is an implicit reference.
pub fn parse_implicit_ref(value: &str) -> Option<&str> {
    value.strip_prefix(IMPLICIT_REF_PREFIX)
}

/// Build the reference literal for `key` and `path`.
pub fn implicit_ref(key: &ResourceKey, path: &str) -> String {
    format!("{IMPLICIT_REF_PREFIX}{key}.{path}")
}

/// Produce a copy of `attributes` with every implicit reference replaced.
///
/// Strings are visited at any depth, inside maps and lists alike. The first
/// reference that cannot be resolved aborts the whole resolution.
pub fn resolve_implicit_refs(
    attributes: &Attributes,
    index: &ResourceIndex,
) -> Result<Attributes, Status> {
    attributes
        .iter()
        .map(|(key, value)| Ok((key.clone(), resolve_value(value, index)?)))
        .collect()
}

fn resolve_value(value: &Value, index: &ResourceIndex) -> Result<Value, Status> {
    match value {
        Value::String(s) => match parse_implicit_ref(s) {
            Some(reference) => resolve_ref(reference, index),
            None => Ok(value.clone()),
        },
        Value::Object(map) => Ok(Value::Object(resolve_implicit_refs(map, index)?)),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(item, index))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        _ => Ok(value.clone()),
    }
}

/// Resolve one reference body (`<key>.<dot.path>`) against `index`.
pub fn resolve_ref(reference: &str, index: &ResourceIndex) -> Result<Value, Status> {
    let mut segments = reference.split('.');
    let key = segments.next().unwrap_or_default();
    let not_found = || {
        Status::illegal_manifest(format!(
            "can't find specified value in resource:{key} by ref:{reference}"
        ))
    };

    let resource = index.get(key).ok_or_else(not_found)?;
    let first = segments.next().ok_or_else(not_found)?;
    let mut current = resource.attributes.get(first).ok_or_else(not_found)?;

    for segment in segments {
        current = descend(current, segment).ok_or_else(not_found)?;
    }

    match current {
        Value::Object(_) | Value::Array(_) => Err(not_found()),
        scalar => {
            log::trace!("resolved implicit reference {reference} to {scalar}");
            Ok(scalar.clone())
        }
    }
}

/// Maps are entered by key; lists only by a numeric segment.
fn descend<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Keys of every resource referenced anywhere in `attributes`, in order of
/// first appearance.
pub fn referenced_keys(attributes: &Attributes) -> Vec<ResourceKey> {
    let mut keys = Vec::new();
    for value in attributes.values() {
        collect_keys(value, &mut keys);
    }
    keys
}

fn collect_keys(value: &Value, keys: &mut Vec<ResourceKey>) {
    match value {
        Value::String(s) => {
            if let Some(key) = parse_implicit_ref(s).and_then(|r| r.split('.').next()) {
                let key = ResourceKey::new(key);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        Value::Object(map) => map.values().for_each(|v| collect_keys(v, keys)),
        Value::Array(items) => items.iter().for_each(|v| collect_keys(v, keys)),
        _ => {}
    }
}
