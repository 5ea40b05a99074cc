//! Best-effort removal of nested fields from attribute trees
//!
//! Ignore fields (server-assigned or volatile values) are stripped before a
//! resource reaches its backend. Removal never fails: missing keys and
//! unexpected shapes simply mean there is nothing to remove on that branch.

use crate::resource::Attributes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Dot-separated path into an attribute tree (e.g. `spec.ports.targetPort`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dot path, dropping empty segments
    pub fn parse(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl From<String> for FieldPath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.segments.join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Remove the field at `path` inside `tree`.
///
/// Maps consume one path segment per level; the last segment is deleted from
/// its map, which is left in place even when it becomes empty. Lists consume
/// nothing: the whole remaining path is applied to every element, so a single
/// call strips a field from each entry of a repeated structure.
pub fn remove_nested_field<S: AsRef<str>>(tree: &mut Value, path: &[S]) {
    match tree {
        Value::Object(map) => remove_from_map(map, path),
        Value::Array(items) => {
            if path.is_empty() {
                return;
            }
            for item in items {
                remove_nested_field(item, path);
            }
        }
        _ => {}
    }
}

/// Same as [`remove_nested_field`] with a top-level map as the root.
pub fn remove_from_map<S: AsRef<str>>(map: &mut Attributes, path: &[S]) {
    let Some((head, rest)) = path.split_first() else {
        return;
    };

    if rest.is_empty() {
        map.remove(head.as_ref());
    } else if let Some(child) = map.get_mut(head.as_ref()) {
        remove_nested_field(child, rest);
    }
}

/// Strip every ignore path from an attribute tree.
pub fn prune_fields(attributes: &mut Attributes, paths: &[FieldPath]) {
    for path in paths {
        remove_from_map(attributes, path.segments());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn len(value: &Value) -> usize {
        match value {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => panic!("not a container: {value}"),
        }
    }

    #[test]
    fn test_remove_nested_field_through_lists() {
        let mut obj = json!({
            "a": {
                "b": 1,
                "c": [
                    {"d": "d1", "e": [{"f": "f1", "g": "g1"}]},
                    {"d": "d2", "e": [{"f": "f2", "g": "g2"}]}
                ]
            }
        });

        remove_nested_field(&mut obj, &["a", "c", "e", "f"]);
        assert_eq!(len(&obj["a"]["c"][0]["e"][0]), 1);
        assert_eq!(len(&obj["a"]["c"][1]["e"][0]), 1);

        remove_nested_field(&mut obj, &["a", "c", "e", "g"]);
        assert_eq!(obj["a"]["c"][0]["e"][0], json!({}));
        assert_eq!(obj["a"]["c"][1]["e"][0], json!({}));

        remove_nested_field(&mut obj, &["a", "c", "e"]);
        assert_eq!(len(&obj["a"]["c"][0]), 1);
        assert_eq!(len(&obj["a"]["c"][1]), 1);

        remove_nested_field(&mut obj, &["a", "c", "d"]);
        assert_eq!(len(&obj["a"]["c"][0]), 0);
        assert_eq!(len(&obj["a"]["c"][1]), 0);

        remove_nested_field(&mut obj, &["a", "c"]);
        assert_eq!(len(&obj["a"]), 1);

        remove_nested_field(&mut obj, &["a", "b"]);
        assert_eq!(len(&obj["a"]), 0);

        remove_nested_field(&mut obj, &["a"]);
        assert_eq!(obj, json!({}));
    }

    #[test]
    fn test_remove_spec_ports_target_port() {
        let mut obj = json!({
            "spec": {
                "clusterIP": "172.16.128.40",
                "ports": [{"port": 80, "protocol": "TCP", "targetPort": 80}]
            }
        });

        remove_nested_field(&mut obj, &["spec", "ports", "targetPort"]);

        assert_eq!(
            obj["spec"]["ports"][0],
            json!({"port": 80, "protocol": "TCP"})
        );
        assert_eq!(obj["spec"]["clusterIP"], json!("172.16.128.40"));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut obj = json!({"metadata": {"name": "web", "uid": "1234"}});

        remove_nested_field(&mut obj, &["metadata", "uid"]);
        let once = obj.clone();
        remove_nested_field(&mut obj, &["metadata", "uid"]);

        assert_eq!(obj, once);
        assert_eq!(obj, json!({"metadata": {"name": "web"}}));
    }

    #[test]
    fn test_broadcast_only_touches_list_elements() {
        let mut obj = json!({
            "items": [{"f": 1, "k": 1}, {"f": 2}, {"k": 3}],
            "f": "top-level stays"
        });

        remove_nested_field(&mut obj, &["items", "f"]);

        assert_eq!(obj["items"], json!([{"k": 1}, {}, {"k": 3}]));
        assert_eq!(obj["f"], json!("top-level stays"));
    }

    #[test]
    fn test_malformed_trees_are_ignored() {
        let mut obj = json!({"a": "scalar", "b": [1, "two", null], "c": {"d": 4}});
        let before = obj.clone();

        remove_nested_field(&mut obj, &["a", "x"]);
        remove_nested_field(&mut obj, &["b", "x"]);
        remove_nested_field(&mut obj, &["c", "d", "e"]);
        remove_nested_field(&mut obj, &["missing", "x"]);
        remove_nested_field::<&str>(&mut obj, &[]);

        assert_eq!(obj, before);
    }

    #[test]
    fn test_prune_fields_with_dot_paths() {
        let Value::Object(mut attributes) = json!({
            "spec": {"ports": [{"port": 80, "targetPort": 8080}]},
            "status": {"phase": "Running"}
        }) else {
            unreachable!()
        };

        prune_fields(
            &mut attributes,
            &[
                FieldPath::parse("spec.ports.targetPort"),
                FieldPath::parse("status"),
                FieldPath::parse("not_exist_field"),
            ],
        );

        assert_eq!(
            Value::Object(attributes),
            json!({"spec": {"ports": [{"port": 80}]}})
        );
    }

    #[test]
    fn test_field_path_parse() {
        let path = FieldPath::parse("spec..ports.targetPort");
        assert_eq!(path.segments(), ["spec", "ports", "targetPort"]);
        assert_eq!(path.to_string(), "spec.ports.targetPort");
        assert!(FieldPath::parse("").is_empty());
    }
}
