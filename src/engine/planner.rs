//! Execution planner - compare desired resources with the prior state

use converge::{
    Action, Attributes, FieldPath, Resource, ResourceIndex, prune_fields, resolve_implicit_refs,
};

/// A resource with the action planned for it
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub resource: Resource,
    pub action: Action,
}

impl PlannedChange {
    pub fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }
}

/// Plan an apply run.
///
/// Desired resources keep manifest order; resources only present in the
/// prior state are appended as deletes, sorted by key.
pub fn plan_apply(
    desired: &[Resource],
    prior: &ResourceIndex,
    ignore_fields: &[FieldPath],
) -> Vec<PlannedChange> {
    let mut changes: Vec<PlannedChange> = desired
        .iter()
        .map(|resource| {
            let action = match prior.get(&resource.resource_key()) {
                None => Action::Create,
                Some(existing) if differs(existing, resource, prior, ignore_fields) => {
                    Action::Update
                }
                Some(_) => Action::Unchanged,
            };
            PlannedChange::new(resource.clone(), action)
        })
        .collect();

    let mut removed: Vec<&Resource> = prior
        .values()
        .filter(|r| !desired.iter().any(|d| d.id == r.id))
        .collect();
    removed.sort_by(|a, b| a.id.cmp(&b.id));
    changes.extend(
        removed
            .into_iter()
            .map(|r| PlannedChange::new(r.clone(), Action::Delete)),
    );

    changes
}

/// Plan a destroy run: every resource in the prior state is deleted
pub fn plan_destroy(prior: &ResourceIndex) -> Vec<PlannedChange> {
    sorted(prior)
        .into_iter()
        .map(|r| PlannedChange::new(r.clone(), Action::Delete))
        .collect()
}

/// Plan a refresh run: every resource in the prior state is read back
pub fn plan_refresh(prior: &ResourceIndex) -> Vec<PlannedChange> {
    sorted(prior)
        .into_iter()
        .map(|r| PlannedChange::new(r.clone(), Action::Unchanged))
        .collect()
}

/// Whether any planned change touches live infrastructure
pub fn has_changes(changes: &[PlannedChange]) -> bool {
    changes.iter().any(|c| c.action != Action::Unchanged)
}

fn sorted(index: &ResourceIndex) -> Vec<&Resource> {
    let mut resources: Vec<_> = index.values().collect();
    resources.sort_by(|a, b| a.id.cmp(&b.id));
    resources
}

/// Compare after pruning ignore fields on both sides.
///
/// References in the desired attributes are resolved against the prior
/// state first; one that cannot be resolved yet counts as a difference.
fn differs(
    existing: &Resource,
    desired: &Resource,
    prior: &ResourceIndex,
    ignore_fields: &[FieldPath],
) -> bool {
    if existing.resource_type != desired.resource_type
        || existing.depends_on != desired.depends_on
    {
        return true;
    }

    let Ok(wanted) = resolve_implicit_refs(&desired.attributes, prior) else {
        return true;
    };
    pruned(&existing.attributes, ignore_fields) != pruned(&wanted, ignore_fields)
}

fn pruned(attributes: &Attributes, ignore_fields: &[FieldPath]) -> Attributes {
    let mut attributes = attributes.clone();
    prune_fields(&mut attributes, ignore_fields);
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn local(id: &str, attributes: Value) -> Resource {
        let Value::Object(map) = attributes else {
            panic!("not a map");
        };
        Resource::new(id, "Local").with_attributes(map)
    }

    fn index(resources: &[Resource]) -> ResourceIndex {
        resources
            .iter()
            .map(|r| (r.resource_key(), r.clone()))
            .collect()
    }

    fn actions(changes: &[PlannedChange]) -> Vec<(&str, Action)> {
        changes
            .iter()
            .map(|c| (c.resource.id.as_str(), c.action))
            .collect()
    }

    #[test]
    fn test_plan_apply_actions() {
        let prior = index(&[
            local("jack", json!({"a": 1})),
            local("pony", json!({"c": "d"})),
            local("gone", json!({})),
        ]);
        let desired = [
            local("jack", json!({"a": 2})),
            local("pony", json!({"c": "d"})),
            local("eric", json!({})),
        ];

        let changes = plan_apply(&desired, &prior, &[]);

        assert_eq!(
            actions(&changes),
            [
                ("jack", Action::Update),
                ("pony", Action::Unchanged),
                ("eric", Action::Create),
                ("gone", Action::Delete),
            ]
        );
        assert!(has_changes(&changes));
    }

    #[test]
    fn test_ignore_fields_hide_differences() {
        let prior = index(&[local("svc", json!({"port": 80, "status": {"ip": "10.0.0.1"}}))]);
        let desired = [local("svc", json!({"port": 80}))];

        let changes = plan_apply(&desired, &prior, &[FieldPath::parse("status")]);

        assert_eq!(actions(&changes), [("svc", Action::Unchanged)]);
        assert!(!has_changes(&changes));
    }

    #[test]
    fn test_resolved_reference_compares_equal() {
        let prior = index(&[
            local("jack", json!({"a": {"b": "c"}})),
            local("eric", json!({"a": "c"})),
        ]);
        let desired = [
            local("jack", json!({"a": {"b": "c"}})),
            local("eric", json!({"a": "$converge_path.jack.a.b"})),
        ];

        let changes = plan_apply(&desired, &prior, &[]);

        assert_eq!(
            actions(&changes),
            [("jack", Action::Unchanged), ("eric", Action::Unchanged)]
        );
    }

    #[test]
    fn test_new_dependency_is_an_update() {
        let prior = index(&[local("jack", json!({})), local("pony", json!({}))]);
        let desired = [
            local("jack", json!({})),
            local("pony", json!({})).with_dependency("jack"),
        ];

        let changes = plan_apply(&desired, &prior, &[]);
        assert_eq!(changes[1].action, Action::Update);
    }

    #[test]
    fn test_plan_destroy_and_refresh() {
        let prior = index(&[local("pony", json!({})), local("jack", json!({}))]);

        assert_eq!(
            actions(&plan_destroy(&prior)),
            [("jack", Action::Delete), ("pony", Action::Delete)]
        );
        assert_eq!(
            actions(&plan_refresh(&prior)),
            [("jack", Action::Unchanged), ("pony", Action::Unchanged)]
        );
    }
}
