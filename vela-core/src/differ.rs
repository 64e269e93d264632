//! Differ - Compare desired state with observed state to generate a Plan
//!
//! Compares the declared desired state with the current state read from the
//! Provider, and generates the list of required Effects (Plan).

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{RemoteState, Resource, ResourceId, Value};

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs in-place update
    Update {
        id: ResourceId,
        from: RemoteState,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists but a changed attribute is immutable -> needs
    /// destroy+recreate
    Replace {
        id: ResourceId,
        from: RemoteState,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
    /// Resource exists but is not in desired state -> needs deletion
    Delete(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with observed state to compute a Diff
///
/// Data sources never produce mutating diffs: they are looked up, not
/// converged.
pub fn diff(desired: &Resource, current: &RemoteState) -> Diff {
    if desired.is_data_source() {
        return Diff::NoChange(desired.id.clone());
    }

    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        return Diff::NoChange(desired.id.clone());
    }

    let forces_replace = changed.iter().any(|a| desired.replace_on.contains(a));

    if forces_replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and observed state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        // Unresolved references cannot be compared against observed values;
        // they are resolved before apply, and the referenced attribute is
        // stable once the target exists
        if matches!(desired_value, Value::Ref(_, _)) && current.contains_key(key) {
            continue;
        }

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Compute Diffs for resources in graph order and generate a Plan
///
/// Re-applying an unchanged declaration yields an empty plan.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, RemoteState>,
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| RemoteState::not_found(resource.id.clone()));

        match diff(resource, &current) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update { id, from, to, .. } => plan.add(Effect::Update { id, from, to }),
            Diff::Replace { id, from, to, .. } => plan.add(Effect::Replace { id, from, to }),
            Diff::NoChange(_) => {}
            Diff::Delete(id) => {
                let identifier = current_states
                    .get(&id)
                    .and_then(|s| s.identifier.clone());
                plan.add(Effect::Delete { id, identifier });
            }
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("security_group", "myapp-edge");
        let current = RemoteState::not_found(ResourceId::new("security_group", "myapp-edge"));

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Create(_)));
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("target_group", "myapp")
            .with_attribute("health_check_path", Value::string("/license.txt"));

        let mut attrs = HashMap::new();
        attrs.insert(
            "health_check_path".to_string(),
            Value::string("/license.txt"),
        );
        let current = RemoteState::existing(ResourceId::new("target_group", "myapp"), attrs);

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn diff_update_when_different() {
        let desired = Resource::new("target_group", "myapp")
            .with_attribute("health_check_path", Value::string("/healthz"));

        let mut attrs = HashMap::new();
        attrs.insert(
            "health_check_path".to_string(),
            Value::string("/license.txt"),
        );
        let current = RemoteState::existing(ResourceId::new("target_group", "myapp"), attrs);

        match diff(&desired, &current) {
            Diff::Update {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["health_check_path"]),
            other => panic!("Expected Update, got {:?}", other),
        }
    }

    #[test]
    fn diff_replace_when_immutable_attribute_changes() {
        let desired = Resource::new("launch_template", "myapp")
            .with_attribute("image_id", Value::string("ami-222"))
            .with_replace_on("image_id");

        let mut attrs = HashMap::new();
        attrs.insert("image_id".to_string(), Value::string("ami-111"));
        let current = RemoteState::existing(ResourceId::new("launch_template", "myapp"), attrs);

        match diff(&desired, &current) {
            Diff::Replace {
                changed_attributes, ..
            } => assert_eq!(changed_attributes, vec!["image_id"]),
            other => panic!("Expected Replace, got {:?}", other),
        }
    }

    #[test]
    fn diff_data_source_never_mutates() {
        let desired = Resource::new("vpc", "default").with_read_only(true);
        let current = RemoteState::not_found(ResourceId::new("vpc", "default"));

        assert!(matches!(diff(&desired, &current), Diff::NoChange(_)));
    }

    #[test]
    fn diff_skips_unresolved_references() {
        let desired = Resource::new("security_group", "myapp-app").with_attribute(
            "source_security_group_id",
            Value::reference("edge_sg", "id"),
        );

        let mut attrs = HashMap::new();
        attrs.insert(
            "source_security_group_id".to_string(),
            Value::string("sg-0a1b2c"),
        );
        let current = RemoteState::existing(ResourceId::new("security_group", "myapp-app"), attrs);

        assert!(matches!(diff(&desired, &current), Diff::NoChange(_)));
    }

    #[test]
    fn create_plan_is_empty_for_unchanged_resources() {
        let resources = vec![
            Resource::new("secret", "myapp-db")
                .with_attribute("description", Value::string("database credentials")),
        ];

        let mut current_states = HashMap::new();
        let mut attrs = HashMap::new();
        attrs.insert(
            "description".to_string(),
            Value::string("database credentials"),
        );
        current_states.insert(
            ResourceId::new("secret", "myapp-db"),
            RemoteState::existing(ResourceId::new("secret", "myapp-db"), attrs),
        );

        let plan = create_plan(&resources, &current_states);
        assert!(plan.is_empty());
    }

    #[test]
    fn create_plan_mixes_create_and_update() {
        let resources = vec![
            Resource::new("secret", "new-secret"),
            Resource::new("target_group", "existing")
                .with_attribute("health_check_interval", Value::Int(30)),
        ];

        let mut current_states = HashMap::new();
        let mut attrs = HashMap::new();
        attrs.insert("health_check_interval".to_string(), Value::Int(10));
        current_states.insert(
            ResourceId::new("target_group", "existing"),
            RemoteState::existing(ResourceId::new("target_group", "existing"), attrs),
        );

        let plan = create_plan(&resources, &current_states);

        assert_eq!(plan.effects().len(), 2);
        assert!(matches!(plan.effects()[0], Effect::Create(_)));
        assert!(matches!(plan.effects()[1], Effect::Update { .. }));
    }
}
