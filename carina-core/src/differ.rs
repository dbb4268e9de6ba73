//! Differ - Compare desired state with current state
//!
//! Compares the attributes a caller declared with the attributes a Provider
//! read back, and reports what kind of change (if any) would reconcile them.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs in-place update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// A changed attribute cannot be updated in place -> delete and recreate
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }

    /// Attributes that differ, empty for Create and NoChange
    pub fn changed_attributes(&self) -> &[String] {
        match self {
            Diff::Update {
                changed_attributes, ..
            }
            | Diff::Replace {
                changed_attributes, ..
            } => changed_attributes,
            _ => &[],
        }
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    diff_with_schema(desired, current, &ResourceSchema::default())
}

/// Compare desired state with current state, consulting the schema for
/// read-only attributes (skipped) and attributes that force replacement
pub fn diff_with_schema(desired: &Resource, current: &State, schema: &ResourceSchema) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes, schema);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else if changed.iter().any(|name| schema.forces_replacement(name)) {
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

/// Find changed attributes between desired and current state
///
/// Only keys present in `desired` are compared. An empty desired string is
/// the same as leaving the attribute unset.
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
    schema: &ResourceSchema,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') || schema.is_read_only(key) {
            continue;
        }

        let unset = matches!(desired_value, Value::String(s) if s.is_empty());

        match current.get(key) {
            Some(current_value) if current_value == desired_value => {}
            None if unset => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    fn route_state(attrs: &[(&str, &str)]) -> State {
        let attributes = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::from(*v)))
            .collect();
        State::existing(ResourceId::new("route", "default"), attributes)
    }

    #[test]
    fn diff_create_when_not_exists() {
        let desired = Resource::new("route", "default");
        let current = State::not_found(ResourceId::new("route", "default"));

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Create(_)));
        assert!(result.is_change());
    }

    #[test]
    fn diff_no_change_when_same() {
        let desired = Resource::new("route", "default")
            .with_attribute("gateway_id", Value::from("igw-1"))
            .with_attribute("nat_gateway_id", Value::from(""));
        let current = route_state(&[("gateway_id", "igw-1"), ("state", "active")]);

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::NoChange(_)));
    }

    #[test]
    fn diff_update_when_different() {
        let desired =
            Resource::new("route", "default").with_attribute("nat_gateway_id", Value::from("nat-1"));
        let current = route_state(&[("gateway_id", "igw-1")]);

        let result = diff(&desired, &current);
        assert!(matches!(result, Diff::Update { .. }));
        assert_eq!(result.changed_attributes(), ["nat_gateway_id".to_string()]);
    }

    #[test]
    fn diff_replace_when_force_new_attribute_changes() {
        let schema = ResourceSchema::new("route")
            .attribute(
                AttributeSchema::new("destination_cidr_block", AttributeType::String).force_new(),
            )
            .attribute(AttributeSchema::new("origin", AttributeType::String).read_only());

        let desired = Resource::new("route", "default")
            .with_attribute("destination_cidr_block", Value::from("10.2.0.0/16"))
            .with_attribute("origin", Value::from("anything"));
        let current = route_state(&[
            ("destination_cidr_block", "10.3.0.0/16"),
            ("origin", "CreateRoute"),
        ]);

        let result = diff_with_schema(&desired, &current, &schema);
        assert!(matches!(result, Diff::Replace { .. }));
        assert_eq!(
            result.changed_attributes(),
            ["destination_cidr_block".to_string()]
        );
    }
}
