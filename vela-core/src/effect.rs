//! Effect - A single change to be made to real infrastructure
//!
//! Effects are plain values; nothing happens until an Interpreter executes
//! them against a Provider.

use crate::resource::{RemoteState, Resource, ResourceId};

/// A change to be applied to infrastructure
#[derive(Debug, Clone)]
pub enum Effect {
    /// Create a resource that does not exist yet
    Create(Resource),
    /// Update a resource in place
    Update {
        id: ResourceId,
        from: RemoteState,
        to: Resource,
    },
    /// Destroy and recreate a resource whose changed attributes do not
    /// support in-place updates (e.g., launch template inputs)
    Replace {
        id: ResourceId,
        from: RemoteState,
        to: Resource,
    },
    /// Delete a resource
    Delete {
        id: ResourceId,
        identifier: Option<String>,
    },
}

impl Effect {
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(r) => &r.id,
            Effect::Update { id, .. } => id,
            Effect::Replace { id, .. } => id,
            Effect::Delete { id, .. } => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_id_of_each_variant() {
        let id = ResourceId::new("secret", "myapp-db");

        let create = Effect::Create(Resource::new("secret", "myapp-db"));
        assert_eq!(create.resource_id(), &id);

        let delete = Effect::Delete {
            id: id.clone(),
            identifier: Some("arn:aws:secretsmanager:...".to_string()),
        };
        assert_eq!(delete.resource_id(), &id);
    }
}
