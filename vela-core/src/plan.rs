//! Plan - Ordered collection of Effects
//!
//! A Plan is an ordered list of Effects to be executed. No side effects
//! occur until the Plan is applied.

use crate::effect::Effect;

/// Plan containing Effects to be executed in graph order
#[derive(Debug, Clone, Default)]
pub struct Plan {
    effects: Vec<Effect>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Generate a summary of the Plan for display
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for effect in &self.effects {
            match effect {
                Effect::Create(_) => summary.create += 1,
                Effect::Update { .. } => summary.update += 1,
                Effect::Replace { .. } => summary.replace += 1,
                Effect::Delete { .. } => summary.delete += 1,
            }
        }
        summary
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan: {} to create, {} to update, {} to replace, {} to delete",
            self.create, self.update, self.replace, self.delete
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{RemoteState, Resource, ResourceId};

    #[test]
    fn empty_plan() {
        let plan = Plan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.summary(), PlanSummary::default());
    }

    #[test]
    fn plan_summary_counts_every_kind() {
        let id = ResourceId::new("launch_template", "myapp");

        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("secret", "a")));
        plan.add(Effect::Create(Resource::new("secret", "b")));
        plan.add(Effect::Replace {
            id: id.clone(),
            from: RemoteState::not_found(id.clone()),
            to: Resource::new("launch_template", "myapp"),
        });
        plan.add(Effect::Delete {
            id: ResourceId::new("secret", "c"),
            identifier: None,
        });

        let summary = plan.summary();
        assert_eq!(summary.create, 2);
        assert_eq!(summary.replace, 1);
        assert_eq!(summary.delete, 1);
        assert_eq!(
            summary.to_string(),
            "Plan: 2 to create, 0 to update, 1 to replace, 1 to delete"
        );
    }
}
