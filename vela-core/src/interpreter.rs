//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order, collecting
//! the results. This is where side effects actually occur. Execution is
//! fail-fast: once an Effect fails, later Effects (the dependents in graph
//! order) are not attempted. Already-applied Effects are left in place, so a
//! partial apply is re-appliable.

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resource::RemoteState;

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Create succeeded
    Created { state: RemoteState },
    /// Update succeeded
    Updated { state: RemoteState },
    /// Replace succeeded (old resource destroyed, new one created)
    Replaced { state: RemoteState },
    /// Delete succeeded
    Deleted,
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

impl EffectOutcome {
    /// The resulting state, for outcomes that produce one
    pub fn state(&self) -> Option<&RemoteState> {
        match self {
            EffectOutcome::Created { state }
            | EffectOutcome::Updated { state }
            | EffectOutcome::Replaced { state } => Some(state),
            _ => None,
        }
    }
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<Result<EffectOutcome, ProviderError>>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue past a failed Effect instead of stopping
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    pub async fn apply(&self, plan: &Plan) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let result = self.execute_effect(effect).await;

            match &result {
                Ok(_) => success_count += 1,
                Err(_) => {
                    failure_count += 1;
                    if !self.config.continue_on_error {
                        outcomes.push(result);
                        break;
                    }
                }
            }

            outcomes.push(result);
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Execute a single Effect
    async fn execute_effect(&self, effect: &Effect) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Create(resource) => {
                let state = self.provider.create(resource).await?;
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update { id, from, to } => {
                let identifier = from.identifier.as_deref().unwrap_or("");
                let state = self.provider.update(id, identifier, from, to).await?;
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace { id, from, to } => {
                if let Some(identifier) = from.identifier.as_deref() {
                    self.provider.delete(id, identifier).await?;
                }
                let state = self.provider.create(to).await?;
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete { id, identifier } => {
                self.provider
                    .delete(id, identifier.as_deref().unwrap_or(""))
                    .await?;
                Ok(EffectOutcome::Deleted)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::provider::BoxFuture;
    use crate::resource::{Resource, ResourceId};

    /// Fails every create for resources named "bad-*"; counts create calls.
    struct TestProvider {
        creates: AtomicUsize,
    }

    impl TestProvider {
        fn new() -> Self {
            Self {
                creates: AtomicUsize::new(0),
            }
        }
    }

    impl Provider for TestProvider {
        fn name(&self) -> &'static str {
            "test"
        }

        fn read(
            &self,
            resource: &Resource,
            _identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<RemoteState>> {
            let id = resource.id.clone();
            Box::pin(async move { Ok(RemoteState::not_found(id)) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<RemoteState>> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            let resource = resource.clone();
            Box::pin(async move {
                if resource.id.name.starts_with("bad-") {
                    Err(ProviderError::new("creation failed").for_resource(resource.id))
                } else {
                    Ok(
                        RemoteState::existing(resource.id, resource.attributes)
                            .with_identifier("test-id"),
                    )
                }
            })
        }

        fn update(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _from: &RemoteState,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<RemoteState>> {
            let id = id.clone();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(RemoteState::existing(id, attrs)) })
        }

        fn delete(&self, _id: &ResourceId, _identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn apply_empty_plan() {
        let interpreter = Interpreter::new(TestProvider::new());
        let plan = Plan::new();
        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 0);
    }

    #[tokio::test]
    async fn apply_create_effect() {
        let interpreter = Interpreter::new(TestProvider::new());
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("secret", "example")));

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert_eq!(result.success_count, 1);
    }

    #[tokio::test]
    async fn failure_stops_execution() {
        let provider = TestProvider::new();
        let interpreter = Interpreter::new(provider);

        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("secret", "ok")));
        plan.add(Effect::Create(Resource::new("secret", "bad-one")));
        plan.add(Effect::Create(Resource::new("secret", "never-reached")));

        let result = interpreter.apply(&plan).await;

        assert!(!result.is_success());
        assert_eq!(result.success_count, 1);
        assert_eq!(result.failure_count, 1);
        // The third effect was never attempted
        assert_eq!(result.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn replace_deletes_then_creates() {
        let provider = TestProvider::new();
        let interpreter = Interpreter::new(provider);

        let id = ResourceId::new("launch_template", "myapp");
        let mut plan = Plan::new();
        plan.add(Effect::Replace {
            id: id.clone(),
            from: RemoteState::existing(id.clone(), Default::default())
                .with_identifier("lt-old"),
            to: Resource::new("launch_template", "myapp"),
        });

        let result = interpreter.apply(&plan).await;
        assert!(result.is_success());
        assert!(matches!(
            result.outcomes[0],
            Ok(EffectOutcome::Replaced { .. })
        ));
    }

    #[tokio::test]
    async fn dry_run_skips_effects() {
        let config = InterpreterConfig {
            dry_run: true,
            ..Default::default()
        };
        let interpreter = Interpreter::new(TestProvider::new()).with_config(config);
        let mut plan = Plan::new();
        plan.add(Effect::Create(Resource::new("secret", "example")));

        let result = interpreter.apply(&plan).await;

        assert!(result.is_success());
        assert!(matches!(
            result.outcomes[0],
            Ok(EffectOutcome::Skipped { .. })
        ));
    }
}
