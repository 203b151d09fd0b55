//! Capability registry: step factories keyed by capability id.

use crate::agent::traits::{StaticAnalysisService, VerificationService};
use crate::agent::{CoderStep, InspectorStep, ReviewerStep};
use crate::observability::InteractionSink;
use crate::orchestration::{AgentStep, RuntimeConfig, WorkflowError, WorkflowStateMachine};
use crate::provider::{GenerateConfig, ResilientInvoker};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared collaborators every step factory can draw from.
#[derive(Clone)]
pub struct StepDependencies {
    /// Model access for steps that prompt
    pub invoker: Arc<ResilientInvoker>,
    /// Static analysis backing the inspector
    pub analysis: Arc<dyn StaticAnalysisService>,
    /// Build and test service backing the reviewer
    pub verifier: Arc<dyn VerificationService>,
    /// Progress sink
    pub sink: Arc<dyn InteractionSink>,
    /// Scope handed to static analysis
    pub scope: String,
    /// Target language named in coding prompts
    pub language: Option<String>,
    /// Generation settings for model calls made by steps
    pub generate: GenerateConfig,
}

impl StepDependencies {
    /// Dependencies analysing the current directory
    pub fn new(
        invoker: Arc<ResilientInvoker>,
        analysis: Arc<dyn StaticAnalysisService>,
        verifier: Arc<dyn VerificationService>,
        sink: Arc<dyn InteractionSink>,
    ) -> Self {
        Self {
            invoker,
            analysis,
            verifier,
            sink,
            scope: ".".to_string(),
            language: None,
            generate: GenerateConfig::default(),
        }
    }

    /// Analyse `scope` instead of the current directory
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Name the target language in coding prompts
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Use `generate` for every model call made by steps
    pub fn with_generate_config(mut self, generate: GenerateConfig) -> Self {
        self.generate = generate;
        self
    }
}

type StepFactory = dyn Fn(&StepDependencies) -> Arc<dyn AgentStep> + Send + Sync;

struct Capability {
    description: String,
    factory: Box<StepFactory>,
}

/// Maps capability ids such as "coder" to factories producing steps.
///
/// Populate it once at startup, then assemble machines from ids.
///
/// # Example
///
/// ```ignore
/// let mut registry = CapabilityRegistry::with_defaults();
/// registry.register("csharp-coder", "C# coder", |deps| {
///     Arc::new(CoderStep::new(deps.invoker.clone()).with_language("C#"))
/// })?;
/// let machine = registry.build_machine(&["inspector", "csharp-coder", "reviewer"], &deps, RuntimeConfig::default())?;
/// ```
#[derive(Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Capability>,
}

impl CapabilityRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding `inspector`, `coder` and `reviewer`
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.insert("inspector", "Extracts codebase structure relevant to the goal", |deps| {
            Arc::new(
                InspectorStep::new(deps.analysis.clone(), deps.invoker.clone(), deps.scope.clone())
                    .with_config(deps.generate.clone()),
            )
        });
        registry.insert("coder", "Writes complete files for the goal", |deps| {
            let mut step = CoderStep::new(deps.invoker.clone()).with_config(deps.generate.clone());
            if let Some(language) = &deps.language {
                step = step.with_language(language);
            }
            Arc::new(step)
        });
        registry.insert("reviewer", "Builds and tests the pending changes", |deps| {
            Arc::new(ReviewerStep::new(deps.verifier.clone()))
        });
        registry
    }

    fn insert<F>(&mut self, id: &str, description: &str, factory: F)
    where
        F: Fn(&StepDependencies) -> Arc<dyn AgentStep> + Send + Sync + 'static,
    {
        self.capabilities.insert(
            id.to_string(),
            Capability {
                description: description.to_string(),
                factory: Box::new(factory),
            },
        );
    }

    /// Add a capability. Ids are unique.
    pub fn register<F>(&mut self, id: impl Into<String>, description: impl Into<String>, factory: F) -> Result<(), WorkflowError>
    where
        F: Fn(&StepDependencies) -> Arc<dyn AgentStep> + Send + Sync + 'static,
    {
        let id = id.into();
        if self.capabilities.contains_key(&id) {
            return Err(WorkflowError::DuplicateCapability(id));
        }
        let description = description.into();
        self.insert(&id, &description, factory);
        Ok(())
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: &str) -> bool {
        self.capabilities.contains_key(id)
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<&str> {
        self.capabilities.keys().map(String::as_str).collect()
    }

    /// Human-readable description of `id`
    pub fn description(&self, id: &str) -> Option<&str> {
        self.capabilities.get(id).map(|c| c.description.as_str())
    }

    /// Build the step registered under `id`
    pub fn create(&self, id: &str, deps: &StepDependencies) -> Result<Arc<dyn AgentStep>, WorkflowError> {
        let capability = self
            .capabilities
            .get(id)
            .ok_or_else(|| WorkflowError::UnknownCapability(id.to_string()))?;
        Ok((capability.factory)(deps))
    }

    /// Build one step per id and assemble them into a state machine.
    pub fn build_machine(
        &self,
        ids: &[&str],
        deps: &StepDependencies,
        config: RuntimeConfig,
    ) -> Result<WorkflowStateMachine, WorkflowError> {
        let steps = ids
            .iter()
            .map(|id| self.create(id, deps))
            .collect::<Result<Vec<_>, _>>()?;
        WorkflowStateMachine::new(steps, config, deps.sink.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::traits::{Fact, VerificationReport};
    use crate::observability::RecordingSink;
    use crate::orchestration::WorkflowState;
    use crate::provider::{ChatRequest, ChatTransport, TokenCallback, TransportResponse};
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Silent;

    #[async_trait]
    impl ChatTransport for Silent {
        async fn send(
            &self,
            _request: &ChatRequest,
            _on_token: Option<&TokenCallback>,
            _cancel: &CancellationToken,
        ) -> anyhow::Result<TransportResponse> {
            Ok(TransportResponse::text(""))
        }
    }

    #[async_trait]
    impl StaticAnalysisService for Silent {
        async fn analyze(&self, _scope: &str) -> anyhow::Result<Vec<Fact>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl VerificationService for Silent {
        async fn verify(
            &self,
            _changes: &BTreeMap<String, String>,
        ) -> anyhow::Result<VerificationReport> {
            Ok(VerificationReport::pass())
        }
    }

    fn deps() -> StepDependencies {
        let sink = Arc::new(RecordingSink::new());
        let invoker = Arc::new(ResilientInvoker::new(Arc::new(Silent), sink.clone()));
        StepDependencies::new(invoker, Arc::new(Silent), Arc::new(Silent), sink)
    }

    #[test]
    fn test_defaults() {
        let registry = CapabilityRegistry::with_defaults();
        assert_eq!(registry.ids(), vec!["coder", "inspector", "reviewer"]);
        assert!(registry.description("coder").is_some());

        let step = registry.create("reviewer", &deps()).unwrap();
        assert_eq!(step.target_state(), WorkflowState::Reviewing);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = CapabilityRegistry::with_defaults();
        let err = registry
            .register("coder", "another coder", |deps| Arc::new(CoderStep::new(deps.invoker.clone())))
            .unwrap_err();
        assert_eq!(err, WorkflowError::DuplicateCapability("coder".to_string()));

        registry
            .register("csharp-coder", "C# coder", |deps| {
                Arc::new(CoderStep::new(deps.invoker.clone()).with_language("C#"))
            })
            .unwrap();
        assert!(registry.contains("csharp-coder"));
    }

    #[test]
    fn test_build_machine() {
        let registry = CapabilityRegistry::with_defaults();
        let deps = deps();

        let machine = registry
            .build_machine(&["inspector", "coder", "reviewer"], &deps, RuntimeConfig::default())
            .unwrap();
        assert_eq!(machine.step_for(WorkflowState::Coding).unwrap().name(), "coder");

        let unknown = registry.build_machine(&["inspector", "tester"], &deps, RuntimeConfig::default());
        assert_eq!(
            unknown.err(),
            Some(WorkflowError::UnknownCapability("tester".to_string()))
        );

        let incomplete = registry.build_machine(&["inspector", "coder"], &deps, RuntimeConfig::default());
        assert_eq!(
            incomplete.err(),
            Some(WorkflowError::MissingStep(WorkflowState::Reviewing))
        );
    }
}
