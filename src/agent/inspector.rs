//! Inspection step: collect codebase facts and summarize them for the coder.

use crate::agent::traits::{Fact, StaticAnalysisService};
use crate::orchestration::{AgentExecutionResult, AgentStep, WorkflowContext, WorkflowState, WorkflowTrigger};
use crate::provider::{ChatRequest, GenerateConfig, ResilientInvoker};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Artifact holding the raw fact list, one `- fact` per line
pub const FACTS_ARTIFACT: &str = "codebase_facts";
/// Artifact holding the model's design summary
pub const SUMMARY_ARTIFACT: &str = "design_summary";

const SYSTEM_PROMPT: &str = "You are a software architect. Summarize the facts you are given into \
a short design brief a developer can implement the task from. Name the types, interfaces and \
relationships that matter. Do not write code.";

/// Runs static analysis on the configured scope and asks the model to
/// summarize the facts against the task goal.
pub struct InspectorStep {
    analysis: Arc<dyn StaticAnalysisService>,
    invoker: Arc<ResilientInvoker>,
    scope: String,
    config: GenerateConfig,
}

impl InspectorStep {
    /// Inspector analysing `scope` and summarising it with the model
    pub fn new(
        analysis: Arc<dyn StaticAnalysisService>,
        invoker: Arc<ResilientInvoker>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            analysis,
            invoker,
            scope: scope.into(),
            config: GenerateConfig::default(),
        }
    }

    /// Generation settings for the summary call
    pub fn with_config(mut self, config: GenerateConfig) -> Self {
        self.config = config;
        self
    }

    fn summary_prompt(goal: &str, facts: &str) -> String {
        format!(
            "Task: {}\n\n## Codebase facts\n{}\n\nWrite the design brief.",
            goal,
            if facts.is_empty() { "(none found)" } else { facts }
        )
    }
}

fn format_facts(facts: &[Fact]) -> String {
    facts
        .iter()
        .map(|fact| format!("- {}", fact))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl AgentStep for InspectorStep {
    fn name(&self) -> &str {
        "inspector"
    }

    fn description(&self) -> &str {
        "Extracts codebase structure relevant to the goal"
    }

    fn target_state(&self) -> WorkflowState {
        WorkflowState::Inspecting
    }

    async fn execute(&self, context: &mut WorkflowContext) -> Result<AgentExecutionResult> {
        let facts = self
            .analysis
            .analyze(&self.scope)
            .await
            .with_context(|| format!("static analysis of '{}' failed", self.scope))?;
        let fact_list = format_facts(&facts);
        context.memory_mut().set_artifact(FACTS_ARTIFACT, fact_list.clone());

        let request = ChatRequest::prompt(
            Self::summary_prompt(context.task_goal(), &fact_list),
            Some(SYSTEM_PROMPT),
        )
        .with_config(self.config.clone());
        let cancel = context.cancellation_token().clone();
        let metered = self.invoker.invoke_metered(&request, None, &cancel).await;
        context.record_usage(metered.usage);
        let summary = match metered.outcome {
            Ok(text) => text,
            Err(e) => return Ok(AgentExecutionResult::error(format!("design summary failed: {}", e))),
        };

        context.memory_mut().set_artifact(SUMMARY_ARTIFACT, summary);

        Ok(AgentExecutionResult::advance(
            WorkflowTrigger::InspectComplete,
            format!("collected {} fact(s) from '{}'", facts.len(), self.scope),
        ))
    }
}
