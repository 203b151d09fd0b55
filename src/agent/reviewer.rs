//! Review step: verify pending changes and route failures back to the coder.

use crate::agent::traits::VerificationService;
use crate::orchestration::{AgentExecutionResult, AgentStep, WorkflowContext, WorkflowState, WorkflowTrigger};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

const NO_DIAGNOSTICS: &str = "verification failed without diagnostics";

/// Hands the pending changes to a [`VerificationService`].
///
/// A failed verification is not an error: its diagnostics become one review
/// comment and the step reports `CodeRejected`.
pub struct ReviewerStep {
    verifier: Arc<dyn VerificationService>,
}

impl ReviewerStep {
    /// Reviewer judging staged changes with `verifier`
    pub fn new(verifier: Arc<dyn VerificationService>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl AgentStep for ReviewerStep {
    fn name(&self) -> &str {
        "reviewer"
    }

    fn description(&self) -> &str {
        "Builds and tests the pending changes"
    }

    fn target_state(&self) -> WorkflowState {
        WorkflowState::Reviewing
    }

    async fn execute(&self, context: &mut WorkflowContext) -> Result<AgentExecutionResult> {
        if context.memory().pending_changes().is_empty() {
            return Ok(AgentExecutionResult::error("no pending changes to review"));
        }

        let report = self
            .verifier
            .verify(context.memory().pending_changes())
            .await
            .context("verification service failed")?;

        if report.passed {
            return Ok(AgentExecutionResult::advance(
                WorkflowTrigger::CodeApproved,
                format!(
                    "{} file(s) passed verification",
                    context.memory().pending_changes().len()
                ),
            ));
        }

        let count = report.diagnostics.len();
        let comment = if report.diagnostics.is_empty() {
            NO_DIAGNOSTICS.to_string()
        } else {
            report.diagnostics.join("\n")
        };
        context.memory_mut().add_review_comment(comment);

        Ok(AgentExecutionResult::advance(
            WorkflowTrigger::CodeRejected,
            format!("verification failed with {} diagnostic(s)", count),
        ))
    }
}
