//! The contract every workflow step implements.

use crate::orchestration::{WorkflowContext, WorkflowState, WorkflowTrigger};
use anyhow::Result;
use async_trait::async_trait;

/// What a step reports back to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentExecutionResult {
    /// Fatal; the run ends in `Failed`.
    Error(String),
    /// Normal progress.
    Advance {
        /// Trigger for the transition table
        trigger: WorkflowTrigger,
        /// Human-readable summary of what the step did
        note: String,
    },
}

impl AgentExecutionResult {
    /// Fatal result
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    /// Progress result
    pub fn advance(trigger: WorkflowTrigger, note: impl Into<String>) -> Self {
        Self::Advance {
            trigger,
            note: note.into(),
        }
    }

    /// Trigger the state machine fires for this result
    pub fn trigger(&self) -> WorkflowTrigger {
        match self {
            Self::Error(_) => WorkflowTrigger::FatalError,
            Self::Advance { trigger, .. } => *trigger,
        }
    }
}

/// One agent's unit of work for one state.
///
/// Steps read and write [`WorkflowMemory`](crate::orchestration::WorkflowMemory)
/// through the context but cannot change the workflow state; they only
/// report a trigger. An `Err` return is reserved for unexpected faults such
/// as a collaborator crash and is treated like [`AgentExecutionResult::Error`].
///
/// # Example
///
/// ```ignore
/// use codeloop::prelude::*;
/// use async_trait::async_trait;
///
/// struct NoopInspector;
///
/// #[async_trait]
/// impl AgentStep for NoopInspector {
///     fn name(&self) -> &str { "noop" }
///     fn target_state(&self) -> WorkflowState { WorkflowState::Inspecting }
///
///     async fn execute(&self, _ctx: &mut WorkflowContext) -> anyhow::Result<AgentExecutionResult> {
///         Ok(AgentExecutionResult::advance(WorkflowTrigger::InspectComplete, "nothing to inspect"))
///     }
/// }
/// ```
#[async_trait]
pub trait AgentStep: Send + Sync {
    /// Capability name, e.g. "coder"
    fn name(&self) -> &str;

    /// Short description for registries and logs
    fn description(&self) -> &str {
        ""
    }

    /// State this step runs in
    fn target_state(&self) -> WorkflowState;

    /// Perform the step against the run's context
    async fn execute(&self, context: &mut WorkflowContext) -> Result<AgentExecutionResult>;
}
