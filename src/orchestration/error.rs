//! Error and outcome types for workflow runs.

use crate::orchestration::{WorkflowState, WorkflowTrigger};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while assembling a state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// A non-terminal state has no step to run it.
    #[error("no step registered for state '{0}'")]
    MissingStep(WorkflowState),

    /// Two steps target the same state.
    #[error("more than one step registered for state '{0}'")]
    DuplicateStep(WorkflowState),

    /// A step targets a terminal state.
    #[error("step '{step}' targets terminal state '{state}'")]
    TerminalStep {
        /// Step name
        step: String,
        /// Terminal state it targets
        state: WorkflowState,
    },

    /// Capability id unknown to the registry.
    #[error("unknown capability '{0}'")]
    UnknownCapability(String),

    /// Capability id registered twice.
    #[error("capability '{0}' is already registered")]
    DuplicateCapability(String),

    /// Runtime limits out of range.
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(String),
}

/// Why a run ended in [`WorkflowState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum FailureReason {
    /// A step reported an error or its collaborator crashed.
    #[error("step '{step}' failed: {message}")]
    StepError {
        /// Step name
        step: String,
        /// Reported message
        message: String,
    },

    /// The coding and reviewing loop did not converge in time.
    #[error("iteration budget of {limit} exhausted")]
    IterationBudgetExhausted {
        /// Configured cap
        limit: u32,
    },

    /// A step emitted a trigger the table has no edge for.
    #[error("trigger '{trigger}' is not valid in state '{state}'")]
    InvalidTransition {
        /// State the trigger fired in
        state: WorkflowState,
        /// Offending trigger
        trigger: WorkflowTrigger,
    },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Reached [`WorkflowState::Done`]; pending changes are ready to apply.
    Completed,
    /// Reached [`WorkflowState::Failed`].
    Failed(FailureReason),
    /// The caller cancelled before a terminal state was reached.
    Cancelled,
}

impl RunOutcome {
    /// Whether the run reached `Done`
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Failure reason, if the run failed
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
