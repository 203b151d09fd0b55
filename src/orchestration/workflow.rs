//! Workflow states, triggers and the fixed transition table.

use serde::{Deserialize, Serialize};

/// Phase of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Gathering facts about the codebase
    Inspecting,
    /// Producing file contents
    Coding,
    /// Verifying the pending changes
    Reviewing,
    /// Changes approved
    Done,
    /// Run aborted
    Failed,
}

impl WorkflowState {
    /// State every run starts in
    pub const INITIAL: WorkflowState = WorkflowState::Inspecting;

    /// Get human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            Self::Inspecting => "inspecting",
            Self::Coding => "coding",
            Self::Reviewing => "reviewing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Event a step emits to move the run forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowTrigger {
    /// Inspection produced its artifacts
    InspectComplete,
    /// Pending changes were written
    CodeGenerated,
    /// Verification passed
    CodeApproved,
    /// Verification failed; review comments were appended
    CodeRejected,
    /// Unrecoverable step failure
    FatalError,
}

impl WorkflowTrigger {
    /// Get human-readable name for the trigger
    pub fn name(&self) -> &'static str {
        match self {
            Self::InspectComplete => "inspect_complete",
            Self::CodeGenerated => "code_generated",
            Self::CodeApproved => "code_approved",
            Self::CodeRejected => "code_rejected",
            Self::FatalError => "fatal_error",
        }
    }
}

impl std::fmt::Display for WorkflowTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// State-specific rows of the transition table. `FatalError` leads to
/// [`WorkflowState::Failed`] from every state and is not listed.
pub const TRANSITIONS: &[(WorkflowState, WorkflowTrigger, WorkflowState)] = &[
    (WorkflowState::Inspecting, WorkflowTrigger::InspectComplete, WorkflowState::Coding),
    (WorkflowState::Coding, WorkflowTrigger::CodeGenerated, WorkflowState::Reviewing),
    (WorkflowState::Reviewing, WorkflowTrigger::CodeApproved, WorkflowState::Done),
    (WorkflowState::Reviewing, WorkflowTrigger::CodeRejected, WorkflowState::Coding),
];

/// Next state for `trigger` fired in `state`, or None when the table has no such edge.
pub fn transition(state: WorkflowState, trigger: WorkflowTrigger) -> Option<WorkflowState> {
    if trigger == WorkflowTrigger::FatalError {
        return Some(WorkflowState::Failed);
    }
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == state && *on == trigger)
        .map(|(_, _, to)| *to)
}
