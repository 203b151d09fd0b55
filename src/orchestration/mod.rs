//! Workflow orchestration - the inspect/code/review state machine
//!
//! This module provides the pieces a multi-agent run is made of:
//! - [`WorkflowState`] / [`WorkflowTrigger`] and the fixed [`TRANSITIONS`] table
//! - [`WorkflowMemory`], the scratch space steps communicate through
//! - [`WorkflowContext`], everything one run owns
//! - [`AgentStep`], the contract each agent implements
//! - [`WorkflowStateMachine`], which dispatches steps until a terminal state
//!
//! ```text
//!   Inspecting --InspectComplete--> Coding --CodeGenerated--> Reviewing --CodeApproved--> Done
//!                                     ^                           |
//!                                     +-------CodeRejected--------+
//!
//!   any --FatalError--> Failed
//! ```

mod context;
mod error;
mod memory;
pub mod runtime;
mod step;
mod workflow;

// Re-export main types
pub use context::{ChangeApplier, RunSnapshot, TransitionRecord, WorkflowContext};
pub use error::{FailureReason, RunOutcome, WorkflowError};
pub use memory::WorkflowMemory;
pub use runtime::{RuntimeConfig, WorkflowStateMachine};
pub use step::{AgentExecutionResult, AgentStep};
pub use workflow::{transition, WorkflowState, WorkflowTrigger, TRANSITIONS};
