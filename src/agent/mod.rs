//! Concrete agent steps and the capability registry.
//!
//! The three built-in steps cover the inspect -> code -> review loop:
//!
//! - [`InspectorStep`] runs static analysis and writes a design summary artifact
//! - [`CoderStep`] asks the model for complete files and stages them
//! - [`ReviewerStep`] verifies the staged files and routes failures back
//!
//! [`CapabilityRegistry`] builds steps by id so a state machine can be
//! assembled from configuration. [`PromptAgent`] is the standalone
//! single-prompt consumer of the resilient invoker.

mod coder;
mod inspector;
mod prompt;
mod registry;
mod reviewer;
mod traits;

pub use coder::{parse_file_blocks, CoderStep, INVALID_OUTPUT};
pub use inspector::{InspectorStep, FACTS_ARTIFACT, SUMMARY_ARTIFACT};
pub use prompt::PromptAgent;
pub use registry::{CapabilityRegistry, StepDependencies};
pub use reviewer::ReviewerStep;
pub use traits::{
    ChangeApplier, Fact, StaticAnalysisService, VerificationReport, VerificationService,
};
