//! codeloop - building blocks for multi-agent code generation
//!
//! codeloop drives a small pipeline of specialized agents (inspect -> code -> review)
//! that iterate until generated code passes verification. It provides a set of
//! feature-gated modules:
//!
//! - **`config`** - TOML configuration and `.env` loading
//! - **`observability`** - interaction sinks, agent modes and the markdown session logger
//! - **`provider`** - chat transport abstraction and the retry-resilient invoker
//! - **`invoker`** - tool definitions, registry and the authorization pipeline
//! - **`orchestration`** - workflow memory, context, step contract and the state machine
//! - **`agent`** - the inspector, coder and reviewer steps plus the single-shot prompt agent
//!
//! # Features
//!
//! Every module is enabled by default. Pick a subset in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! codeloop = { version = "0.1", default-features = false, features = ["provider"] }
//! ```
//!
//! # Example: running a workflow
//!
//! ```ignore
//! use codeloop::prelude::*;
//! use std::sync::Arc;
//!
//! async fn example(deps: StepDependencies) -> anyhow::Result<()> {
//!     let registry = CapabilityRegistry::with_defaults();
//!     let machine = registry.build_machine(
//!         &["inspector", "coder", "reviewer"],
//!         &deps,
//!         RuntimeConfig::default(),
//!     )?;
//!
//!     let mut context = WorkflowContext::new("implement IUserStore");
//!     match machine.run(&mut context).await {
//!         RunOutcome::Completed => println!("{:?}", context.memory().pending_changes()),
//!         other => println!("run ended: {:?}", other),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Example: a one-off prompt
//!
//! ```ignore
//! use codeloop::agent::PromptAgent;
//!
//! let agent = PromptAgent::new(transport, sink);
//! let answer = agent.get_message("Summarize this diff", Some("You are terse")).await?;
//! ```

#![warn(missing_docs)]

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Interaction sinks and session logging (enabled with the `observability` feature)
#[cfg(feature = "observability")]
pub mod observability;

/// Chat transport abstraction and resilient invocation (enabled with the `provider` feature)
#[cfg(feature = "provider")]
pub mod provider;

/// Tool definitions and authorization (enabled with the `invoker` feature)
#[cfg(feature = "invoker")]
pub mod invoker;

/// Workflow state machine and shared memory (enabled with the `orchestration` feature)
#[cfg(feature = "orchestration")]
pub mod orchestration;

/// Concrete agent steps (enabled with the `agent` feature)
#[cfg(feature = "agent")]
pub mod agent;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "config")]
    pub use crate::config::{Configuration, ConfigurationLoader, EnvironmentLoader};

    #[cfg(feature = "observability")]
    pub use crate::observability::{AgentMode, InteractionSink, Logger, TracingSink};

    #[cfg(feature = "provider")]
    pub use crate::provider::{
        ChatMessage, ChatRequest, ChatTransport, GenerateConfig, InvocationResult, InvokeError,
        ResilientInvoker, RetryPolicy, TransportResponse, UsageLedger,
    };

    #[cfg(feature = "invoker")]
    pub use crate::invoker::{
        AuthorizationFilter, CallDescriptor, InvokerDefinition, InvokerError,
        ToolAuthorizationPipeline, ToolFunction, ToolRegistry,
    };

    #[cfg(feature = "orchestration")]
    pub use crate::orchestration::{
        AgentExecutionResult, AgentStep, FailureReason, RunOutcome, RuntimeConfig,
        WorkflowContext, WorkflowMemory, WorkflowState, WorkflowStateMachine, WorkflowTrigger,
    };

    #[cfg(feature = "agent")]
    pub use crate::agent::{
        CapabilityRegistry, ChangeApplier, CoderStep, InspectorStep, PromptAgent, ReviewerStep,
        StaticAnalysisService, StepDependencies, VerificationService,
    };
}
