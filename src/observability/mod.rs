//! Observability utilities for workflow runs.
//!
//! This module provides the [`InteractionSink`] abstraction the core reports
//! progress through, a few sink implementations, and the markdown session
//! [`Logger`].
//!
//! # Example
//!
//! ```no_run
//! use codeloop::observability::{InteractionSink, Logger};
//!
//! // Create a logger
//! let logger = Logger::new(None, Some("DEBUG")).unwrap();
//!
//! // Log a run start
//! logger.log_run_start("run-1", "implement IUserStore", &Default::default()).unwrap();
//!
//! // Report progress through the sink interface
//! logger.info("inspecting codebase");
//!
//! // Log completion
//! logger.log_completion("Run completed").unwrap();
//! ```

pub mod logger;
pub mod sink;

// Re-export main types for convenience
pub use logger::Logger;
pub use sink::{AgentMode, InteractionSink, RecordingSink, SinkEntry, SinkLevel, TracingSink};
