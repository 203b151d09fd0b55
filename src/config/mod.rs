//! Configuration management for workflow runs.
//!
//! This module provides configuration loading through TOML files and
//! environment variable overrides via `.env` files.
//!
//! # Example
//!
//! ```no_run
//! use codeloop::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! // Load environment variables
//! let env = EnvironmentLoader::new(Some(Path::new(".env")));
//!
//! // Load configuration from TOML, then let the environment override it
//! let mut config_loader = ConfigurationLoader::new(Some(Path::new("config/codeloop.toml"))).unwrap();
//! config_loader.apply_environment(&env).unwrap();
//!
//! // Access configuration
//! println!("Max iterations: {}", config_loader.config.execution.max_iterations);
//! println!("LLM provider: {:?}", env.llm_provider());
//! ```

pub mod config;
pub mod environment;

// Re-export main types for convenience
pub use self::config::{
    AgentConfig, AuthorizationConfig, Configuration, ConfigurationLoader, ExecutionConfig,
    LlmConfig, LoggingConfig,
};
pub use self::environment::EnvironmentLoader;
