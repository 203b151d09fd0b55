//! Environment variable loading and management.
//!
//! Only a handful of host-level overrides are read here. Transport
//! credentials belong to whatever `ChatTransport`
//! implementation the application supplies.

use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const MODEL_VAR: &str = "CODELOOP_MODEL";
const MAX_ITERATIONS_VAR: &str = "CODELOOP_MAX_ITERATIONS";
const LOG_LEVEL_VAR: &str = "CODELOOP_LOG_LEVEL";
const PROVIDER_VAR: &str = "LLM_PROVIDER";

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to a .env file. Nothing is loaded when None, so
    ///   stray `.env` files in the working directory are never picked up.
    pub fn new(env_file: Option<&Path>) -> Self {
        if let Some(path) = env_file {
            if path.exists() {
                if let Err(e) = dotenv::from_path(path) {
                    eprintln!("Warning: Failed to load .env file: {}", e);
                }
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// The .env file this loader was given, if any.
    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    /// Model override.
    pub fn model(&self) -> Option<String> {
        non_empty(MODEL_VAR)
    }

    /// Iteration budget override.
    ///
    /// # Errors
    /// Returns an error when the variable is set but is not a positive integer.
    pub fn max_iterations(&self) -> Result<Option<u32>> {
        non_empty(MAX_ITERATIONS_VAR)
            .map(|raw| {
                raw.trim()
                    .parse::<u32>()
                    .with_context(|| format!("{} must be an integer, got '{}'", MAX_ITERATIONS_VAR, raw))
            })
            .transpose()
    }

    /// Log level override.
    pub fn log_level(&self) -> Option<String> {
        non_empty(LOG_LEVEL_VAR)
    }

    /// Name of the transport the application should build, e.g. "openai".
    pub fn llm_provider(&self) -> Option<String> {
        non_empty(PROVIDER_VAR)
    }
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationLoader;
    use std::fs;

    // Each test owns its variables; they share process state with the rest of
    // the suite.

    #[test]
    fn test_llm_provider_selection() {
        env::remove_var(PROVIDER_VAR);
        let env_loader = EnvironmentLoader::default();
        assert_eq!(env_loader.llm_provider(), None);

        env::set_var(PROVIDER_VAR, "openai");
        assert_eq!(env_loader.llm_provider(), Some("openai".to_string()));

        env::remove_var(PROVIDER_VAR);
    }

    #[test]
    fn test_env_file_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "CODELOOP_MODEL=from-dotenv\n").unwrap();

        env::remove_var(MODEL_VAR);
        let env_loader = EnvironmentLoader::new(Some(&path));
        assert_eq!(env_loader.model(), Some("from-dotenv".to_string()));
        assert!(env_loader.env_file().is_some());

        env::remove_var(MODEL_VAR);
        assert!(EnvironmentLoader::new(None).env_file().is_none());
    }

    #[test]
    fn test_overrides_apply_to_configuration() {
        env::set_var(MAX_ITERATIONS_VAR, "7");
        env::set_var(LOG_LEVEL_VAR, "debug");

        let dir = tempfile::tempdir().unwrap();
        let mut loader = ConfigurationLoader::new(Some(&dir.path().join("none.toml"))).unwrap();
        loader.apply_environment(&EnvironmentLoader::default()).unwrap();
        assert_eq!(loader.config.execution.max_iterations, 7);
        assert_eq!(loader.config.logging.log_level, "DEBUG");

        env::set_var(MAX_ITERATIONS_VAR, "lots");
        assert!(EnvironmentLoader::default().max_iterations().is_err());

        env::set_var(MAX_ITERATIONS_VAR, "0");
        assert!(loader.apply_environment(&EnvironmentLoader::default()).is_err());

        env::remove_var(MAX_ITERATIONS_VAR);
        env::remove_var(LOG_LEVEL_VAR);
    }
}
