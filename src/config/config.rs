//! TOML configuration parsing and management.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(feature = "invoker")]
use std::sync::Arc;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Agent identity and interaction mode
    #[serde(default)]
    pub agent: AgentConfig,
    /// Run log settings
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Iteration and retry limits
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Model generation settings
    #[serde(default)]
    pub llm: LlmConfig,
    /// Tool call filters
    #[serde(default)]
    pub authorization: AuthorizationConfig,
}

/// Agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent name
    pub name: String,
    /// Agent version
    pub version: String,
    /// One of `confirm`, `yolo` or `human`
    pub default_mode: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "codeloop".to_string(),
            version: "0.1.0".to_string(),
            default_mode: "confirm".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Markdown run log; a timestamped file under the temp dir when unset
    #[serde(default)]
    pub log_file: Option<String>,
    /// Minimum level, e.g. `INFO`
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: default_log_level(),
        }
    }
}

/// Execution limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Step dispatches allowed per workflow run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Transport calls allowed per invocation
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause between failed attempts
    #[serde(default)]
    pub retry_delay_ms: u64,
    /// Consecutive tool rounds allowed per attempt
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
}

fn default_max_iterations() -> u32 {
    20
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_tool_rounds() -> u32 {
    8
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: 0,
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

/// Generation settings passed to the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name passed to the transport
    #[serde(default)]
    pub model: Option<String>,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Completion token cap
    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,
    /// Stream tokens as they arrive
    #[serde(default)]
    pub enable_streaming: bool,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> Option<u32> {
    Some(4000)
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            enable_streaming: false,
        }
    }
}

/// Tool authorization rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    /// Tools that are always refused
    #[serde(default)]
    pub denied_tools: Vec<String>,
    /// Tools that need an explicit grant from the interaction sink
    #[serde(default)]
    pub permission_required_tools: Vec<String>,
}

impl Configuration {
    /// Check limits and ranges.
    pub fn validate(&self) -> Result<()> {
        if self.execution.max_attempts == 0 {
            bail!("execution.max_attempts must be at least 1");
        }
        if self.execution.max_iterations == 0 {
            bail!("execution.max_iterations must be at least 1");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            bail!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            );
        }
        #[cfg(feature = "observability")]
        self.agent
            .default_mode
            .parse::<crate::observability::AgentMode>()
            .map_err(|e| anyhow::anyhow!("agent.default_mode: {}", e))?;
        Ok(())
    }
}

#[cfg(feature = "provider")]
impl ExecutionConfig {
    /// Retry policy for the resilient invoker
    pub fn retry_policy(&self) -> crate::provider::RetryPolicy {
        crate::provider::RetryPolicy::new(self.max_attempts)
            .with_delay(std::time::Duration::from_millis(self.retry_delay_ms))
    }
}

#[cfg(feature = "orchestration")]
impl ExecutionConfig {
    /// Limits for the workflow state machine
    pub fn runtime_config(&self) -> crate::orchestration::RuntimeConfig {
        crate::orchestration::RuntimeConfig::new(self.max_iterations)
    }
}

#[cfg(feature = "provider")]
impl LlmConfig {
    /// Generation settings for chat requests
    pub fn generate_config(&self) -> crate::provider::GenerateConfig {
        let mut config = crate::provider::GenerateConfig::new()
            .with_temperature(self.temperature)
            .with_streaming(self.enable_streaming);
        config.max_tokens = self.max_tokens;
        if let Some(model) = &self.model {
            config = config.with_model(model);
        }
        config
    }
}

#[cfg(feature = "invoker")]
impl AuthorizationConfig {
    /// Filters for the authorization pipeline: the deny list first, then
    /// the permission prompt.
    pub fn filters(
        &self,
        sink: Arc<dyn crate::observability::InteractionSink>,
    ) -> Vec<Arc<dyn crate::invoker::AuthorizationFilter>> {
        let mut filters: Vec<Arc<dyn crate::invoker::AuthorizationFilter>> = Vec::new();
        if !self.denied_tools.is_empty() {
            filters.push(Arc::new(crate::invoker::DenyListFilter::new(
                self.denied_tools.iter().cloned(),
            )));
        }
        if !self.permission_required_tools.is_empty() {
            filters.push(Arc::new(crate::invoker::PermissionFilter::new(
                self.permission_required_tools.iter().cloned(),
                sink,
            )));
        }
        filters
    }
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    /// File the configuration was read from
    pub config_path: PathBuf,
    /// Parsed configuration
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None or missing, uses default config.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config/codeloop.toml"));

        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            Configuration::default()
        };
        config
            .validate()
            .with_context(|| format!("Invalid configuration: {}", config_path.display()))?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(config: Configuration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config_path: PathBuf::from("config/codeloop.toml"),
            config,
        })
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Apply environment overrides on top of the file values, then revalidate.
    pub fn apply_environment(&mut self, env: &crate::config::EnvironmentLoader) -> Result<()> {
        if let Some(model) = env.model() {
            self.config.llm.model = Some(model);
        }
        if let Some(max_iterations) = env.max_iterations()? {
            self.config.execution.max_iterations = max_iterations;
        }
        if let Some(level) = env.log_level() {
            self.config.logging.log_level = level.to_uppercase();
        }
        self.config.validate()
    }

    /// Get configuration value by dot-notation key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match key {
            "agent.name" => Some(self.config.agent.name.clone()),
            "agent.version" => Some(self.config.agent.version.clone()),
            "agent.default_mode" => Some(self.config.agent.default_mode.clone()),
            "logging.log_file" => self.config.logging.log_file.clone(),
            "logging.log_level" => Some(self.config.logging.log_level.clone()),
            "llm.model" => self.config.llm.model.clone(),
            _ => None,
        }
    }

    /// Get numeric configuration value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match key {
            "execution.max_iterations" => Some(self.config.execution.max_iterations as u64),
            "execution.max_attempts" => Some(self.config.execution.max_attempts as u64),
            "execution.retry_delay_ms" => Some(self.config.execution.retry_delay_ms),
            "execution.max_tool_rounds" => Some(self.config.execution.max_tool_rounds as u64),
            "llm.max_tokens" => self.config.llm.max_tokens.map(u64::from),
            _ => None,
        }
    }

    /// Get boolean configuration value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match key {
            "llm.enable_streaming" => Some(self.config.llm.enable_streaming),
            _ => None,
        }
    }

    /// Get LLM streaming enablement configuration.
    pub fn get_llm_streaming_enabled(&self) -> bool {
        self.config.llm.enable_streaming
    }
}
