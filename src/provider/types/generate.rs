//! Generation settings and the request handed to a chat transport.

use super::internal::ChatMessage;
use serde::{Deserialize, Serialize};

/// Configuration for a generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Model to use (None = use transport default)
    pub model: Option<String>,
    /// Temperature for sampling (0.0 = deterministic, 2.0 = very random)
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Whether the transport should stream tokens
    pub enable_streaming: bool,
}

impl GenerateConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self {
            model: None,
            temperature: 0.7,
            max_tokens: Some(4000),
            enable_streaming: false,
        }
    }

    /// Set the model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Enable streaming
    pub fn with_streaming(mut self, enable: bool) -> Self {
        self.enable_streaming = enable;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            anyhow::bail!("Temperature must be between 0.0 and 2.0");
        }

        if let Some(max_tokens) = self.max_tokens {
            if max_tokens == 0 {
                anyhow::bail!("Max tokens must be greater than 0");
            }
        }

        Ok(())
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a transport needs for one model call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Conversation so far
    pub messages: Vec<ChatMessage>,
    /// Generation settings
    pub config: GenerateConfig,
    /// OpenAI-style function schemas the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,
}

impl ChatRequest {
    /// Request with the given messages and default settings
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Request made of an optional system prompt followed by one user prompt
    pub fn prompt(prompt: impl Into<String>, system_prompt: Option<&str>) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        Self::new(messages)
    }

    /// Replace generation settings
    pub fn with_config(mut self, config: GenerateConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace tool schemas
    pub fn with_tools(mut self, tools: Vec<serde_json::Value>) -> Self {
        self.tools = tools;
        self
    }

    /// Whether the request carries at least one message
    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }
}
