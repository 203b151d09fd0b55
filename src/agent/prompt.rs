//! Single-shot prompting outside the workflow.

use crate::observability::InteractionSink;
use crate::provider::{
    ChatRequest, ChatTransport, GenerateConfig, InvokeResult, ResilientInvoker, RetryPolicy,
    UsageLedger,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The simplest consumer of [`ResilientInvoker`]: one prompt in, one
/// non-empty answer out.
///
/// # Example
///
/// ```ignore
/// use codeloop::agent::PromptAgent;
///
/// let agent = PromptAgent::new(transport, sink).with_retry_count(5);
/// let title = agent.get_message("Name this branch", Some("Answer in three words")).await?;
/// ```
pub struct PromptAgent {
    invoker: ResilientInvoker,
    config: GenerateConfig,
    retry_count: u32,
    cancellation: CancellationToken,
}

impl PromptAgent {
    /// Agent with three attempts per message
    pub fn new(transport: Arc<dyn ChatTransport>, sink: Arc<dyn InteractionSink>) -> Self {
        let policy = RetryPolicy::default();
        Self {
            invoker: ResilientInvoker::new(transport, sink).with_policy(policy),
            config: GenerateConfig::default(),
            retry_count: policy.max_attempts,
            cancellation: CancellationToken::new(),
        }
    }

    /// Attempts per message
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Generation settings for every message
    pub fn with_config(mut self, config: GenerateConfig) -> Self {
        self.config = config;
        self
    }

    /// Token that aborts calls in progress and refuses new ones once cancelled
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Attempts allowed per prompt
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Ask once and return the model's answer.
    ///
    /// # Errors
    /// Fails with [`InvokeError::ExhaustedRetries`](crate::provider::InvokeError::ExhaustedRetries)
    /// after `retry_count` empty or interrupted responses.
    pub async fn get_message(&self, prompt: &str, system_prompt: Option<&str>) -> InvokeResult<String> {
        let request = ChatRequest::prompt(prompt, system_prompt).with_config(self.config.clone());
        let result = self
            .invoker
            .invoke_with_attempts(&request, None, &self.cancellation, self.retry_count)
            .await?;
        Ok(result.text)
    }

    /// Usage of every call this agent made, failed attempts included
    pub fn total_usage(&self) -> UsageLedger {
        self.invoker.total_usage()
    }
}
