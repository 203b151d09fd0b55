//! Chat transport abstraction.
//!
//! The transport is the only thing that talks to a model. It is supplied by
//! the application (HTTP client, local runtime, test double); this crate
//! never implements a wire protocol.

use crate::provider::types::{ChatRequest, TokenUsage, ToolCallRequest};
use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Callback receiving streamed text fragments in arrival order.
pub type TokenCallback = dyn Fn(&str) + Send + Sync;

/// What one model call produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportResponse {
    /// Text content, possibly empty
    pub text: String,
    /// Token usage, when the transport reports it
    pub usage: Option<TokenUsage>,
    /// Cost in dollars, when the transport reports it
    pub cost: Option<f64>,
    /// The completion was cut short (aborted stream, partial output)
    pub interrupted: bool,
    /// Function calls the model asked for
    pub tool_calls: Vec<ToolCallRequest>,
}

impl TransportResponse {
    /// Complete text response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Response that was cut short
    pub fn interrupted(partial: impl Into<String>) -> Self {
        Self {
            text: partial.into(),
            interrupted: true,
            ..Self::default()
        }
    }

    /// Response asking for tool calls
    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::default()
        }
    }

    /// Attach token usage
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = Some(TokenUsage::new(prompt_tokens, completion_tokens));
        self
    }

    /// Attach cost in dollars
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }
}

/// Core trait every model backend implements.
///
/// # Example
///
/// ```ignore
/// use codeloop::provider::{ChatRequest, ChatTransport};
/// use tokio_util::sync::CancellationToken;
///
/// async fn ask(transport: &dyn ChatTransport) -> anyhow::Result<String> {
///     let request = ChatRequest::prompt("Hello", None);
///     let response = transport.send(&request, None, &CancellationToken::new()).await?;
///     Ok(response.text)
/// }
/// ```
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Perform one model call.
    ///
    /// # Arguments
    /// * `request` - Conversation and generation settings
    /// * `on_token` - Optional callback fed each text fragment as it arrives
    /// * `cancel` - Cancellation signal; implementations may abort early and
    ///   report the response as interrupted
    async fn send(
        &self,
        request: &ChatRequest,
        on_token: Option<&TokenCallback>,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse>;

    /// Transport identifier for logging
    fn transport_name(&self) -> &str {
        "chat"
    }
}
