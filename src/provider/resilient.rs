//! Retry-resilient model invocation.
//!
//! [`ResilientInvoker`] wraps a [`ChatTransport`] and keeps calling it until a
//! response carries non-empty, uninterrupted text or the attempt budget runs
//! out. When tools are bound, function calls requested by the model are run
//! through the [`ToolAuthorizationPipeline`] and their results fed back into
//! the conversation before the next call.

use crate::invoker::{CallDescriptor, ToolAuthorizationPipeline, ToolRegistry};
use crate::observability::InteractionSink;
use crate::provider::error::{InvokeError, InvokeResult};
use crate::provider::traits::{ChatTransport, TokenCallback, TransportResponse};
use crate::provider::types::{ChatMessage, ChatRequest, InvocationResult, ToolCallRequest, UsageLedger};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How many times to call the transport and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on transport calls per invocation (tool rounds excluded)
    pub max_attempts: u32,
    /// Pause between failed attempts
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    /// Policy with the given attempt bound and no delay
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Set the pause between attempts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// Tools the model may call during an invocation.
#[derive(Clone)]
pub struct ToolBinding {
    /// Functions resolvable by name
    pub registry: Arc<ToolRegistry>,
    /// Filters every call must pass
    pub pipeline: Arc<ToolAuthorizationPipeline>,
    /// Bound on consecutive tool rounds within one attempt
    pub max_rounds: u32,
}

impl ToolBinding {
    /// Bind `registry` behind `pipeline` with the default round limit of 8
    pub fn new(registry: Arc<ToolRegistry>, pipeline: Arc<ToolAuthorizationPipeline>) -> Self {
        Self {
            registry,
            pipeline,
            max_rounds: 8,
        }
    }

    /// Override the round limit
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }
}

/// Outcome of an invocation together with the usage it consumed.
///
/// `usage` covers every transport call made, including those of an
/// invocation that ultimately failed.
#[derive(Debug)]
pub struct MeteredInvocation {
    /// Usable text, or why none arrived
    pub outcome: InvokeResult<String>,
    /// Usage of every call made for this invocation
    pub usage: UsageLedger,
}

impl MeteredInvocation {
    fn rejected(error: InvokeError) -> Self {
        Self {
            outcome: Err(error),
            usage: UsageLedger::default(),
        }
    }
}

/// What one attempt came back with.
enum AttemptOutcome {
    Usable(String),
    Rejected(String),
}

/// Calls a model until it gives a usable answer.
///
/// An attempt is rejected when the transport errors, reports the response as
/// interrupted, or returns text that is empty after trimming. Rejected
/// attempts are reported to the sink as warnings. Usage and cost of every
/// call, rejected ones included, are accumulated into the result and into a
/// lifetime ledger readable through [`total_usage`](Self::total_usage).
///
/// # Example
///
/// ```ignore
/// use codeloop::prelude::*;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// let invoker = ResilientInvoker::new(transport, Arc::new(TracingSink::default()))
///     .with_policy(RetryPolicy::new(3));
/// let result = invoker
///     .invoke(&ChatRequest::prompt("Hi", None), None, &CancellationToken::new())
///     .await?;
/// println!("{} ({} calls)", result.text, result.usage.calls);
/// ```
pub struct ResilientInvoker {
    transport: Arc<dyn ChatTransport>,
    sink: Arc<dyn InteractionSink>,
    policy: RetryPolicy,
    tools: Option<ToolBinding>,
    lifetime_usage: Mutex<UsageLedger>,
}

impl ResilientInvoker {
    /// Invoker with the default policy and no tools
    pub fn new(transport: Arc<dyn ChatTransport>, sink: Arc<dyn InteractionSink>) -> Self {
        Self {
            transport,
            sink,
            policy: RetryPolicy::default(),
            tools: None,
            lifetime_usage: Mutex::new(UsageLedger::default()),
        }
    }

    /// Replace the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Let the model call the tools in `binding`
    pub fn with_tools(mut self, binding: ToolBinding) -> Self {
        self.tools = Some(binding);
        self
    }

    /// Current retry policy
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Sink receiving attempt warnings
    pub fn sink(&self) -> &Arc<dyn InteractionSink> {
        &self.sink
    }

    /// Usage accumulated across every invocation made through this invoker
    pub fn total_usage(&self) -> UsageLedger {
        self.lifetime_usage
            .lock()
            .map(|l| *l)
            .unwrap_or_else(|e| *e.into_inner())
    }

    /// Invoke with the policy's attempt bound.
    pub async fn invoke(
        &self,
        request: &ChatRequest,
        on_token: Option<&TokenCallback>,
        cancel: &CancellationToken,
    ) -> InvokeResult<InvocationResult> {
        self.invoke_with_attempts(request, on_token, cancel, self.policy.max_attempts)
            .await
    }

    /// Invoke with an explicit attempt bound.
    ///
    /// # Errors
    /// * [`InvokeError::InvalidAttempts`] when `max_attempts` is zero
    /// * [`InvokeError::EmptyRequest`] when the request has no messages
    /// * [`InvokeError::Cancelled`] when `cancel` fires before a usable response
    /// * [`InvokeError::Tool`] when a requested tool call is denied; never retried
    /// * [`InvokeError::ExhaustedRetries`] when every attempt was rejected
    pub async fn invoke_with_attempts(
        &self,
        request: &ChatRequest,
        on_token: Option<&TokenCallback>,
        cancel: &CancellationToken,
        max_attempts: u32,
    ) -> InvokeResult<InvocationResult> {
        let MeteredInvocation { outcome, usage } = self
            .invoke_metered_with_attempts(request, on_token, cancel, max_attempts)
            .await;
        outcome.map(|text| InvocationResult { text, usage })
    }

    /// Invoke with the policy's attempt bound, reporting usage whether or not
    /// the invocation succeeds.
    pub async fn invoke_metered(
        &self,
        request: &ChatRequest,
        on_token: Option<&TokenCallback>,
        cancel: &CancellationToken,
    ) -> MeteredInvocation {
        self.invoke_metered_with_attempts(request, on_token, cancel, self.policy.max_attempts)
            .await
    }

    /// [`invoke_metered`](Self::invoke_metered) with an explicit attempt
    /// bound. Fails the same way as
    /// [`invoke_with_attempts`](Self::invoke_with_attempts).
    pub async fn invoke_metered_with_attempts(
        &self,
        request: &ChatRequest,
        on_token: Option<&TokenCallback>,
        cancel: &CancellationToken,
        max_attempts: u32,
    ) -> MeteredInvocation {
        if max_attempts == 0 {
            return MeteredInvocation::rejected(InvokeError::InvalidAttempts);
        }
        if !request.has_messages() {
            return MeteredInvocation::rejected(InvokeError::EmptyRequest);
        }

        let mut usage = UsageLedger::default();
        let outcome = self
            .run_attempts(request, on_token, cancel, max_attempts, &mut usage)
            .await;

        if let Ok(mut lifetime) = self.lifetime_usage.lock() {
            *lifetime += usage;
        }

        MeteredInvocation { outcome, usage }
    }

    async fn run_attempts(
        &self,
        request: &ChatRequest,
        on_token: Option<&TokenCallback>,
        cancel: &CancellationToken,
        max_attempts: u32,
        usage: &mut UsageLedger,
    ) -> InvokeResult<String> {
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return Err(InvokeError::Cancelled);
            }
            if attempt > 1 && !self.policy.retry_delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(InvokeError::Cancelled),
                    _ = tokio::time::sleep(self.policy.retry_delay) => {}
                }
            }

            tracing::debug!(
                transport = self.transport.transport_name(),
                attempt,
                max_attempts,
                "invoking model"
            );

            match self.attempt(request, on_token, cancel, usage).await? {
                AttemptOutcome::Usable(text) => return Ok(text),
                AttemptOutcome::Rejected(reason) => {
                    if cancel.is_cancelled() {
                        return Err(InvokeError::Cancelled);
                    }
                    self.sink.warn(&format!(
                        "Attempt {}/{} failed: {}",
                        attempt, max_attempts, reason
                    ));
                    last_reason = reason;
                }
            }
        }

        Err(InvokeError::ExhaustedRetries {
            attempts: max_attempts,
            last_reason,
        })
    }

    /// One attempt, including any tool rounds it takes.
    async fn attempt(
        &self,
        base: &ChatRequest,
        on_token: Option<&TokenCallback>,
        cancel: &CancellationToken,
        usage: &mut UsageLedger,
    ) -> InvokeResult<AttemptOutcome> {
        let mut request = base.clone();
        if let Some(binding) = &self.tools {
            if request.tools.is_empty() {
                request.tools = binding.registry.openai_tools();
            }
        }

        let mut rounds = 0u32;
        loop {
            let response = match self.transport.send(&request, on_token, cancel).await {
                Ok(response) => response,
                Err(e) => {
                    usage.record(None, None);
                    return Ok(AttemptOutcome::Rejected(format!("transport error: {:#}", e)));
                }
            };
            usage.record(response.usage, response.cost);

            if response.interrupted {
                return Ok(AttemptOutcome::Rejected(
                    "response was interrupted".to_string(),
                ));
            }

            if !response.tool_calls.is_empty() {
                if let Some(binding) = &self.tools {
                    if cancel.is_cancelled() {
                        return Err(InvokeError::Cancelled);
                    }
                    rounds += 1;
                    if rounds > binding.max_rounds {
                        return Err(InvokeError::ToolRoundsExceeded {
                            rounds: binding.max_rounds,
                        });
                    }
                    self.run_tool_round(binding, &mut request, response).await?;
                    continue;
                }
                self.sink.warn(&format!(
                    "Model requested {} tool call(s) but no tools are bound",
                    response.tool_calls.len()
                ));
            }

            if response.text.trim().is_empty() {
                return Ok(AttemptOutcome::Rejected(
                    "response contained no text".to_string(),
                ));
            }
            return Ok(AttemptOutcome::Usable(response.text));
        }
    }

    async fn run_tool_round(
        &self,
        binding: &ToolBinding,
        request: &mut ChatRequest,
        response: TransportResponse,
    ) -> InvokeResult<()> {
        let calls = response.tool_calls;
        request
            .messages
            .push(ChatMessage::assistant_tool_calls(response.text, calls.clone()));

        for call in calls {
            let content = self.run_tool(binding, &call).await?;
            request
                .messages
                .push(ChatMessage::tool_result(call.id, content));
        }
        Ok(())
    }

    /// Run one requested call. Only an authorization denial is fatal; every
    /// other failure is reported back to the model as the tool result.
    async fn run_tool(&self, binding: &ToolBinding, call: &ToolCallRequest) -> InvokeResult<String> {
        let Some(function) = binding.registry.get(&call.name) else {
            self.sink
                .warn(&format!("Model requested unknown tool '{}'", call.name));
            return Ok(format!("error: unknown tool '{}'", call.name));
        };

        let descriptor = CallDescriptor::new(&call.id, &call.name, call.arguments.clone())
            .with_source(function.definition().source);

        match binding
            .pipeline
            .invoke_tool(function.as_ref(), call.arguments.clone(), &descriptor)
            .await
        {
            Ok(serde_json::Value::String(text)) => Ok(text),
            Ok(value) => Ok(value.to_string()),
            Err(e) if e.is_authorization_denied() => Err(e.into()),
            Err(e) => {
                self.sink.warn(&e.to_string());
                Ok(format!("error: {}", e))
            }
        }
    }
}
