//! Adapter turning a chunk stream into a [`ChatTransport`].
//!
//! Backends that naturally produce a stream of deltas implement
//! [`StreamingChatTransport`] and get wrapped in a [`StreamingAdapter`],
//! which feeds the token callback, concatenates the text and flags
//! incomplete streams as interrupted.

use crate::provider::traits::{ChatTransport, TokenCallback, TransportResponse};
use crate::provider::types::{ChatRequest, TokenUsage, ToolCallRequest};
use anyhow::Result;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// One item of a streamed completion
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text fragment
    Delta(String),
    /// Usage and cost report
    Usage {
        /// Token counts
        usage: TokenUsage,
        /// Cost in dollars
        cost: Option<f64>,
    },
    /// Complete tool call
    ToolCall(ToolCallRequest),
    /// End of a complete response
    Done,
}

/// Type alias for streaming response
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

/// Backend that streams completions chunk by chunk
#[async_trait]
pub trait StreamingChatTransport: Send + Sync {
    /// Start a streamed completion for `request`
    async fn open_stream(&self, request: &ChatRequest) -> Result<ChunkStream>;

    /// Backend identifier for logging
    fn transport_name(&self) -> &str {
        "streaming"
    }
}

/// Wraps a [`StreamingChatTransport`] so it can be used wherever a
/// [`ChatTransport`] is expected.
///
/// A stream that ends without [`StreamChunk::Done`], yields an error, or is
/// abandoned because of cancellation produces an interrupted response.
#[derive(Debug, Clone)]
pub struct StreamingAdapter<T> {
    inner: T,
}

impl<T> StreamingAdapter<T> {
    /// Wrap a streaming backend
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Access the wrapped backend
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: StreamingChatTransport> ChatTransport for StreamingAdapter<T> {
    async fn send(
        &self,
        request: &ChatRequest,
        on_token: Option<&TokenCallback>,
        cancel: &CancellationToken,
    ) -> Result<TransportResponse> {
        let mut stream = self.inner.open_stream(request).await?;
        let mut response = TransportResponse::default();
        let mut finished = false;

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                item = stream.next() => item,
            };

            match item {
                Some(Ok(StreamChunk::Delta(text))) => {
                    if let Some(callback) = on_token {
                        callback(&text);
                    }
                    response.text.push_str(&text);
                }
                Some(Ok(StreamChunk::Usage { usage, cost })) => {
                    response.usage = Some(usage);
                    if cost.is_some() {
                        response.cost = cost;
                    }
                }
                Some(Ok(StreamChunk::ToolCall(call))) => response.tool_calls.push(call),
                Some(Ok(StreamChunk::Done)) => {
                    finished = true;
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(transport = self.inner.transport_name(), "stream failed: {:#}", e);
                    break;
                }
                None => break,
            }
        }

        response.interrupted = !finished;
        Ok(response)
    }

    fn transport_name(&self) -> &str {
        self.inner.transport_name()
    }
}
