//! Model invocation module
//!
//! This module provides the chat transport trait, a streaming adapter for
//! chunked transports, and the [`ResilientInvoker`] that turns an unreliable
//! transport into bounded-retry calls with usage and cost accounting.

pub mod error;
pub mod resilient;
pub mod streaming;
pub mod traits;
pub mod types;

// Re-export main types
pub use error::{InvokeError, InvokeResult};
pub use resilient::{MeteredInvocation, ResilientInvoker, RetryPolicy, ToolBinding};
pub use streaming::{ChunkStream, StreamChunk, StreamingAdapter, StreamingChatTransport};
pub use traits::{ChatTransport, TokenCallback, TransportResponse};
pub use types::{
    ChatMessage, ChatRequest, GenerateConfig, InvocationResult, MessageRole, TokenUsage,
    ToolCallRequest, UsageLedger,
};
