//! Provider module types

pub mod generate;
pub mod internal;
pub mod usage;

pub use generate::{ChatRequest, GenerateConfig};
pub use internal::{ChatMessage, MessageRole, ToolCallRequest};
pub use usage::{InvocationResult, TokenUsage, UsageLedger};
