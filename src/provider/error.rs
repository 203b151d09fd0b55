//! Error types for model invocation.

use crate::invoker::InvokerError;
use thiserror::Error;

/// Result type for invocation operations
pub type InvokeResult<T> = Result<T, InvokeError>;

/// Ways a resilient invocation can fail.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// No attempt produced non-empty, uninterrupted text.
    #[error("no usable response after {attempts} attempts (last: {last_reason})")]
    ExhaustedRetries {
        /// Attempts made
        attempts: u32,
        /// Why the final attempt was rejected
        last_reason: String,
    },

    /// The caller cancelled before a usable response arrived.
    #[error("invocation cancelled")]
    Cancelled,

    /// The request had no messages.
    #[error("request must contain at least one message")]
    EmptyRequest,

    /// `max_attempts` was zero.
    #[error("max attempts must be at least 1")]
    InvalidAttempts,

    /// The model kept requesting tools past the configured bound.
    #[error("model requested tools for more than {rounds} rounds")]
    ToolRoundsExceeded {
        /// Configured round limit
        rounds: u32,
    },

    /// A tool call was refused by an authorization filter.
    #[error(transparent)]
    Tool(#[from] InvokerError),
}

impl InvokeError {
    /// Whether a tool call was blocked by an authorization filter.
    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, Self::Tool(e) if e.is_authorization_denied())
    }

    /// Whether the caller cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
