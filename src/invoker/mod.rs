//! Tool invocation with authorization.
//!
//! Every function call a model proposes goes through a
//! [`ToolAuthorizationPipeline`] before it runs:
//!
//! ```text
//! model tool call ──► CallDescriptor ──► filter 1 ──► filter 2 ──► ... ──► ToolFunction
//!                                          │ deny        │ deny
//!                                          ▼             ▼
//!                                   InvokerError::AuthorizationDenied
//! ```
//!
//! Filters are consulted in registration order. A filter only decides calls
//! it [`matches`](AuthorizationFilter::matches); the first refusal aborts the
//! call and the function is never invoked.
//!
//! # Quick Start
//!
//! ```
//! use codeloop::invoker::{
//!     AuthorizationFilter, CallDescriptor, DenyListFilter, FnTool, InvokerDefinition, InvokerSource,
//!     ToolAuthorizationPipeline,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let deny: Arc<dyn AuthorizationFilter> = Arc::new(DenyListFilter::new(["rm"]));
//! let pipeline = ToolAuthorizationPipeline::new(vec![deny]);
//! let tool = FnTool::new(
//!     InvokerDefinition::new_simple("rm", "Remove a file", InvokerSource::Native),
//!     |_| Ok(json!("removed")),
//! );
//!
//! let call = CallDescriptor::new("call_0", "rm", json!({}));
//! let denied = pipeline.invoke_tool(&tool, json!({}), &call).await.unwrap_err();
//! assert!(denied.is_authorization_denied());
//! # });
//! ```

mod definition;
mod error;
mod filter;
mod pipeline;
mod registry;

pub use definition::{InvokerDefinition, InvokerSource};
pub use error::InvokerError;
pub use filter::{
	AllowListFilter, AuthorizationFilter, CallDescriptor, DenyListFilter, PermissionFilter,
	PredicateFilter,
};
pub use pipeline::ToolAuthorizationPipeline;
pub use registry::{FnTool, ToolFunction, ToolRegistry};

/// Result type for invoker operations.
pub type InvokerResult<T> = Result<T, InvokerError>;
