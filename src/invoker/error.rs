//! Error types for the invoker module.

use thiserror::Error;

/// Errors raised while registering or invoking tools.
///
/// # Example
///
/// ```
/// use codeloop::invoker::InvokerError;
///
/// let error = InvokerError::authorization_denied("delete_file", "deny-list");
/// assert!(error.is_authorization_denied());
/// assert!(error.to_string().contains("delete_file"));
/// ```
#[derive(Debug, Error)]
pub enum InvokerError {
	/// The requested tool is not registered.
	#[error("tool not found: {name}")]
	NotFound {
		/// Name of the missing tool.
		name: String,
	},

	/// A tool with the same name is already registered.
	#[error("tool already registered: {name}")]
	DuplicateName {
		/// Name of the duplicate tool.
		name: String,
	},

	/// The tool ran and failed.
	#[error("execution failed for {name}: {message}")]
	ExecutionFailed {
		/// Name of the tool that failed.
		name: String,
		/// Description of the failure.
		message: String,
	},

	/// The tool definition or the arguments are malformed.
	#[error("invalid arguments for {name}: {message}")]
	InvalidArguments {
		/// Name of the tool.
		name: String,
		/// Description of the validation failure.
		message: String,
	},

	/// An authorization filter rejected the call; the tool never ran.
	#[error("call to {name} denied by filter '{filter}'")]
	AuthorizationDenied {
		/// Name of the tool.
		name: String,
		/// Name of the filter that denied the call.
		filter: String,
	},
}

impl InvokerError {
	/// Create a NotFound error.
	pub fn not_found(name: impl Into<String>) -> Self {
		Self::NotFound { name: name.into() }
	}

	/// Create a DuplicateName error.
	pub fn duplicate_name(name: impl Into<String>) -> Self {
		Self::DuplicateName { name: name.into() }
	}

	/// Create an ExecutionFailed error.
	pub fn execution_failed(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::ExecutionFailed {
			name: name.into(),
			message: message.into(),
		}
	}

	/// Create an InvalidArguments error.
	pub fn invalid_arguments(name: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidArguments {
			name: name.into(),
			message: message.into(),
		}
	}

	/// Create an AuthorizationDenied error.
	pub fn authorization_denied(name: impl Into<String>, filter: impl Into<String>) -> Self {
		Self::AuthorizationDenied {
			name: name.into(),
			filter: filter.into(),
		}
	}

	/// Whether a filter blocked the call.
	pub fn is_authorization_denied(&self) -> bool {
		matches!(self, Self::AuthorizationDenied { .. })
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_messages_carry_names() {
		assert!(InvokerError::not_found("my_tool").to_string().contains("my_tool"));
		assert!(InvokerError::duplicate_name("t").to_string().contains("already registered"));

		let error = InvokerError::execution_failed("failing_tool", "connection timeout");
		assert!(error.to_string().contains("connection timeout"));
		assert!(!error.is_authorization_denied());
	}

	#[test]
	fn test_authorization_denied_is_distinct() {
		let error = InvokerError::authorization_denied("run_shell", "permission");
		assert!(error.is_authorization_denied());
		assert_eq!(error.to_string(), "call to run_shell denied by filter 'permission'");
	}

	#[test]
	fn test_error_is_send_sync() {
		fn assert_send_sync<T: Send + Sync>() {}
		assert_send_sync::<InvokerError>();
	}
}
