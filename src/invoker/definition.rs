//! Function descriptors for tools the model may call.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;

/// Where a tool comes from.
///
/// Filters can key on the source, e.g. to require permission for every
/// remote tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokerSource {
	/// Runs in this process.
	#[default]
	Native,

	/// Served by an MCP (Model Context Protocol) server.
	Mcp,

	/// Delegated to a peer agent (A2A).
	A2a,
}

impl fmt::Display for InvokerSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Native => write!(f, "native"),
			Self::Mcp => write!(f, "mcp"),
			Self::A2a => write!(f, "a2a"),
		}
	}
}

/// Describes a callable function: name, purpose and JSON-schema parameters.
///
/// # Example
///
/// ```
/// use codeloop::invoker::{InvokerDefinition, InvokerSource};
/// use serde_json::json;
///
/// let def = InvokerDefinition::new(
///     "read_file",
///     "Read the contents of a file",
///     json!({
///         "type": "object",
///         "properties": {
///             "path": { "type": "string", "description": "File path to read" }
///         },
///         "required": ["path"]
///     }),
///     InvokerSource::Native,
/// );
///
/// let schema = def.to_openai_function();
/// assert_eq!(schema["function"]["name"], "read_file");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvokerDefinition {
	/// Unique function name; the registry key.
	pub name: String,

	/// Description shown to the model.
	pub description: String,

	/// JSON Schema of the accepted arguments.
	pub parameters: Value,

	/// Origin of the function.
	pub source: InvokerSource,

	/// Free-form routing hints (server URL, agent id, ...).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub metadata: Option<HashMap<String, Value>>,
}

impl InvokerDefinition {
	/// Create a new definition.
	pub fn new(
		name: impl Into<String>,
		description: impl Into<String>,
		parameters: Value,
		source: InvokerSource,
	) -> Self {
		Self {
			name: name.into(),
			description: description.into(),
			parameters,
			source,
			metadata: None,
		}
	}

	/// Create a definition that takes no arguments.
	pub fn new_simple(
		name: impl Into<String>,
		description: impl Into<String>,
		source: InvokerSource,
	) -> Self {
		Self::new(
			name,
			description,
			json!({
				"type": "object",
				"properties": {}
			}),
			source,
		)
	}

	/// Add a metadata entry using builder pattern.
	pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
		self.metadata
			.get_or_insert_with(HashMap::new)
			.insert(key.into(), value);
		self
	}

	/// Get a metadata value by key.
	pub fn get_metadata(&self, key: &str) -> Option<&Value> {
		self.metadata.as_ref()?.get(key)
	}

	/// OpenAI-compatible function calling schema.
	pub fn to_openai_function(&self) -> Value {
		json!({
			"type": "function",
			"function": {
				"name": self.name,
				"description": self.description,
				"parameters": self.parameters,
			}
		})
	}

	/// Check the parameter schema is a JSON object with a `type` field.
	pub fn validate(&self) -> Result<(), String> {
		match self.parameters.as_object() {
			Some(obj) if obj.contains_key("type") => Ok(()),
			Some(_) => Err("parameters schema must have a 'type' field".to_string()),
			None => Err("parameters must be a JSON object (schema)".to_string()),
		}
	}
}
