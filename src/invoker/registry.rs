//! Callable tools and the registry that resolves them by name.

use crate::invoker::{InvokerDefinition, InvokerError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A function the model may ask to run.
#[async_trait]
pub trait ToolFunction: Send + Sync {
	/// Descriptor advertised to the model.
	fn definition(&self) -> &InvokerDefinition;

	/// Run the function with the model-supplied arguments.
	async fn invoke(&self, arguments: Value) -> anyhow::Result<Value>;
}

type SyncHandler = dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync;

/// Tool backed by a synchronous closure.
///
/// # Example
///
/// ```
/// use codeloop::invoker::{FnTool, InvokerDefinition, InvokerSource, ToolFunction};
/// use serde_json::json;
///
/// let tool = FnTool::new(
///     InvokerDefinition::new_simple("ping", "Liveness check", InvokerSource::Native),
///     |_args| Ok(json!("pong")),
/// );
/// assert_eq!(tool.definition().name, "ping");
/// ```
pub struct FnTool {
	definition: InvokerDefinition,
	handler: Box<SyncHandler>,
}

impl FnTool {
	/// Wrap `handler` under `definition`.
	pub fn new<F>(definition: InvokerDefinition, handler: F) -> Self
	where
		F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
	{
		Self {
			definition,
			handler: Box::new(handler),
		}
	}
}

#[async_trait]
impl ToolFunction for FnTool {
	fn definition(&self) -> &InvokerDefinition {
		&self.definition
	}

	async fn invoke(&self, arguments: Value) -> anyhow::Result<Value> {
		(self.handler)(arguments)
	}
}

/// Name-indexed set of tools.
///
/// Names are unique; iteration order is alphabetical so the schemas sent to
/// the model are stable between calls.
#[derive(Default, Clone)]
pub struct ToolRegistry {
	tools: BTreeMap<String, Arc<dyn ToolFunction>>,
}

impl ToolRegistry {
	/// Create a new empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Register a tool.
	///
	/// Fails if the name is taken or the parameter schema is malformed.
	pub fn register(&mut self, tool: Arc<dyn ToolFunction>) -> Result<(), InvokerError> {
		let definition = tool.definition();
		definition
			.validate()
			.map_err(|msg| InvokerError::invalid_arguments(&definition.name, msg))?;

		if self.tools.contains_key(&definition.name) {
			return Err(InvokerError::duplicate_name(&definition.name));
		}
		self.tools.insert(definition.name.clone(), tool);
		Ok(())
	}

	/// Look a tool up by name.
	pub fn get(&self, name: &str) -> Option<Arc<dyn ToolFunction>> {
		self.tools.get(name).cloned()
	}

	/// Check if a tool exists.
	pub fn contains(&self, name: &str) -> bool {
		self.tools.contains_key(name)
	}

	/// Remove a tool, returning it if it existed.
	pub fn remove(&mut self, name: &str) -> Option<Arc<dyn ToolFunction>> {
		self.tools.remove(name)
	}

	/// Number of registered tools.
	pub fn len(&self) -> usize {
		self.tools.len()
	}

	/// Check if the registry is empty.
	pub fn is_empty(&self) -> bool {
		self.tools.is_empty()
	}

	/// All tool names.
	pub fn names(&self) -> Vec<&str> {
		self.tools.keys().map(|s| s.as_str()).collect()
	}

	/// All descriptors.
	pub fn definitions(&self) -> Vec<&InvokerDefinition> {
		self.tools.values().map(|t| t.definition()).collect()
	}

	/// OpenAI-compatible schemas for every registered tool.
	pub fn openai_tools(&self) -> Vec<Value> {
		self.tools
			.values()
			.map(|t| t.definition().to_openai_function())
			.collect()
	}
}

impl std::fmt::Debug for ToolRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ToolRegistry")
			.field("tools", &self.names())
			.finish()
	}
}
