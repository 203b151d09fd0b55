//! Interception pipeline that gates every tool call behind the registered filters.

use crate::invoker::{AuthorizationFilter, CallDescriptor, InvokerError, InvokerResult, ToolFunction};
use serde_json::Value;
use std::sync::{Arc, RwLock};

type FilterList = Arc<[Arc<dyn AuthorizationFilter>]>;

/// Runs authorization filters in registration order before invoking a tool.
///
/// The first matching filter that refuses wins; later filters are not
/// consulted and the function never runs. Dispatch works on a snapshot of the
/// filter list, so [`register_filter`](Self::register_filter) never disturbs
/// calls already in flight.
pub struct ToolAuthorizationPipeline {
	filters: RwLock<FilterList>,
}

impl ToolAuthorizationPipeline {
	/// Pipeline with the given filters, consulted in order.
	pub fn new(filters: Vec<Arc<dyn AuthorizationFilter>>) -> Self {
		Self {
			filters: RwLock::new(filters.into()),
		}
	}

	/// Pipeline that authorizes everything.
	pub fn empty() -> Self {
		Self::new(Vec::new())
	}

	/// Append a filter. Takes effect for calls dispatched afterwards.
	pub fn register_filter(&self, filter: Arc<dyn AuthorizationFilter>) {
		let mut guard = self.filters.write().unwrap_or_else(|e| e.into_inner());
		let mut next: Vec<_> = guard.iter().cloned().collect();
		next.push(filter);
		*guard = next.into();
	}

	/// Current filter list.
	pub fn filters(&self) -> FilterList {
		self.filters
			.read()
			.unwrap_or_else(|e| e.into_inner())
			.clone()
	}

	/// Number of registered filters.
	pub fn len(&self) -> usize {
		self.filters().len()
	}

	/// Whether no filter is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Run the filter chain for `call` without invoking anything.
	pub async fn authorize(&self, call: &CallDescriptor) -> InvokerResult<()> {
		let filters = self.filters();
		for filter in filters.iter() {
			if !filter.matches(call) {
				continue;
			}
			if !filter.authorize(call).await {
				tracing::warn!(
					function = %call.function_name,
					filter = filter.name(),
					"tool call denied"
				);
				return Err(InvokerError::authorization_denied(
					&call.function_name,
					filter.name(),
				));
			}
		}
		Ok(())
	}

	/// Authorize `call`, then invoke `function` with `arguments` and return its result unchanged.
	pub async fn invoke_tool(
		&self,
		function: &dyn ToolFunction,
		arguments: Value,
		call: &CallDescriptor,
	) -> InvokerResult<Value> {
		self.authorize(call).await?;

		let name = &function.definition().name;
		tracing::debug!(function = %name, call_id = %call.call_id, "invoking tool");
		function
			.invoke(arguments)
			.await
			.map_err(|e| InvokerError::execution_failed(name, format!("{:#}", e)))
	}
}

impl Default for ToolAuthorizationPipeline {
	fn default() -> Self {
		Self::empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::invoker::{
		DenyListFilter, FnTool, InvokerDefinition, InvokerSource, PredicateFilter,
	};
	use serde_json::json;
	use std::sync::atomic::{AtomicUsize, Ordering};

	fn counting_tool(name: &str, counter: Arc<AtomicUsize>) -> FnTool {
		FnTool::new(
			InvokerDefinition::new_simple(name, "counts calls", InvokerSource::Native),
			move |args| {
				counter.fetch_add(1, Ordering::SeqCst);
				Ok(json!({ "echo": args }))
			},
		)
	}

	fn fixed(name: &str, matches: bool, allow: bool) -> Arc<dyn AuthorizationFilter> {
		Arc::new(PredicateFilter::new(name, move |_| matches, move |_| allow))
	}

	#[tokio::test]
	async fn test_first_matching_denial_wins() {
		let counter = Arc::new(AtomicUsize::new(0));
		let tool = counting_tool("write_file", counter.clone());
		let consulted = Arc::new(AtomicUsize::new(0));
		let seen = consulted.clone();

		let pipeline = ToolAuthorizationPipeline::new(vec![
			fixed("a", true, false),
			Arc::new(PredicateFilter::new(
				"b",
				move |_| {
					seen.fetch_add(1, Ordering::SeqCst);
					true
				},
				|_| true,
			)),
		]);

		let call = CallDescriptor::new("c1", "write_file", json!({}));
		let err = pipeline.invoke_tool(&tool, json!({}), &call).await.unwrap_err();

		match err {
			InvokerError::AuthorizationDenied { name, filter } => {
				assert_eq!(name, "write_file");
				assert_eq!(filter, "a");
			}
			other => panic!("unexpected error: {other}"),
		}
		assert_eq!(counter.load(Ordering::SeqCst), 0);
		assert_eq!(consulted.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_no_matching_filter_invokes_once_with_original_arguments() {
		let counter = Arc::new(AtomicUsize::new(0));
		let tool = counting_tool("read_file", counter.clone());
		let pipeline = ToolAuthorizationPipeline::new(vec![
			fixed("unrelated", false, false),
			Arc::new(DenyListFilter::new(["delete_file"])),
		]);

		let args = json!({"path": "src/UserStore.cs", "lines": [1, 2]});
		let call = CallDescriptor::new("c1", "read_file", args.clone());
		let result = pipeline.invoke_tool(&tool, args.clone(), &call).await.unwrap();

		assert_eq!(result, json!({ "echo": args }));
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_all_matching_filters_allow() {
		let counter = Arc::new(AtomicUsize::new(0));
		let tool = counting_tool("read_file", counter.clone());
		let pipeline = ToolAuthorizationPipeline::new(vec![
			fixed("one", true, true),
			fixed("two", true, true),
		]);

		let call = CallDescriptor::new("c1", "read_file", json!({}));
		assert!(pipeline.invoke_tool(&tool, json!({}), &call).await.is_ok());
		assert_eq!(counter.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_tool_failure_maps_to_execution_failed() {
		let tool = FnTool::new(
			InvokerDefinition::new_simple("flaky", "always fails", InvokerSource::Native),
			|_| Err(anyhow::anyhow!("disk full")),
		);
		let pipeline = ToolAuthorizationPipeline::empty();
		let call = CallDescriptor::new("c1", "flaky", json!({}));

		let err = pipeline.invoke_tool(&tool, json!({}), &call).await.unwrap_err();
		assert!(matches!(err, InvokerError::ExecutionFailed { .. }));
		assert!(err.to_string().contains("disk full"));
	}

	#[tokio::test]
	async fn test_registered_filter_applies_to_later_calls_only() {
		let pipeline = ToolAuthorizationPipeline::empty();
		let call = CallDescriptor::new("c1", "delete_file", json!({}));

		let snapshot = pipeline.filters();
		assert!(pipeline.authorize(&call).await.is_ok());

		pipeline.register_filter(Arc::new(DenyListFilter::new(["delete_file"])));

		assert!(snapshot.is_empty());
		assert_eq!(pipeline.len(), 1);
		assert!(pipeline.authorize(&call).await.unwrap_err().is_authorization_denied());
	}
}
