//! Authorization filters consulted before a tool runs.

use crate::invoker::InvokerSource;
use crate::observability::InteractionSink;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// What a filter sees about a pending call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDescriptor {
	/// Identifier the model assigned to the call.
	pub call_id: String,
	/// Function being called.
	pub function_name: String,
	/// Model-supplied arguments.
	pub arguments: Value,
	/// Origin of the function.
	pub source: InvokerSource,
}

impl CallDescriptor {
	/// Describe a call to a native function.
	pub fn new(call_id: impl Into<String>, function_name: impl Into<String>, arguments: Value) -> Self {
		Self {
			call_id: call_id.into(),
			function_name: function_name.into(),
			arguments,
			source: InvokerSource::Native,
		}
	}

	/// Set the source.
	pub fn with_source(mut self, source: InvokerSource) -> Self {
		self.source = source;
		self
	}
}

/// A predicate plus decision pair gating tool execution.
///
/// Filters must not keep per-call mutable state unless it is internally
/// synchronized; one filter instance serves concurrent runs.
#[async_trait]
pub trait AuthorizationFilter: Send + Sync {
	/// Name reported when this filter denies a call.
	fn name(&self) -> &str;

	/// Whether this filter has an opinion on the call.
	fn matches(&self, call: &CallDescriptor) -> bool;

	/// Decide a call this filter matched. `false` denies it.
	async fn authorize(&self, call: &CallDescriptor) -> bool;
}

fn name_set<I, S>(names: I) -> HashSet<String>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	names.into_iter().map(Into::into).collect()
}

/// Denies every call to the listed functions.
#[derive(Debug, Clone)]
pub struct DenyListFilter {
	names: HashSet<String>,
}

impl DenyListFilter {
	/// Deny the given function names.
	pub fn new<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { names: name_set(names) }
	}
}

#[async_trait]
impl AuthorizationFilter for DenyListFilter {
	fn name(&self) -> &str {
		"deny-list"
	}

	fn matches(&self, call: &CallDescriptor) -> bool {
		self.names.contains(&call.function_name)
	}

	async fn authorize(&self, _call: &CallDescriptor) -> bool {
		false
	}
}

/// Matches every call and allows only the listed functions.
#[derive(Debug, Clone)]
pub struct AllowListFilter {
	names: HashSet<String>,
}

impl AllowListFilter {
	/// Allow only the given function names.
	pub fn new<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self { names: name_set(names) }
	}
}

#[async_trait]
impl AuthorizationFilter for AllowListFilter {
	fn name(&self) -> &str {
		"allow-list"
	}

	fn matches(&self, _call: &CallDescriptor) -> bool {
		true
	}

	async fn authorize(&self, call: &CallDescriptor) -> bool {
		self.names.contains(&call.function_name)
	}
}

/// Asks a human, through the interaction sink, before the listed functions run.
pub struct PermissionFilter {
	names: HashSet<String>,
	sink: Arc<dyn InteractionSink>,
}

impl PermissionFilter {
	/// Require permission for the given function names.
	pub fn new<I, S>(names: I, sink: Arc<dyn InteractionSink>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			names: name_set(names),
			sink,
		}
	}
}

#[async_trait]
impl AuthorizationFilter for PermissionFilter {
	fn name(&self) -> &str {
		"permission"
	}

	fn matches(&self, call: &CallDescriptor) -> bool {
		self.names.contains(&call.function_name)
	}

	async fn authorize(&self, call: &CallDescriptor) -> bool {
		let prompt = format!(
			"The model wants to run {} ({}) with arguments {}. Allow?",
			call.function_name, call.source, call.arguments
		);
		self.sink.request_permission(&prompt).await
	}
}

type Predicate = dyn Fn(&CallDescriptor) -> bool + Send + Sync;

/// Filter built from two closures.
pub struct PredicateFilter {
	name: String,
	matches: Box<Predicate>,
	authorize: Box<Predicate>,
}

impl PredicateFilter {
	/// Create a filter named `name`.
	pub fn new<M, A>(name: impl Into<String>, matches: M, authorize: A) -> Self
	where
		M: Fn(&CallDescriptor) -> bool + Send + Sync + 'static,
		A: Fn(&CallDescriptor) -> bool + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			matches: Box::new(matches),
			authorize: Box::new(authorize),
		}
	}
}

#[async_trait]
impl AuthorizationFilter for PredicateFilter {
	fn name(&self) -> &str {
		&self.name
	}

	fn matches(&self, call: &CallDescriptor) -> bool {
		(self.matches)(call)
	}

	async fn authorize(&self, call: &CallDescriptor) -> bool {
		(self.authorize)(call)
	}
}
