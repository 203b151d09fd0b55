//! Integration test for resilient invocation and tool authorization
//!
//! Exercises the retry bound, usage accounting and the filter pipeline
//! through the public API only.

use anyhow::Result;
use async_trait::async_trait;
use codeloop::invoker::{
    AllowListFilter, AuthorizationFilter, CallDescriptor, DenyListFilter, FnTool,
    InvokerDefinition, InvokerSource, PermissionFilter, PredicateFilter,
    ToolAuthorizationPipeline, ToolRegistry,
};
use codeloop::observability::{RecordingSink, SinkLevel};
use codeloop::provider::{
    ChatRequest, ChatTransport, InvokeError, MessageRole, ResilientInvoker, RetryPolicy,
    TokenCallback, ToolBinding, ToolCallRequest, TransportResponse, UsageLedger,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

// Mock transport that never produces usable text
struct AlwaysEmpty {
    calls: AtomicUsize,
}

#[async_trait]
impl ChatTransport for AlwaysEmpty {
    async fn send(
        &self,
        _request: &ChatRequest,
        _on_token: Option<&TokenCallback>,
        _cancel: &CancellationToken,
    ) -> Result<TransportResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 0 {
            Ok(TransportResponse::text("   ").with_usage(10, 0))
        } else {
            Ok(TransportResponse::interrupted("partial").with_usage(10, 3))
        }
    }
}

// Mock transport replaying a script and recording requests
struct Scripted {
    script: Mutex<VecDeque<TransportResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl Scripted {
    fn new(script: Vec<TransportResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ChatTransport for Scripted {
    async fn send(
        &self,
        request: &ChatRequest,
        _on_token: Option<&TokenCallback>,
        _cancel: &CancellationToken,
    ) -> Result<TransportResponse> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self.script.lock().unwrap().pop_front().unwrap_or_default())
    }
}

fn counting_tool(name: &str, counter: Arc<AtomicUsize>) -> Arc<FnTool> {
    Arc::new(FnTool::new(
        InvokerDefinition::new_simple(name, "test tool", InvokerSource::Native),
        move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(json!({ "received": args }))
        },
    ))
}

fn request() -> ChatRequest {
    ChatRequest::prompt("write the file", Some("you are a developer"))
}

#[tokio::test]
async fn test_exhaustion_after_exactly_max_attempts() {
    for max_attempts in [1u32, 2, 3, 7] {
        let transport = Arc::new(AlwaysEmpty {
            calls: AtomicUsize::new(0),
        });
        let sink = Arc::new(RecordingSink::new());
        let invoker = ResilientInvoker::new(transport.clone(), sink.clone())
            .with_policy(RetryPolicy::new(max_attempts));

        let err = invoker
            .invoke(&request(), None, &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            InvokeError::ExhaustedRetries { attempts, .. } => assert_eq!(attempts, max_attempts),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), max_attempts as usize);
        assert_eq!(sink.messages(SinkLevel::Warn).len(), max_attempts as usize);

        // Every rejected attempt still counts toward usage
        let usage = invoker.total_usage();
        assert_eq!(usage.calls, max_attempts as u64);
        assert_eq!(usage.prompt_tokens, 10 * max_attempts as u64);
    }
}

#[tokio::test]
async fn test_usage_accumulates_across_invocations_in_any_order() {
    let transport = Scripted::new(vec![
        TransportResponse::text("").with_usage(5, 0).with_cost(0.001),
        TransportResponse::text("first").with_usage(40, 12).with_cost(0.002),
        TransportResponse::text("second").with_usage(30, 8),
    ]);
    let invoker = ResilientInvoker::new(transport, Arc::new(RecordingSink::new()));
    let cancel = CancellationToken::new();

    let first = invoker.invoke(&request(), None, &cancel).await.unwrap();
    let second = invoker.invoke(&request(), None, &cancel).await.unwrap();

    assert_eq!(first.text, "first");
    assert_eq!(first.usage.calls, 2);
    assert_eq!(first.usage.prompt_tokens, 45);
    assert_eq!(second.usage.calls, 1);

    let forward = first.usage + second.usage;
    let backward: UsageLedger = [second.usage, first.usage].into_iter().sum();
    assert_eq!(forward, backward);
    assert_eq!(invoker.total_usage(), forward);
    assert_eq!(forward.total_tokens(), 95);
}

#[tokio::test]
async fn test_first_denial_wins_and_function_never_runs() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tool = counting_tool("delete_file", counter.clone());
    let later_consulted = Arc::new(AtomicUsize::new(0));
    let seen = later_consulted.clone();

    let allow: Arc<dyn AuthorizationFilter> =
        Arc::new(AllowListFilter::new(["read_file", "delete_file"]));
    let deny: Arc<dyn AuthorizationFilter> = Arc::new(DenyListFilter::new(["delete_file"]));
    let audit: Arc<dyn AuthorizationFilter> = Arc::new(PredicateFilter::new(
        "audit",
        move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            true
        },
        |_| true,
    ));
    let pipeline = ToolAuthorizationPipeline::new(vec![allow, deny, audit]);

    let call = CallDescriptor::new("call_1", "delete_file", json!({ "path": "a.cs" }));
    let err = pipeline
        .invoke_tool(tool.as_ref(), call.arguments.clone(), &call)
        .await
        .unwrap_err();

    assert!(err.is_authorization_denied());
    assert!(err.to_string().contains("deny-list"));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(later_consulted.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unmatched_call_runs_once_with_original_arguments() {
    let counter = Arc::new(AtomicUsize::new(0));
    let tool = counting_tool("read_file", counter.clone());
    let deny: Arc<dyn AuthorizationFilter> = Arc::new(DenyListFilter::new(["delete_file"]));
    let pipeline = ToolAuthorizationPipeline::new(vec![deny]);

    let args = json!({ "path": "src/UserStore.cs", "lines": [1, 2] });
    let call = CallDescriptor::new("call_2", "read_file", args.clone());
    let result = pipeline.invoke_tool(tool.as_ref(), args.clone(), &call).await.unwrap();

    assert_eq!(result, json!({ "received": args }));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_filter_registered_later_applies_to_later_calls() {
    let pipeline = ToolAuthorizationPipeline::empty();
    let call = CallDescriptor::new("call_3", "run_tests", Value::Null);
    assert!(pipeline.authorize(&call).await.is_ok());

    let deny: Arc<dyn AuthorizationFilter> = Arc::new(DenyListFilter::new(["run_tests"]));
    pipeline.register_filter(deny);
    assert!(pipeline.authorize(&call).await.unwrap_err().is_authorization_denied());
}

#[tokio::test]
async fn test_model_tool_calls_go_through_pipeline() {
    let reads = Arc::new(AtomicUsize::new(0));
    let writes = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(counting_tool("read_file", reads.clone())).unwrap();
    registry.register(counting_tool("write_file", writes.clone())).unwrap();

    let sink = Arc::new(RecordingSink::with_permission(true));
    let permission: Arc<dyn AuthorizationFilter> =
        Arc::new(PermissionFilter::new(["write_file"], sink.clone()));
    let pipeline = ToolAuthorizationPipeline::new(vec![permission]);

    let transport = Scripted::new(vec![
        TransportResponse::tool_calls(vec![
            ToolCallRequest::new("c1", "read_file", json!({ "path": "IUserStore.cs" })),
            ToolCallRequest::new("c2", "write_file", json!({ "path": "UserStore.cs" })),
        ]),
        TransportResponse::text("done"),
    ]);
    let invoker = ResilientInvoker::new(transport.clone(), sink.clone())
        .with_tools(ToolBinding::new(Arc::new(registry), Arc::new(pipeline)));

    let result = invoker
        .invoke(&request(), None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.text, "done");
    assert_eq!(result.usage.calls, 2);
    assert_eq!(reads.load(Ordering::SeqCst), 1);
    assert_eq!(writes.load(Ordering::SeqCst), 1);

    let prompts = sink.permission_requests();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("write_file"));

    let requests = transport.requests.lock().unwrap();
    assert_eq!(requests[0].tools.len(), 2);
    let follow_up = &requests[1].messages;
    let tool_results: Vec<_> = follow_up
        .iter()
        .filter(|m| m.role == MessageRole::Tool)
        .collect();
    assert_eq!(tool_results.len(), 2);
    assert_eq!(tool_results[0].tool_call_id.as_deref(), Some("c1"));
}

#[tokio::test]
async fn test_refused_permission_aborts_invocation() {
    let writes = Arc::new(AtomicUsize::new(0));
    let mut registry = ToolRegistry::new();
    registry.register(counting_tool("write_file", writes.clone())).unwrap();

    let sink = Arc::new(RecordingSink::with_permission(false));
    let permission: Arc<dyn AuthorizationFilter> =
        Arc::new(PermissionFilter::new(["write_file"], sink.clone()));
    let pipeline = ToolAuthorizationPipeline::new(vec![permission]);
    let transport = Scripted::new(vec![
        TransportResponse::tool_calls(vec![ToolCallRequest::new(
            "c1",
            "write_file",
            json!({ "path": "UserStore.cs" }),
        )]),
        TransportResponse::text("should not be reached"),
    ]);
    let invoker = ResilientInvoker::new(transport.clone(), sink.clone())
        .with_policy(RetryPolicy::new(5))
        .with_tools(ToolBinding::new(Arc::new(registry), Arc::new(pipeline)));

    let err = invoker
        .invoke(&request(), None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(err.is_authorization_denied());
    assert_eq!(writes.load(Ordering::SeqCst), 0);
    assert_eq!(transport.requests.lock().unwrap().len(), 1);
    assert_eq!(sink.permission_requests().len(), 1);
}

#[tokio::test]
async fn test_cancelled_token_stops_before_first_call() {
    let transport = Scripted::new(vec![TransportResponse::text("never")]);
    let invoker = ResilientInvoker::new(transport.clone(), Arc::new(RecordingSink::new()));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = invoker.invoke(&request(), None, &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(transport.requests.lock().unwrap().is_empty());
}
