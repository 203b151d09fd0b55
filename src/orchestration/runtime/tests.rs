use super::*;
use crate::observability::{Logger, RecordingSink, SinkLevel};
use crate::orchestration::WorkflowTrigger;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Step that always advances with a fixed trigger.
struct FixedStep {
    name: &'static str,
    state: WorkflowState,
    trigger: WorkflowTrigger,
}

#[async_trait]
impl AgentStep for FixedStep {
    fn name(&self) -> &str {
        self.name
    }

    fn target_state(&self) -> WorkflowState {
        self.state
    }

    async fn execute(&self, context: &mut WorkflowContext) -> Result<AgentExecutionResult> {
        if self.state == WorkflowState::Coding {
            let n = context.iteration_count();
            context
                .memory_mut()
                .stage_change("lib.rs", format!("// revision {}", n));
        }
        Ok(AgentExecutionResult::advance(self.trigger, self.name))
    }
}

/// Reviewer that rejects on odd calls and approves on even ones, or always
/// rejects.
struct Reviewer {
    calls: AtomicU32,
    always_reject: bool,
}

impl Reviewer {
    fn alternating() -> Self {
        Self {
            calls: AtomicU32::new(0),
            always_reject: false,
        }
    }

    fn rejecting() -> Self {
        Self {
            calls: AtomicU32::new(0),
            always_reject: true,
        }
    }
}

#[async_trait]
impl AgentStep for Reviewer {
    fn name(&self) -> &str {
        "reviewer"
    }

    fn target_state(&self) -> WorkflowState {
        WorkflowState::Reviewing
    }

    async fn execute(&self, context: &mut WorkflowContext) -> Result<AgentExecutionResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.always_reject || call % 2 == 1 {
            context
                .memory_mut()
                .add_review_comment(format!("rejected on call {}", call));
            return Ok(AgentExecutionResult::advance(WorkflowTrigger::CodeRejected, "rejected"));
        }
        Ok(AgentExecutionResult::advance(WorkflowTrigger::CodeApproved, "approved"))
    }
}

/// Coder that blocks until cancelled, then reports success anyway.
struct StallingCoder;

#[async_trait]
impl AgentStep for StallingCoder {
    fn name(&self) -> &str {
        "coder"
    }

    fn target_state(&self) -> WorkflowState {
        WorkflowState::Coding
    }

    async fn execute(&self, context: &mut WorkflowContext) -> Result<AgentExecutionResult> {
        context.cancellation_token().cancelled().await;
        context.memory_mut().stage_change("late.rs", "finished after cancel");
        Ok(AgentExecutionResult::advance(WorkflowTrigger::CodeGenerated, "done"))
    }
}

/// Step that returns whatever it was built with.
struct ScriptedStep {
    state: WorkflowState,
    result: fn() -> Result<AgentExecutionResult>,
}

#[async_trait]
impl AgentStep for ScriptedStep {
    fn name(&self) -> &str {
        "scripted"
    }

    fn target_state(&self) -> WorkflowState {
        self.state
    }

    async fn execute(&self, _context: &mut WorkflowContext) -> Result<AgentExecutionResult> {
        (self.result)()
    }
}

fn inspector() -> Arc<dyn AgentStep> {
    Arc::new(FixedStep {
        name: "inspector",
        state: WorkflowState::Inspecting,
        trigger: WorkflowTrigger::InspectComplete,
    })
}

fn coder() -> Arc<dyn AgentStep> {
    Arc::new(FixedStep {
        name: "coder",
        state: WorkflowState::Coding,
        trigger: WorkflowTrigger::CodeGenerated,
    })
}

fn machine(reviewer: Arc<dyn AgentStep>, max_iterations: u32) -> WorkflowStateMachine {
    WorkflowStateMachine::new(
        vec![inspector(), coder(), reviewer],
        RuntimeConfig::new(max_iterations),
        Arc::new(RecordingSink::new()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_reject_then_approve_reaches_done() {
    let machine = machine(Arc::new(Reviewer::alternating()), 20);
    let mut context = WorkflowContext::new("implement IUserStore");

    let outcome = machine.run(&mut context).await;

    assert_eq!(outcome, RunOutcome::Completed);
    assert_eq!(context.current_state(), WorkflowState::Done);
    assert_eq!(context.entries_into(WorkflowState::Coding), 2);
    assert_eq!(context.memory().review_comments().len(), 1);
    // inspect, code, review, code, review
    assert_eq!(context.iteration_count(), 5);
    assert_eq!(context.memory().pending_changes()["lib.rs"], "// revision 4");
    assert_eq!(context.outcome(), Some(&RunOutcome::Completed));
}

#[tokio::test]
async fn test_logger_sink_records_each_transition() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("run.md");
    let logger = Arc::new(Logger::new(Some(&log_path), None).unwrap());
    let reviewer: Arc<dyn AgentStep> = Arc::new(Reviewer::alternating());
    let machine = WorkflowStateMachine::new(
        vec![inspector(), coder(), reviewer],
        RuntimeConfig::default(),
        logger,
    )
    .unwrap();
    let mut context = WorkflowContext::new("implement IUserStore");

    assert!(machine.run(&mut context).await.is_completed());

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("**Goal:** implement IUserStore"));
    assert_eq!(log.matches("### Transition").count(), 5);
    assert!(log.contains("**Trigger:** code_rejected"));
    assert!(log.contains("**To:** done"));
    assert!(log.contains("### Run Completed"));
}

#[tokio::test]
async fn test_always_reject_exhausts_budget_at_cap() {
    for cap in [1, 2, 5, 8] {
        let machine = machine(Arc::new(Reviewer::rejecting()), cap);
        let mut context = WorkflowContext::new("loop forever");

        let outcome = machine.run(&mut context).await;

        assert_eq!(
            outcome,
            RunOutcome::Failed(FailureReason::IterationBudgetExhausted { limit: cap })
        );
        assert_eq!(context.iteration_count(), cap);
        assert_eq!(context.current_state(), WorkflowState::Failed);
    }
}

#[tokio::test]
async fn test_step_error_fails_run() {
    let failing: Arc<dyn AgentStep> = Arc::new(ScriptedStep {
        state: WorkflowState::Reviewing,
        result: || Ok(AgentExecutionResult::error("verifier unavailable")),
    });
    let machine = machine(failing, 20);
    let mut context = WorkflowContext::new("goal");

    let outcome = machine.run(&mut context).await;

    assert_eq!(
        outcome,
        RunOutcome::Failed(FailureReason::StepError {
            step: "scripted".to_string(),
            message: "verifier unavailable".to_string(),
        })
    );
    let last = context.history().last().unwrap();
    assert_eq!(last.from, WorkflowState::Reviewing);
    assert_eq!(last.trigger, WorkflowTrigger::FatalError);
    // memory is left as the failing run wrote it
    assert!(context.memory().pending_changes().contains_key("lib.rs"));
}

#[tokio::test]
async fn test_collaborator_crash_is_step_error() {
    let crashing: Arc<dyn AgentStep> = Arc::new(ScriptedStep {
        state: WorkflowState::Reviewing,
        result: || Err(anyhow::anyhow!("connection refused")),
    });
    let machine = machine(crashing, 20);
    let mut context = WorkflowContext::new("goal");

    match machine.run(&mut context).await {
        RunOutcome::Failed(FailureReason::StepError { message, .. }) => {
            assert!(message.contains("connection refused"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn test_trigger_without_edge_is_invalid_transition() {
    let confused: Arc<dyn AgentStep> = Arc::new(ScriptedStep {
        state: WorkflowState::Reviewing,
        result: || Ok(AgentExecutionResult::advance(WorkflowTrigger::InspectComplete, "?")),
    });
    let machine = machine(confused, 20);
    let mut context = WorkflowContext::new("goal");

    assert_eq!(
        machine.run(&mut context).await,
        RunOutcome::Failed(FailureReason::InvalidTransition {
            state: WorkflowState::Reviewing,
            trigger: WorkflowTrigger::InspectComplete,
        })
    );
}

#[tokio::test]
async fn test_cancel_during_step_skips_transition() {
    let sink = Arc::new(RecordingSink::new());
    let stalling: Arc<dyn AgentStep> = Arc::new(StallingCoder);
    let reviewer: Arc<dyn AgentStep> = Arc::new(Reviewer::alternating());
    let machine = WorkflowStateMachine::new(
        vec![inspector(), stalling, reviewer],
        RuntimeConfig::default(),
        sink.clone(),
    )
    .unwrap();

    let token = CancellationToken::new();
    let mut context = WorkflowContext::with_cancellation("goal", token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
    });

    let outcome = machine.run(&mut context).await;
    canceller.await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(context.current_state(), WorkflowState::Coding);
    assert_eq!(context.history().len(), 1);
    assert!(sink.messages(SinkLevel::Error).is_empty());
}

#[tokio::test]
async fn test_cancel_before_start_dispatches_nothing() {
    let machine = machine(Arc::new(Reviewer::alternating()), 20);
    let mut context = WorkflowContext::new("goal");
    context.cancel();

    assert_eq!(machine.run(&mut context).await, RunOutcome::Cancelled);
    assert_eq!(context.iteration_count(), 0);
}

#[tokio::test]
async fn test_finished_context_is_not_rerun() {
    let machine = machine(Arc::new(Reviewer::alternating()), 20);
    let mut context = WorkflowContext::new("goal");

    assert!(machine.run(&mut context).await.is_completed());
    let iterations = context.iteration_count();
    assert!(machine.run(&mut context).await.is_completed());
    assert_eq!(context.iteration_count(), iterations);
}

#[tokio::test]
async fn test_concurrent_runs_keep_separate_memory() {
    let machine = Arc::new(machine(Arc::new(Reviewer::rejecting()), 3));

    let runs = (0..4).map(|i| {
        let machine = machine.clone();
        tokio::spawn(async move {
            let mut context = WorkflowContext::new(format!("goal {}", i));
            let outcome = machine.run(&mut context).await;
            (outcome, context)
        })
    });

    for handle in runs {
        let (outcome, context) = handle.await.unwrap();
        assert!(outcome.failure().is_some());
        // inspect, code, review(reject): exactly one comment per run
        assert_eq!(context.memory().review_comments().len(), 1);
    }
}

#[tokio::test]
async fn test_snapshot_published_to_subscribers() {
    let machine = machine(Arc::new(Reviewer::alternating()), 20);
    let mut context = WorkflowContext::new("goal");
    let rx = context.subscribe();

    machine.run(&mut context).await;

    let snapshot = rx.borrow().clone();
    assert_eq!(snapshot.state, WorkflowState::Done);
    assert_eq!(snapshot.outcome, Some(RunOutcome::Completed));
    assert_eq!(snapshot.memory.review_comments().len(), 1);
}

#[test]
fn test_construction_errors() {
    let sink: Arc<dyn crate::observability::InteractionSink> = Arc::new(RecordingSink::new());

    let missing = WorkflowStateMachine::new(
        vec![inspector(), coder()],
        RuntimeConfig::default(),
        sink.clone(),
    );
    assert_eq!(
        missing.err(),
        Some(WorkflowError::MissingStep(WorkflowState::Reviewing))
    );

    let duplicate = WorkflowStateMachine::new(
        vec![inspector(), coder(), coder()],
        RuntimeConfig::default(),
        sink.clone(),
    );
    assert_eq!(
        duplicate.err(),
        Some(WorkflowError::DuplicateStep(WorkflowState::Coding))
    );

    let reviewer: Arc<dyn AgentStep> = Arc::new(Reviewer::alternating());
    let zero = WorkflowStateMachine::new(
        vec![inspector(), coder(), reviewer],
        RuntimeConfig::new(0),
        sink,
    );
    assert!(matches!(zero.err(), Some(WorkflowError::InvalidConfig(_))));
}
