//! Per-run execution state.

use crate::orchestration::{RunOutcome, WorkflowMemory, WorkflowState, WorkflowTrigger};
use crate::provider::UsageLedger;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Writes approved changes somewhere durable.
#[async_trait]
pub trait ChangeApplier: Send + Sync {
    /// Persist the full content of every path in `changes`
    async fn apply(&self, changes: &BTreeMap<String, String>) -> Result<()>;
}

/// One state change, as recorded in the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// State before
    pub from: WorkflowState,
    /// Trigger that fired
    pub trigger: WorkflowTrigger,
    /// State after
    pub to: WorkflowState,
    /// Note from the step, or the failure message
    pub note: String,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Read-only view of a run, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Run identifier
    pub run_id: Uuid,
    /// Current state
    pub state: WorkflowState,
    /// Steps dispatched so far
    pub iteration_count: u32,
    /// Memory contents
    pub memory: WorkflowMemory,
    /// Model usage so far
    pub usage: UsageLedger,
    /// How the run ended, once it has
    pub outcome: Option<RunOutcome>,
}

/// Everything one run owns: goal, memory, state and bookkeeping.
///
/// Contexts are never shared between runs. Steps get `&mut` access for the
/// duration of their execution and can change memory and usage, but the
/// workflow state and iteration count are only moved by the state machine.
pub struct WorkflowContext {
    run_id: Uuid,
    task_goal: String,
    memory: WorkflowMemory,
    current_state: WorkflowState,
    iteration_count: u32,
    usage: UsageLedger,
    cancellation: CancellationToken,
    history: Vec<TransitionRecord>,
    outcome: Option<RunOutcome>,
    snapshot_tx: watch::Sender<RunSnapshot>,
}

impl WorkflowContext {
    /// Fresh context in the initial state
    pub fn new(task_goal: impl Into<String>) -> Self {
        Self::with_cancellation(task_goal, CancellationToken::new())
    }

    /// Fresh context observing `cancellation`
    pub fn with_cancellation(task_goal: impl Into<String>, cancellation: CancellationToken) -> Self {
        let run_id = Uuid::new_v4();
        let memory = WorkflowMemory::new();
        let (snapshot_tx, _) = watch::channel(RunSnapshot {
            run_id,
            state: WorkflowState::INITIAL,
            iteration_count: 0,
            memory: memory.clone(),
            usage: UsageLedger::default(),
            outcome: None,
        });

        Self {
            run_id,
            task_goal: task_goal.into(),
            memory,
            current_state: WorkflowState::INITIAL,
            iteration_count: 0,
            usage: UsageLedger::default(),
            cancellation,
            history: Vec::new(),
            outcome: None,
            snapshot_tx,
        }
    }

    /// Unique id of this run
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Goal the run is working toward
    pub fn task_goal(&self) -> &str {
        &self.task_goal
    }

    /// Artifacts, pending changes and review comments
    pub fn memory(&self) -> &WorkflowMemory {
        &self.memory
    }

    /// Mutable access for steps writing to memory
    pub fn memory_mut(&mut self) -> &mut WorkflowMemory {
        &mut self.memory
    }

    /// State the run is in
    pub fn current_state(&self) -> WorkflowState {
        self.current_state
    }

    /// Steps dispatched so far
    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    /// Model usage recorded by the steps of this run
    pub fn usage(&self) -> UsageLedger {
        self.usage
    }

    /// Add the usage of a model call made on behalf of this run
    pub fn record_usage(&mut self, usage: UsageLedger) {
        self.usage += usage;
    }

    /// Token observed by the machine and handed to model calls
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Request cancellation; takes effect at the next suspension point
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Transitions taken so far, oldest first
    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    /// Number of times the run entered `state`, the initial state included
    pub fn entries_into(&self, state: WorkflowState) -> usize {
        let initial = usize::from(state == WorkflowState::INITIAL);
        initial + self.history.iter().filter(|r| r.to == state).count()
    }

    /// How the run ended, once the machine has returned
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    /// Receiver that always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Snapshot of the current run state
    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            run_id: self.run_id,
            state: self.current_state,
            iteration_count: self.iteration_count,
            memory: self.memory.clone(),
            usage: self.usage,
            outcome: self.outcome.clone(),
        }
    }

    /// Hand the pending changes to `applier` if the run completed.
    ///
    /// Returns whether anything was applied.
    pub async fn apply_changes(&self, applier: &dyn ChangeApplier, outcome: &RunOutcome) -> Result<bool> {
        if !outcome.is_completed() || self.current_state != WorkflowState::Done {
            return Ok(false);
        }
        applier.apply(self.memory.pending_changes()).await?;
        Ok(true)
    }

    pub(crate) fn begin_iteration(&mut self) {
        self.iteration_count += 1;
        self.publish();
    }

    pub(crate) fn record_transition(&mut self, trigger: WorkflowTrigger, to: WorkflowState, note: impl Into<String>) {
        self.history.push(TransitionRecord {
            from: self.current_state,
            trigger,
            to,
            note: note.into(),
            at: Utc::now(),
        });
        self.current_state = to;
        self.publish();
    }

    pub(crate) fn fail(&mut self, note: impl Into<String>) {
        self.record_transition(WorkflowTrigger::FatalError, WorkflowState::Failed, note);
    }

    pub(crate) fn finish(&mut self, outcome: RunOutcome) -> RunOutcome {
        self.outcome = Some(outcome.clone());
        self.publish();
        outcome
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl std::fmt::Debug for WorkflowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowContext")
            .field("run_id", &self.run_id)
            .field("task_goal", &self.task_goal)
            .field("current_state", &self.current_state)
            .field("iteration_count", &self.iteration_count)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}
