//! The workflow state machine.
//!
//! The machine owns nothing but its steps and limits. Each run is driven
//! through a caller-owned [`WorkflowContext`], so any number of runs can
//! execute concurrently against one machine as long as each has its own
//! context.
//!
//! One iteration of [`WorkflowStateMachine::run`]:
//! 1. stop if the state is terminal
//! 2. stop with `Cancelled` if cancellation was requested
//! 3. fail with `IterationBudgetExhausted` if the cap is reached
//! 4. dispatch the step registered for the current state
//! 5. stop with `Cancelled` if cancellation was requested while it ran
//! 6. map the step result to a trigger and take the transition

use crate::observability::InteractionSink;
use crate::orchestration::{
    transition, AgentExecutionResult, AgentStep, FailureReason, RunOutcome, WorkflowContext,
    WorkflowError, WorkflowState,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Limits applied to every run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Maximum step dispatches per run
    pub max_iterations: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_iterations: 20 }
    }
}

impl RuntimeConfig {
    /// Config with the given iteration cap
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    /// Reject a zero cap
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.max_iterations == 0 {
            return Err(WorkflowError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

const WORKING_STATES: [WorkflowState; 3] = [
    WorkflowState::Inspecting,
    WorkflowState::Coding,
    WorkflowState::Reviewing,
];

/// Dispatches steps by state until the run reaches `Done` or `Failed`.
pub struct WorkflowStateMachine {
    steps: HashMap<WorkflowState, Arc<dyn AgentStep>>,
    config: RuntimeConfig,
    sink: Arc<dyn InteractionSink>,
}

impl WorkflowStateMachine {
    /// Assemble a machine from one step per working state.
    ///
    /// # Errors
    /// Fails when a working state has no step, two steps share a state, a
    /// step targets a terminal state, or the config is invalid.
    pub fn new(
        steps: Vec<Arc<dyn AgentStep>>,
        config: RuntimeConfig,
        sink: Arc<dyn InteractionSink>,
    ) -> Result<Self, WorkflowError> {
        config.validate()?;

        let mut by_state: HashMap<WorkflowState, Arc<dyn AgentStep>> = HashMap::new();
        for step in steps {
            let state = step.target_state();
            if state.is_terminal() {
                return Err(WorkflowError::TerminalStep {
                    step: step.name().to_string(),
                    state,
                });
            }
            if by_state.insert(state, step).is_some() {
                return Err(WorkflowError::DuplicateStep(state));
            }
        }

        if let Some(missing) = WORKING_STATES.iter().find(|s| !by_state.contains_key(*s)) {
            return Err(WorkflowError::MissingStep(*missing));
        }

        Ok(Self {
            steps: by_state,
            config,
            sink,
        })
    }

    /// Runtime limits this machine was built with
    pub fn config(&self) -> RuntimeConfig {
        self.config
    }

    /// Step registered for `state`
    pub fn step_for(&self, state: WorkflowState) -> Option<&Arc<dyn AgentStep>> {
        self.steps.get(&state)
    }

    /// Drive `context` until a terminal state or cancellation.
    ///
    /// The outcome is also stored on the context. Calling `run` again on a
    /// finished context returns the stored outcome without dispatching.
    pub async fn run(&self, context: &mut WorkflowContext) -> RunOutcome {
        if let Some(outcome) = context.outcome() {
            return outcome.clone();
        }

        tracing::info!(
            run_id = %context.run_id(),
            goal = context.task_goal(),
            max_iterations = self.config.max_iterations,
            "workflow run started"
        );
        self.sink
            .run_started(&context.run_id().to_string(), context.task_goal());

        loop {
            let state = context.current_state();
            match state {
                WorkflowState::Done => return self.complete(context),
                WorkflowState::Failed => {
                    let reason = FailureReason::StepError {
                        step: "workflow".to_string(),
                        message: "run was already failed".to_string(),
                    };
                    return context.finish(RunOutcome::Failed(reason));
                }
                _ => {}
            }

            if context.is_cancelled() {
                return self.cancelled(context);
            }

            if context.iteration_count() >= self.config.max_iterations {
                let reason = FailureReason::IterationBudgetExhausted {
                    limit: self.config.max_iterations,
                };
                return self.fail(context, reason);
            }

            let Some(step) = self.steps.get(&state).cloned() else {
                let reason = FailureReason::StepError {
                    step: state.to_string(),
                    message: WorkflowError::MissingStep(state).to_string(),
                };
                return self.fail(context, reason);
            };

            context.begin_iteration();
            tracing::debug!(
                run_id = %context.run_id(),
                step = step.name(),
                %state,
                iteration = context.iteration_count(),
                "dispatching step"
            );

            let result = step.execute(context).await;

            if context.is_cancelled() {
                return self.cancelled(context);
            }

            let (trigger, note) = match result {
                Ok(AgentExecutionResult::Advance { trigger, note }) => (trigger, note),
                Ok(AgentExecutionResult::Error(message)) => {
                    let reason = FailureReason::StepError {
                        step: step.name().to_string(),
                        message,
                    };
                    return self.fail(context, reason);
                }
                Err(e) => {
                    let reason = FailureReason::StepError {
                        step: step.name().to_string(),
                        message: format!("{:#}", e),
                    };
                    return self.fail(context, reason);
                }
            };

            match transition(state, trigger) {
                Some(WorkflowState::Failed) => {
                    let reason = FailureReason::StepError {
                        step: step.name().to_string(),
                        message: note,
                    };
                    return self.fail(context, reason);
                }
                Some(next) => {
                    self.sink
                        .transition(step.name(), state.name(), trigger.name(), next.name(), &note);
                    context.record_transition(trigger, next, note);
                }
                None => {
                    let reason = FailureReason::InvalidTransition { state, trigger };
                    return self.fail(context, reason);
                }
            }
        }
    }

    fn complete(&self, context: &mut WorkflowContext) -> RunOutcome {
        self.sink.run_finished(&format!(
            "Workflow completed after {} iterations with {} pending change(s)",
            context.iteration_count(),
            context.memory().pending_changes().len()
        ));
        tracing::info!(run_id = %context.run_id(), "workflow run completed");
        context.finish(RunOutcome::Completed)
    }

    fn cancelled(&self, context: &mut WorkflowContext) -> RunOutcome {
        self.sink.run_finished(&format!(
            "Workflow cancelled in state {} after {} iterations",
            context.current_state(),
            context.iteration_count()
        ));
        tracing::info!(run_id = %context.run_id(), "workflow run cancelled");
        context.finish(RunOutcome::Cancelled)
    }

    fn fail(&self, context: &mut WorkflowContext, reason: FailureReason) -> RunOutcome {
        let message = reason.to_string();
        self.sink.error(&format!("Workflow failed: {}", message));
        tracing::warn!(run_id = %context.run_id(), reason = %message, "workflow run failed");
        context.fail(message);
        context.finish(RunOutcome::Failed(reason))
    }
}

#[cfg(test)]
mod tests;
