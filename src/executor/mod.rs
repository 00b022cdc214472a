mod dispatch;

pub use dispatch::AgentDispatcher;

use crate::conversation::{
    Conversation, FailureKind, GoalResult, PlanExecutionStatus, TaskResult, TaskStatus,
};
use crate::error::PlanningError;
use crate::events::{EventSink, ExecutionEvent, NullEventSink};
use crate::gateway::AgentGateway;
use crate::plan::{Plan, Step, Task};
use crate::planner::PlanBuilder;
use crate::state::TaskStateManager;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

// ─── Settings and report ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Upper bound on concurrently dispatched tasks within one step.
    pub max_concurrency: usize,
    /// How many re-plans one execution may consume before aborting.
    pub max_replan_attempts: u32,
    /// Dispatch through the gateway's streaming endpoint.
    pub streaming: bool,
    /// Pulse interval while a unary dispatch is in flight. `None` disables.
    pub keepalive_interval: Option<Duration>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_replan_attempts: 2,
            streaming: true,
            keepalive_interval: Some(Duration::from_secs(15)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum AbortReason {
    ReplansExhausted { attempts: u32 },
    PlanningFailed { detail: String },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplansExhausted { attempts } => {
                write!(f, "re-plan attempts exhausted after {attempts}")
            }
            Self::PlanningFailed { detail } => write!(f, "re-planning failed: {detail}"),
        }
    }
}

/// What one execution produced: the full audit trail plus the derived
/// status. On abort the partial conversation is preserved here, so no work
/// is silently lost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: String,
    pub status: PlanExecutionStatus,
    pub conversation: Conversation,
    pub abort_reason: Option<AbortReason>,
    pub started_at: String,
    pub finished_at: String,
}

impl ExecutionReport {
    /// The newest successful result — what the original goal resolved to.
    pub fn final_output(&self) -> Option<&TaskResult> {
        self.conversation
            .results()
            .iter()
            .rev()
            .find(|result| result.succeeded())
    }
}

// ─── Executor ────────────────────────────────────────────────────────────────

/// Walks a plan in dependency order, dispatching each step's tasks
/// concurrently and re-planning on failure.
///
/// A step boundary is a synchronization barrier: every task in the current
/// step resolves before the next step starts, which by the step invariant
/// means a task's prerequisites always have recorded results by the time it
/// dispatches. The conversation is appended only here, after the barrier, in
/// the step's declared task order.
pub struct PlanExecutor {
    builder: PlanBuilder,
    dispatcher: Arc<AgentDispatcher>,
    state: Arc<TaskStateManager>,
    sink: Arc<dyn EventSink>,
    settings: ExecutorSettings,
}

impl PlanExecutor {
    pub fn new(
        builder: PlanBuilder,
        gateway: Arc<dyn AgentGateway>,
        settings: ExecutorSettings,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let state = Arc::new(TaskStateManager::new());
        let dispatcher = Arc::new(AgentDispatcher::new(
            gateway,
            Arc::clone(&state),
            settings.streaming,
            settings.keepalive_interval,
        ));
        Self {
            builder,
            dispatcher,
            state,
            sink,
            settings,
        }
    }

    pub fn with_null_sink(
        builder: PlanBuilder,
        gateway: Arc<dyn AgentGateway>,
        settings: ExecutorSettings,
    ) -> Self {
        Self::new(builder, gateway, settings, Arc::new(NullEventSink))
    }

    /// Handle for external cancellation requests; safe to use from another
    /// task while an execution is in flight.
    pub fn state(&self) -> Arc<TaskStateManager> {
        Arc::clone(&self.state)
    }

    pub fn builder(&self) -> &PlanBuilder {
        &self.builder
    }

    /// Builds the initial plan for a goal, then executes it.
    pub async fn run(&self, goal: &str) -> Result<ExecutionReport, PlanningError> {
        let plan = self.builder.build_plan(goal, None).await?;
        Ok(self.execute(goal, plan).await)
    }

    /// Executes an already-validated plan for a goal.
    pub async fn execute(&self, goal: &str, plan: Plan) -> ExecutionReport {
        let run_id = format!("run_{}", Uuid::new_v4().simple());
        let started_at = Utc::now().to_rfc3339();
        tracing::info!(run = %run_id, tasks = plan.task_count(), "starting execution");
        self.sink
            .on_event(&ExecutionEvent::PlanReady { plan: plan.clone() })
            .await;

        let mut conversation = Conversation::new();
        let mut expected: BTreeSet<String> =
            plan.tasks().map(|task| task.task_id.clone()).collect();
        let mut remaining: VecDeque<Step> = plan.steps.into();
        let mut replans = 0_u32;
        let mut abort_reason = None;

        while let Some(step) = remaining.pop_front() {
            // Right after a re-plan the new structure may repeat task ids
            // that already succeeded; their recorded results are reused
            // instead of re-dispatching.
            let pending: Vec<Task> = step
                .tasks
                .iter()
                .filter(|task| !conversation.has_succeeded(&task.task_id))
                .cloned()
                .collect();
            if pending.is_empty() {
                continue;
            }

            tracing::debug!(step = step.step_number, tasks = pending.len(), "running step");
            let results = self.run_step(pending, &conversation).await;
            let step_failed = results.iter().any(|result| !result.succeeded());
            for result in results {
                conversation.append(result);
            }

            if !step_failed {
                continue;
            }

            replans += 1;
            if replans > self.settings.max_replan_attempts {
                let reason = AbortReason::ReplansExhausted {
                    attempts: self.settings.max_replan_attempts,
                };
                self.sink
                    .on_event(&ExecutionEvent::Error {
                        status_code: 500,
                        detail: reason.to_string(),
                    })
                    .await;
                abort_reason = Some(reason);
                break;
            }

            self.sink
                .on_event(&ExecutionEvent::Replanning {
                    attempt: replans,
                    detail: format!("step {} had failures", step.step_number),
                })
                .await;

            match self.builder.replan(goal, &conversation).await {
                Ok(new_plan) => {
                    tracing::info!(
                        run = %run_id,
                        attempt = replans,
                        tasks = new_plan.task_count(),
                        "re-plan accepted"
                    );
                    expected = conversation
                        .results()
                        .iter()
                        .filter(|result| result.succeeded())
                        .map(|result| result.task_id.clone())
                        .chain(new_plan.tasks().map(|task| task.task_id.clone()))
                        .collect();
                    self.sink
                        .on_event(&ExecutionEvent::PlanReady {
                            plan: new_plan.clone(),
                        })
                        .await;
                    remaining = new_plan.steps.into();
                }
                Err(error) => {
                    let reason = AbortReason::PlanningFailed {
                        detail: error.to_string(),
                    };
                    self.sink
                        .on_event(&ExecutionEvent::Error {
                            status_code: 500,
                            detail: reason.to_string(),
                        })
                        .await;
                    abort_reason = Some(reason);
                    break;
                }
            }
        }

        let status = if abort_reason.is_some() {
            PlanExecutionStatus::Aborted
        } else {
            PlanExecutionStatus::derive(expected.iter().map(String::as_str), &conversation)
        };
        tracing::info!(run = %run_id, %status, results = conversation.len(), "execution finished");
        self.sink
            .on_event(&ExecutionEvent::Finished { status })
            .await;

        ExecutionReport {
            run_id,
            status,
            conversation,
            abort_reason,
            started_at,
            finished_at: Utc::now().to_rfc3339(),
        }
    }

    /// Dispatches one step's tasks concurrently and waits for all of them —
    /// the barrier. Results come back in the step's declared task order.
    async fn run_step(&self, tasks: Vec<Task>, conversation: &Conversation) -> Vec<TaskResult> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (index, task) in tasks.iter().cloned().enumerate() {
            let prerequisites: Vec<GoalResult> = task
                .prerequisites
                .iter()
                .filter_map(|id| conversation.get(id))
                .filter(|result| result.succeeded())
                .map(|result| GoalResult {
                    goal: result.goal.clone(),
                    result: result.output.clone(),
                })
                .collect();

            let dispatcher = Arc::clone(&self.dispatcher);
            let sink = Arc::clone(&self.sink);
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let result = dispatcher
                    .dispatch(&task, &prerequisites, sink.as_ref())
                    .await;
                (index, result)
            });
        }

        let mut slots: Vec<Option<TaskResult>> = vec![None; tasks.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(join_error) => {
                    tracing::error!("dispatch task panicked: {join_error}");
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    let task = &tasks[index];
                    TaskResult {
                        task_id: task.task_id.clone(),
                        agent: task.agent.clone(),
                        goal: task.goal.clone(),
                        instructions: task.goal.clone(),
                        output: String::new(),
                        status: TaskStatus::Failed,
                        failure: Some(FailureKind::Gateway {
                            status_code: None,
                            detail: "dispatch task panicked".to_string(),
                        }),
                        token_usage: None,
                    }
                })
            })
            .collect()
    }
}
