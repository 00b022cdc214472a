use crate::conversation::Conversation;
use crate::plan::Plan;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default, Clone)]
struct TaskRuntimeState {
    cancelled: bool,
    started: bool,
}

/// Per-task liveness bookkeeping, independent of plan structure.
///
/// The cancellation map is the only shared mutable resource in the engine:
/// in-flight dispatches read it while external cancellation requests write
/// it, so every operation takes the one lock. Cancellation is advisory — a
/// task already past its pre-dispatch check runs to completion, but no new
/// dispatch starts once its flag is set.
#[derive(Debug, Default)]
pub struct TaskStateManager {
    tasks: Mutex<HashMap<String, TaskRuntimeState>>,
}

impl TaskStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_cancelled(&self, task_id: &str) {
        let mut tasks = self
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.entry(task_id.to_string()).or_default().cancelled = true;
    }

    pub fn is_cancelled(&self, task_id: &str) -> bool {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.get(task_id).is_some_and(|state| state.cancelled)
    }

    pub fn record_task_started(&self, task_id: &str) {
        let mut tasks = self
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.entry(task_id.to_string()).or_default().started = true;
    }

    pub fn has_started(&self, task_id: &str) -> bool {
        let tasks = self
            .tasks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.get(task_id).is_some_and(|state| state.started)
    }

    /// Whole-plan cancellation: flags every task that does not yet have a
    /// recorded result. Already-dispatched remote calls still run to
    /// completion.
    pub fn cancel_remaining(&self, plan: &Plan, conversation: &Conversation) {
        for task in plan.tasks() {
            if conversation.get(&task.task_id).is_none() {
                self.set_cancelled(&task.task_id);
            }
        }
    }
}
