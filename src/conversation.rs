use crate::catalog::AgentId;
use crate::gateway::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ─── Task results ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Succeeded,
    Failed,
}

/// Why a task resolved as Failed.
///
/// Dispatch failures never cross the dispatcher boundary as errors; they are
/// recovered into a result carrying one of these kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FailureKind {
    /// Skipped because the task was cancelled before dispatch.
    Cancelled,
    /// The gateway call failed (network error or non-success status).
    Gateway {
        status_code: Option<u16>,
        detail: String,
    },
    /// The event stream ended without a terminal response.
    Stream { detail: String },
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled before dispatch"),
            Self::Gateway {
                status_code: Some(code),
                detail,
            } => write!(f, "gateway returned status {code}: {detail}"),
            Self::Gateway {
                status_code: None,
                detail,
            } => write!(f, "gateway request failed: {detail}"),
            Self::Stream { detail } => write!(f, "stream ended abnormally: {detail}"),
        }
    }
}

/// Outcome of one task dispatch, owned by the conversation afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: String,
    pub agent: AgentId,
    /// The task's own goal text.
    pub goal: String,
    /// The exact context string the task was dispatched with: prerequisite
    /// results followed by the goal, newline-joined.
    pub instructions: String,
    pub output: String,
    pub status: TaskStatus,
    pub failure: Option<FailureKind>,
    pub token_usage: Option<TokenUsage>,
}

impl TaskResult {
    pub fn succeeded(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }
}

/// One (goal, result) pair handed to the re-planner as prerequisite
/// knowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalResult {
    pub goal: String,
    pub result: String,
}

// ─── Conversation log ────────────────────────────────────────────────────────

/// Append-only ordered log of task results for one plan execution.
///
/// Appends are serialized through the executor's step barrier, so the log
/// itself needs no locking. Queried by task_id for prerequisite context and
/// rendered to (goal, result) pairs for re-planning.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    entries: Vec<TaskResult>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, result: TaskResult) {
        self.entries.push(result);
    }

    pub fn results(&self) -> &[TaskResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest result recorded for a task. A re-dispatched task_id may have
    /// several entries; the newest one reflects its current outcome.
    pub fn get(&self, task_id: &str) -> Option<&TaskResult> {
        self.entries.iter().rev().find(|r| r.task_id == task_id)
    }

    pub fn has_succeeded(&self, task_id: &str) -> bool {
        self.get(task_id).is_some_and(TaskResult::succeeded)
    }

    /// The full log reduced to (goal, result) pairs for re-planning. Failed
    /// entries carry the failure description as their result so a re-plan
    /// can avoid repeating the approach.
    pub fn to_prerequisite_knowledge(&self) -> Vec<GoalResult> {
        self.entries
            .iter()
            .map(|entry| GoalResult {
                goal: entry.goal.clone(),
                result: match (&entry.status, &entry.failure) {
                    (TaskStatus::Succeeded, _) => entry.output.clone(),
                    (TaskStatus::Failed, Some(kind)) => kind.to_string(),
                    (TaskStatus::Failed, None) => "failed".to_string(),
                },
            })
            .collect()
    }
}

// ─── Derived execution status ────────────────────────────────────────────────

/// Where a plan execution stands, computed from the result log — never
/// stored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlanExecutionStatus {
    NotStarted,
    InProgress,
    Complete,
    Aborted,
}

impl PlanExecutionStatus {
    /// Derives the status of the tasks the current plan still expects.
    ///
    /// `expected` is the task universe of the plan as it stands now; results
    /// for tasks a re-plan dropped do not count against completion.
    pub fn derive<'a>(
        expected: impl IntoIterator<Item = &'a str>,
        conversation: &Conversation,
    ) -> Self {
        let latest: BTreeMap<&str, &TaskResult> = conversation
            .results()
            .iter()
            .map(|result| (result.task_id.as_str(), result))
            .collect();

        let mut resolved = 0_usize;
        let mut expected_count = 0_usize;
        for task_id in expected {
            expected_count += 1;
            match latest.get(task_id) {
                Some(result) if result.succeeded() => resolved += 1,
                Some(_) => return Self::Aborted,
                None => {}
            }
        }

        if expected_count == 0 {
            return Self::Complete;
        }
        if resolved == 0 && conversation.is_empty() {
            Self::NotStarted
        } else if resolved == expected_count {
            Self::Complete
        } else {
            Self::InProgress
        }
    }
}
