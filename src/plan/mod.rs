mod validate;

pub use validate::validate;

use crate::catalog::AgentId;
use crate::error::ValidationError;
use crate::planner::{PlannedStep, PlannedTask};
use serde::{Deserialize, Serialize};

// ─── Executable plan structure ───────────────────────────────────────────────

/// One unit of work assigned to one agent.
///
/// Immutable after creation: re-planning replaces tasks wholesale rather
/// than mutating them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub prerequisites: Vec<String>,
    pub goal: String,
    pub agent: AgentId,
}

/// Barrier-synchronized group of mutually independent tasks.
///
/// Invariant: every prerequisite of a task in step *n* belongs to a task in
/// some step strictly before *n*.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub step_number: u32,
    pub tasks: Vec<Task>,
}

/// Ordered sequence of steps produced for one goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub steps: Vec<Step>,
}

impl Task {
    fn try_from_planned(planned: PlannedTask) -> Result<Self, ValidationError> {
        let agent: AgentId =
            planned
                .task_agent
                .parse()
                .map_err(|_| ValidationError::UnknownAgent {
                    task_id: planned.task_id.clone(),
                    agent: planned.task_agent.clone(),
                })?;
        Ok(Self {
            task_id: planned.task_id,
            prerequisites: planned.prerequisite_tasks,
            goal: planned.task_goal,
            agent,
        })
    }
}

impl Plan {
    /// Builds an executable plan from a planner response.
    ///
    /// Steps are ordered by their declared number here, so execution order
    /// never depends on how the planner happened to list them. Otherwise only
    /// shape conversion happens; structural checks live in [`validate`]. A
    /// `task_agent` that is not in `name:version` form is the one
    /// conversion-time rejection.
    pub fn try_from_planned(steps: Vec<PlannedStep>) -> Result<Self, ValidationError> {
        let mut steps = steps
            .into_iter()
            .map(|step| {
                let tasks = step
                    .step_tasks
                    .into_iter()
                    .map(Task::try_from_planned)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Step {
                    step_number: step.step_number,
                    tasks,
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;
        steps.sort_by_key(|step| step.step_number);
        Ok(Self { steps })
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.steps.iter().flat_map(|step| step.tasks.iter())
    }

    pub fn task_count(&self) -> usize {
        self.steps.iter().map(|step| step.tasks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.task_count() == 0
    }
}
