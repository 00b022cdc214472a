use super::Plan;
use crate::catalog::AgentCatalog;
use crate::error::ValidationError;
use std::collections::BTreeMap;

/// Checks a plan's task graph before execution begins.
///
/// Checks run in order and short-circuit on the first failure:
/// 1. task_id uniqueness across the whole plan,
/// 2. every prerequisite names an existing task,
/// 3. no task is its own prerequisite,
/// 4. every assigned agent exists in the catalog,
/// 5. a task's step is strictly greater than every prerequisite's step.
///
/// Check 5 transitively guarantees acyclicity, since step numbers only
/// increase along prerequisite edges.
pub fn validate(plan: &Plan, catalog: &AgentCatalog) -> Result<(), ValidationError> {
    let mut step_of_task = BTreeMap::new();
    for step in &plan.steps {
        for task in &step.tasks {
            if step_of_task
                .insert(task.task_id.as_str(), step.step_number)
                .is_some()
            {
                return Err(ValidationError::DuplicateTaskId {
                    task_id: task.task_id.clone(),
                });
            }
        }
    }

    for task in plan.tasks() {
        for prerequisite in &task.prerequisites {
            if !step_of_task.contains_key(prerequisite.as_str()) {
                return Err(ValidationError::UnknownPrerequisite {
                    task_id: task.task_id.clone(),
                    prerequisite: prerequisite.clone(),
                });
            }
        }
    }

    for task in plan.tasks() {
        if task.prerequisites.iter().any(|p| *p == task.task_id) {
            return Err(ValidationError::SelfReference {
                task_id: task.task_id.clone(),
            });
        }
    }

    for task in plan.tasks() {
        if !catalog.contains(&task.agent) {
            return Err(ValidationError::UnknownAgent {
                task_id: task.task_id.clone(),
                agent: task.agent.to_string(),
            });
        }
    }

    for step in &plan.steps {
        for task in &step.tasks {
            for prerequisite in &task.prerequisites {
                let prerequisite_step = step_of_task[prerequisite.as_str()];
                if prerequisite_step >= step.step_number {
                    return Err(ValidationError::StepOrder {
                        task_id: task.task_id.clone(),
                        step: step.step_number,
                        prerequisite: prerequisite.clone(),
                        prerequisite_step,
                    });
                }
            }
        }
    }

    Ok(())
}
