use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use taskweave::catalog::{AgentCatalog, AgentDescriptor, AgentId};
use taskweave::error::ValidationError;
use taskweave::plan::{Plan, Step, Task, validate};

fn catalog() -> AgentCatalog {
    AgentCatalog::new(vec![AgentDescriptor::new(
        AgentId::new("worker", "0.1"),
        "does work",
    )])
}

/// Builds a random layered plan: tasks in layer n only depend on tasks from
/// strictly earlier layers, which is exactly the structure the step
/// invariant demands.
fn random_layered_plan(rng: &mut StdRng) -> Plan {
    let layer_count = rng.random_range(1..=5);
    let mut steps = Vec::new();
    let mut earlier_task_ids: Vec<String> = Vec::new();
    let mut next_task = 0_u32;

    for layer in 1..=layer_count {
        let width = rng.random_range(1..=4);
        let mut tasks = Vec::new();
        for _ in 0..width {
            let task_id = format!("t{next_task}");
            next_task += 1;

            let mut prerequisites = Vec::new();
            if !earlier_task_ids.is_empty() {
                let picks = rng.random_range(0..=earlier_task_ids.len().min(3));
                for _ in 0..picks {
                    let pick =
                        earlier_task_ids[rng.random_range(0..earlier_task_ids.len())].clone();
                    if !prerequisites.contains(&pick) {
                        prerequisites.push(pick);
                    }
                }
            }

            tasks.push(Task {
                task_id,
                prerequisites,
                goal: "generated work".into(),
                agent: AgentId::new("worker", "0.1"),
            });
        }

        earlier_task_ids.extend(tasks.iter().map(|t| t.task_id.clone()));
        steps.push(Step {
            step_number: layer,
            tasks,
        });
    }

    Plan { steps }
}

/// Independent check of the step invariant, written directly from its
/// definition rather than through the validator.
fn step_invariant_holds(plan: &Plan) -> bool {
    let step_of: BTreeMap<&str, u32> = plan
        .steps
        .iter()
        .flat_map(|step| {
            step.tasks
                .iter()
                .map(move |task| (task.task_id.as_str(), step.step_number))
        })
        .collect();

    plan.steps.iter().all(|step| {
        step.tasks.iter().all(|task| {
            task.prerequisites
                .iter()
                .all(|p| step_of.get(p.as_str()).is_some_and(|&s| s < step.step_number))
        })
    })
}

#[test]
fn random_layered_plans_always_satisfy_the_step_invariant() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let catalog = catalog();

    for _ in 0..200 {
        let plan = random_layered_plan(&mut rng);
        assert!(step_invariant_holds(&plan));
        assert!(
            validate(&plan, &catalog).is_ok(),
            "validator rejected a well-layered plan: {plan:?}"
        );
    }
}

#[test]
fn moving_a_dependent_task_earlier_always_breaks_validation() {
    let mut rng = StdRng::seed_from_u64(0xbad5eed);
    let catalog = catalog();
    let mut mutations_checked = 0;

    for _ in 0..200 {
        let plan = random_layered_plan(&mut rng);

        // Find a task with at least one prerequisite and move it into the
        // same step as one of its prerequisites.
        let Some((task, prerequisite)) = plan.tasks().find_map(|task| {
            task.prerequisites
                .first()
                .map(|p| (task.clone(), p.clone()))
        }) else {
            continue;
        };

        let prerequisite_step = plan
            .steps
            .iter()
            .find(|step| step.tasks.iter().any(|t| t.task_id == prerequisite))
            .map(|step| step.step_number)
            .unwrap();

        let mut mutated: Vec<Step> = plan
            .steps
            .iter()
            .map(|step| Step {
                step_number: step.step_number,
                tasks: step
                    .tasks
                    .iter()
                    .filter(|t| t.task_id != task.task_id)
                    .cloned()
                    .collect(),
            })
            .collect();
        for step in &mut mutated {
            if step.step_number == prerequisite_step {
                step.tasks.push(task.clone());
            }
        }
        let mutated = Plan { steps: mutated };

        assert!(
            matches!(
                validate(&mutated, &catalog),
                Err(ValidationError::StepOrder { .. })
            ),
            "mutated plan should violate step ordering: {mutated:?}"
        );
        mutations_checked += 1;
    }

    assert!(mutations_checked > 50, "generator produced too few dependent tasks");
}
