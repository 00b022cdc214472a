mod remote;

pub use remote::RemotePlanningAgent;

use crate::catalog::{AgentCatalog, AgentSummary};
use crate::conversation::{Conversation, GoalResult};
use crate::error::{GatewayError, PlanningError};
use crate::plan::{Plan, validate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ─── Planning wire types ─────────────────────────────────────────────────────

/// Task as the planning collaborator declares it: agent referenced by
/// `name:version` string, prerequisites by task id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub task_id: String,
    #[serde(default)]
    pub prerequisite_tasks: Vec<String>,
    pub task_goal: String,
    pub task_agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub step_number: u32,
    pub step_tasks: Vec<PlannedTask>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratePlanRequest {
    pub overall_goal: String,
    pub agent_list: Vec<AgentSummary>,
    /// Present on re-planning: the conversation so far reduced to
    /// (goal, result) pairs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prerequisite_knowledge: Option<Vec<GoalResult>>,
}

/// `steps` is present and well-formed only when `can_succeed` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratePlanResponse {
    pub can_succeed: bool,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub steps: Option<Vec<PlannedStep>>,
}

// ─── Planning collaborator ───────────────────────────────────────────────────

#[async_trait]
pub trait PlanningAgent: Send + Sync {
    async fn generate_plan(
        &self,
        request: &GeneratePlanRequest,
    ) -> Result<GeneratePlanResponse, GatewayError>;
}

// ─── Plan builder ────────────────────────────────────────────────────────────

/// Turns (goal, catalog, optional conversation) into a validated plan by
/// delegating generation to the planning collaborator.
///
/// A `can_succeed: false` answer surfaces as [`PlanningError::Unreachable`]
/// without retrying; a structurally bad answer surfaces as
/// [`PlanningError::Malformed`]. Either way nothing has been dispatched.
pub struct PlanBuilder {
    planning_agent: Arc<dyn PlanningAgent>,
    catalog: AgentCatalog,
}

impl PlanBuilder {
    pub fn new(planning_agent: Arc<dyn PlanningAgent>, catalog: AgentCatalog) -> Self {
        Self {
            planning_agent,
            catalog,
        }
    }

    pub fn catalog(&self) -> &AgentCatalog {
        &self.catalog
    }

    pub async fn build_plan(
        &self,
        goal: &str,
        conversation: Option<&Conversation>,
    ) -> Result<Plan, PlanningError> {
        let request = GeneratePlanRequest {
            overall_goal: goal.to_string(),
            agent_list: self.catalog.summaries(),
            prerequisite_knowledge: conversation.map(Conversation::to_prerequisite_knowledge),
        };

        let response = self.planning_agent.generate_plan(&request).await?;
        if !response.can_succeed {
            return Err(PlanningError::Unreachable {
                reasoning: response
                    .reasoning
                    .unwrap_or_else(|| "no reasoning given".to_string()),
            });
        }

        let steps = response.steps.ok_or(PlanningError::MissingSteps)?;
        let plan = Plan::try_from_planned(steps)?;
        validate(&plan, &self.catalog)?;

        tracing::debug!(
            steps = plan.steps.len(),
            tasks = plan.task_count(),
            "plan accepted"
        );
        Ok(plan)
    }

    /// Same shape as [`Self::build_plan`], seeded with the full conversation
    /// so the revised plan can avoid repeating failed approaches. The caller
    /// owns the attempt bound.
    pub async fn replan(
        &self,
        goal: &str,
        conversation: &Conversation,
    ) -> Result<Plan, PlanningError> {
        self.build_plan(goal, Some(conversation)).await
    }
}
