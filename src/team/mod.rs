use crate::catalog::{AgentCatalog, AgentId, AgentSummary};
use crate::conversation::{Conversation, GoalResult, TaskStatus};
use crate::error::{GatewayError, TeamError};
use crate::events::EventSink;
use crate::executor::AgentDispatcher;
use crate::gateway::{AgentGateway, AgentInput, ChatMessage, ChatRole};
use crate::plan::Task;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ─── Manager protocol ────────────────────────────────────────────────────────

/// One completed exchange as the manager sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMessage {
    pub task_id: String,
    pub agent_name: String,
    pub instructions: String,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerRequest {
    pub overall_goal: String,
    pub agent_list: Vec<AgentSummary>,
    pub conversation: Vec<TeamMessage>,
}

/// What the manager decided to do next. One payload shape per tag, decoded
/// exhaustively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "next_action",
    content = "action_detail",
    rename_all = "snake_case"
)]
pub enum ManagerAction {
    ProvideResult {
        result_task_id: String,
        result: String,
    },
    Abort {
        abort_reason: String,
    },
    AssignNewTask {
        task_id: String,
        agent_name: String,
        instructions: String,
    },
}

#[async_trait]
pub trait ManagerAgent: Send + Sync {
    async fn determine_next_action(
        &self,
        request: &ManagerRequest,
    ) -> Result<ManagerAction, GatewayError>;
}

/// Manager collaborator hosted behind the agent gateway, same transport
/// shape as the planning collaborator.
pub struct RemoteManagerAgent {
    agent: AgentId,
    gateway: Arc<dyn AgentGateway>,
}

impl RemoteManagerAgent {
    pub fn new(agent: AgentId, gateway: Arc<dyn AgentGateway>) -> Self {
        Self { agent, gateway }
    }
}

#[async_trait]
impl ManagerAgent for RemoteManagerAgent {
    async fn determine_next_action(
        &self,
        request: &ManagerRequest,
    ) -> Result<ManagerAction, GatewayError> {
        let payload =
            serde_json::to_string(request).map_err(|e| GatewayError::Decode(e.to_string()))?;
        let input = AgentInput {
            chat_history: vec![ChatMessage {
                role: ChatRole::User,
                content: payload,
            }],
        };

        let response = self.gateway.invoke(&self.agent, &input).await?;
        let structured = response.output_structured.ok_or_else(|| {
            GatewayError::Decode("manager agent returned no structured output".to_string())
        })?;
        serde_json::from_value(structured).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

// ─── Team executor ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TeamOutcome {
    pub result_task_id: String,
    pub result: String,
    pub conversation: Conversation,
}

/// Manager-driven execution: instead of a precomputed plan, a manager agent
/// assigns one task at a time against the conversation so far, until it
/// provides a result or aborts. Rounds are bounded to guarantee termination.
pub struct TeamExecutor {
    manager: Arc<dyn ManagerAgent>,
    dispatcher: Arc<AgentDispatcher>,
    catalog: AgentCatalog,
    sink: Arc<dyn EventSink>,
    max_rounds: u32,
}

impl TeamExecutor {
    pub fn new(
        manager: Arc<dyn ManagerAgent>,
        dispatcher: Arc<AgentDispatcher>,
        catalog: AgentCatalog,
        sink: Arc<dyn EventSink>,
        max_rounds: u32,
    ) -> Self {
        Self {
            manager,
            dispatcher,
            catalog,
            sink,
            max_rounds,
        }
    }

    pub async fn run(&self, goal: &str) -> Result<TeamOutcome, TeamError> {
        let mut conversation = Conversation::new();

        for round in 1..=self.max_rounds {
            let request = ManagerRequest {
                overall_goal: goal.to_string(),
                agent_list: self.catalog.summaries(),
                conversation: to_team_messages(&conversation),
            };
            let action = self.manager.determine_next_action(&request).await?;
            tracing::debug!(round, ?action, "manager decision");

            match action {
                ManagerAction::ProvideResult {
                    result_task_id,
                    result,
                } => {
                    return Ok(TeamOutcome {
                        result_task_id,
                        result,
                        conversation,
                    });
                }
                ManagerAction::Abort { abort_reason } => {
                    return Err(TeamError::ManagerAborted {
                        reason: abort_reason,
                    });
                }
                ManagerAction::AssignNewTask {
                    task_id,
                    agent_name,
                    instructions,
                } => {
                    let agent: AgentId = agent_name
                        .parse()
                        .map_err(|_| TeamError::UnknownAgent {
                            agent: agent_name.clone(),
                        })?;
                    if !self.catalog.contains(&agent) {
                        return Err(TeamError::UnknownAgent { agent: agent_name });
                    }

                    let task = Task {
                        task_id,
                        prerequisites: vec![],
                        goal: instructions,
                        agent,
                    };
                    let prerequisites = to_team_prerequisites(&conversation);
                    let result = self
                        .dispatcher
                        .dispatch(&task, &prerequisites, self.sink.as_ref())
                        .await;
                    // Failures stay in the conversation: the manager sees
                    // them next round and decides whether to retry, reroute,
                    // or abort.
                    conversation.append(result);
                }
            }
        }

        Err(TeamError::RoundsExhausted {
            max_rounds: self.max_rounds,
        })
    }
}

fn to_team_messages(conversation: &Conversation) -> Vec<TeamMessage> {
    conversation
        .results()
        .iter()
        .map(|entry| TeamMessage {
            task_id: entry.task_id.clone(),
            agent_name: entry.agent.to_string(),
            instructions: entry.instructions.clone(),
            result: match (&entry.status, &entry.failure) {
                (TaskStatus::Succeeded, _) => entry.output.clone(),
                (TaskStatus::Failed, Some(kind)) => kind.to_string(),
                (TaskStatus::Failed, None) => "failed".to_string(),
            },
        })
        .collect()
}

/// The whole conversation rendered as labeled prerequisite pairs for the
/// next assigned task.
fn to_team_prerequisites(conversation: &Conversation) -> Vec<GoalResult> {
    to_team_messages(conversation)
        .into_iter()
        .map(|message| GoalResult {
            goal: format!(
                "Task '{id}' goal for agent {agent}:\n\n{instructions}",
                id = message.task_id,
                agent = message.agent_name,
                instructions = message.instructions
            ),
            result: format!(
                "Task '{id}' result from agent {agent}:\n\n{result}",
                id = message.task_id,
                agent = message.agent_name,
                result = message.result
            ),
        })
        .collect()
}
