use super::{GeneratePlanRequest, GeneratePlanResponse, PlanningAgent};
use crate::catalog::AgentId;
use crate::error::GatewayError;
use crate::gateway::{AgentGateway, AgentInput, ChatMessage, ChatRole};
use async_trait::async_trait;
use std::sync::Arc;

/// Planning collaborator hosted behind the agent gateway.
///
/// The request is serialized as the single user turn of an invocation; the
/// plan comes back in the response's structured output.
pub struct RemotePlanningAgent {
    agent: AgentId,
    gateway: Arc<dyn AgentGateway>,
}

impl RemotePlanningAgent {
    pub fn new(agent: AgentId, gateway: Arc<dyn AgentGateway>) -> Self {
        Self { agent, gateway }
    }
}

#[async_trait]
impl PlanningAgent for RemotePlanningAgent {
    async fn generate_plan(
        &self,
        request: &GeneratePlanRequest,
    ) -> Result<GeneratePlanResponse, GatewayError> {
        let payload = serde_json::to_string(request).map_err(|e| GatewayError::Decode(e.to_string()))?;
        let input = AgentInput {
            chat_history: vec![ChatMessage {
                role: ChatRole::User,
                content: payload,
            }],
        };

        let response = self.gateway.invoke(&self.agent, &input).await?;
        let structured = response.output_structured.ok_or_else(|| {
            GatewayError::Decode("planning agent returned no structured output".to_string())
        })?;
        serde_json::from_value(structured).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}
