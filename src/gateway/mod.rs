mod http;
mod sse;

pub use http::HttpAgentGateway;

use crate::catalog::AgentId;
use crate::conversation::GoalResult;
use crate::error::GatewayError;
use async_trait::async_trait;
use futures_util::{Stream, stream};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

// ─── Invocation payloads ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// Auxiliary key/value pair an agent may attach to its response. Surfaced to
/// the execution event stream for telemetry; never folded into result text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraDatum {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// What an agent invocation receives: the accumulated prerequisite exchange
/// plus the goal as the final user turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInput {
    pub chat_history: Vec<ChatMessage>,
}

impl AgentInput {
    /// Builds the chat history for a task: each prerequisite becomes a
    /// user-goal/assistant-result turn pair, then the task's own goal closes
    /// as the final user message.
    pub fn from_context(prerequisites: &[GoalResult], goal: &str) -> Self {
        let mut chat_history = Vec::with_capacity(prerequisites.len() * 2 + 1);
        for prerequisite in prerequisites {
            chat_history.push(ChatMessage {
                role: ChatRole::User,
                content: prerequisite.goal.clone(),
            });
            chat_history.push(ChatMessage {
                role: ChatRole::Assistant,
                content: prerequisite.result.clone(),
            });
        }
        chat_history.push(ChatMessage {
            role: ChatRole::User,
            content: goal.to_string(),
        });
        Self { chat_history }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvokeResponse {
    #[serde(default)]
    pub output_raw: String,
    #[serde(default)]
    pub output_structured: Option<serde_json::Value>,
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub extra_data: Vec<ExtraDatum>,
}

impl InvokeResponse {
    pub fn text_only(output_raw: impl Into<String>) -> Self {
        Self {
            output_raw: output_raw.into(),
            ..Self::default()
        }
    }
}

// ─── Streaming event sequence ────────────────────────────────────────────────

/// Typed event sequence for a streamed invocation: one `StreamStart`, zero or
/// more `Partial`, then exactly one terminal `Final` or `Error`. `ExtraData`
/// may interleave anywhere before the terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum AgentEvent {
    StreamStart,
    Partial { text: String },
    ExtraData { items: Vec<ExtraDatum> },
    Final { response: InvokeResponse },
    Error { status_code: u16, detail: String },
}

pub type AgentEventStream =
    Pin<Box<dyn Stream<Item = Result<AgentEvent, GatewayError>> + Send + 'static>>;

// ─── Gateway trait ───────────────────────────────────────────────────────────

/// The remote agent invocation transport.
///
/// Concrete variants are injected at construction; the engine never names an
/// implementation directly.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    async fn invoke(
        &self,
        agent: &AgentId,
        input: &AgentInput,
    ) -> Result<InvokeResponse, GatewayError>;

    /// Streamed variant. The default adapts a unary invocation into the
    /// event sequence for gateways without native streaming.
    async fn invoke_stream(
        &self,
        agent: &AgentId,
        input: &AgentInput,
    ) -> Result<AgentEventStream, GatewayError> {
        let response = self.invoke(agent, input).await?;
        Ok(Box::pin(stream::iter(response_to_events(response))) as AgentEventStream)
    }
}

pub fn response_to_events(response: InvokeResponse) -> Vec<Result<AgentEvent, GatewayError>> {
    let mut events = vec![Ok(AgentEvent::StreamStart)];
    if !response.output_raw.is_empty() {
        events.push(Ok(AgentEvent::Partial {
            text: response.output_raw.clone(),
        }));
    }
    if !response.extra_data.is_empty() {
        events.push(Ok(AgentEvent::ExtraData {
            items: response.extra_data.clone(),
        }));
    }
    events.push(Ok(AgentEvent::Final { response }));
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    struct UnaryOnly;

    #[async_trait]
    impl AgentGateway for UnaryOnly {
        async fn invoke(
            &self,
            _agent: &AgentId,
            input: &AgentInput,
        ) -> Result<InvokeResponse, GatewayError> {
            let goal = input
                .chat_history
                .last()
                .map(|message| message.content.clone())
                .unwrap_or_default();
            Ok(InvokeResponse::text_only(format!("echo:{goal}")))
        }
    }

    #[test]
    fn from_context_interleaves_prerequisite_turns() {
        let prerequisites = vec![GoalResult {
            goal: "find data".into(),
            result: "data X".into(),
        }];
        let input = AgentInput::from_context(&prerequisites, "write summary");

        assert_eq!(input.chat_history.len(), 3);
        assert_eq!(input.chat_history[0].role, ChatRole::User);
        assert_eq!(input.chat_history[0].content, "find data");
        assert_eq!(input.chat_history[1].role, ChatRole::Assistant);
        assert_eq!(input.chat_history[1].content, "data X");
        assert_eq!(input.chat_history[2].role, ChatRole::User);
        assert_eq!(input.chat_history[2].content, "write summary");
    }

    #[test]
    fn from_context_without_prerequisites_is_single_user_turn() {
        let input = AgentInput::from_context(&[], "just do it");
        assert_eq!(input.chat_history.len(), 1);
        assert_eq!(input.chat_history[0].content, "just do it");
    }

    #[test]
    fn response_to_events_emits_terminal_final() {
        let response = InvokeResponse {
            output_raw: "hello".into(),
            output_structured: None,
            token_usage: None,
            extra_data: vec![ExtraDatum {
                key: "trace".into(),
                value: "abc".into(),
            }],
        };

        let events: Vec<AgentEvent> = response_to_events(response)
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert!(matches!(events[0], AgentEvent::StreamStart));
        assert!(matches!(events[1], AgentEvent::Partial { .. }));
        assert!(matches!(events[2], AgentEvent::ExtraData { .. }));
        assert!(matches!(events.last(), Some(AgentEvent::Final { .. })));
    }

    #[tokio::test]
    async fn default_invoke_stream_adapts_unary() {
        let gateway = UnaryOnly;
        let agent = AgentId::new("worker", "0.1");
        let input = AgentInput::from_context(&[], "task");

        let mut stream = gateway.invoke_stream(&agent, &input).await.unwrap();
        let mut final_response = None;
        while let Some(event) = stream.next().await {
            if let AgentEvent::Final { response } = event.unwrap() {
                final_response = Some(response);
            }
        }
        assert_eq!(final_response.unwrap().output_raw, "echo:task");
    }
}
