use crate::conversation::{FailureKind, GoalResult, TaskResult, TaskStatus};
use crate::error::GatewayError;
use crate::events::{EventSink, ExecutionEvent};
use crate::gateway::{AgentEvent, AgentGateway, AgentInput, InvokeResponse};
use crate::plan::Task;
use crate::state::TaskStateManager;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Per-task adapter between the scheduler and the gateway.
///
/// Failures never cross this boundary as errors: every outcome, including a
/// pre-dispatch cancellation, comes back as a [`TaskResult`] the scheduler
/// inspects through its status.
pub struct AgentDispatcher {
    gateway: Arc<dyn AgentGateway>,
    state: Arc<TaskStateManager>,
    streaming: bool,
    keepalive_interval: Option<Duration>,
}

impl AgentDispatcher {
    pub fn new(
        gateway: Arc<dyn AgentGateway>,
        state: Arc<TaskStateManager>,
        streaming: bool,
        keepalive_interval: Option<Duration>,
    ) -> Self {
        Self {
            gateway,
            state,
            streaming,
            keepalive_interval,
        }
    }

    /// The audit-trail context string: prerequisite results followed by the
    /// task's own goal, newline-joined.
    pub fn render_instructions(prerequisites: &[GoalResult], goal: &str) -> String {
        prerequisites
            .iter()
            .map(|p| p.result.as_str())
            .chain([goal])
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub async fn dispatch(
        &self,
        task: &Task,
        prerequisites: &[GoalResult],
        sink: &dyn EventSink,
    ) -> TaskResult {
        let instructions = Self::render_instructions(prerequisites, &task.goal);

        if self.state.is_cancelled(&task.task_id) {
            tracing::debug!(task = %task.task_id, "skipping cancelled task");
            let result = self.failed(task, instructions, FailureKind::Cancelled);
            sink.on_event(&ExecutionEvent::TaskResolved {
                result: result.clone(),
            })
            .await;
            return result;
        }

        self.state.record_task_started(&task.task_id);
        sink.on_event(&ExecutionEvent::AgentRequest {
            task_id: task.task_id.clone(),
            agent: task.agent.clone(),
            goal: task.goal.clone(),
        })
        .await;

        let input = AgentInput::from_context(prerequisites, &task.goal);
        let outcome = if self.streaming {
            self.invoke_streaming(task, &input, sink).await
        } else {
            self.invoke_unary(task, &input, sink).await
        };

        let result = match outcome {
            Ok(response) => TaskResult {
                task_id: task.task_id.clone(),
                agent: task.agent.clone(),
                goal: task.goal.clone(),
                instructions,
                output: response.output_raw,
                status: TaskStatus::Succeeded,
                failure: None,
                token_usage: response.token_usage,
            },
            Err(kind) => {
                tracing::warn!(task = %task.task_id, agent = %task.agent, "dispatch failed: {kind}");
                self.failed(task, instructions, kind)
            }
        };

        sink.on_event(&ExecutionEvent::TaskResolved {
            result: result.clone(),
        })
        .await;
        result
    }

    fn failed(&self, task: &Task, instructions: String, kind: FailureKind) -> TaskResult {
        TaskResult {
            task_id: task.task_id.clone(),
            agent: task.agent.clone(),
            goal: task.goal.clone(),
            instructions,
            output: String::new(),
            status: TaskStatus::Failed,
            failure: Some(kind),
            token_usage: None,
        }
    }

    async fn invoke_unary(
        &self,
        task: &Task,
        input: &AgentInput,
        sink: &dyn EventSink,
    ) -> Result<InvokeResponse, FailureKind> {
        let call = self.gateway.invoke(&task.agent, input);

        let Some(interval) = self.keepalive_interval else {
            return call.await.map_err(failure_from_gateway);
        };

        tokio::pin!(call);
        loop {
            tokio::select! {
                outcome = &mut call => {
                    return outcome.map_err(failure_from_gateway);
                }
                () = tokio::time::sleep(interval) => {
                    sink.on_event(&ExecutionEvent::Keepalive {
                        task_id: task.task_id.clone(),
                    })
                    .await;
                }
            }
        }
    }

    async fn invoke_streaming(
        &self,
        task: &Task,
        input: &AgentInput,
        sink: &dyn EventSink,
    ) -> Result<InvokeResponse, FailureKind> {
        let mut stream = self
            .gateway
            .invoke_stream(&task.agent, input)
            .await
            .map_err(failure_from_gateway)?;

        let mut partials = String::new();
        while let Some(event) = stream.next().await {
            match event {
                Ok(AgentEvent::StreamStart) => {
                    sink.on_event(&ExecutionEvent::StreamStart {
                        task_id: task.task_id.clone(),
                    })
                    .await;
                }
                Ok(AgentEvent::Partial { text }) => {
                    partials.push_str(&text);
                    sink.on_event(&ExecutionEvent::Partial {
                        task_id: task.task_id.clone(),
                        text,
                    })
                    .await;
                }
                Ok(AgentEvent::ExtraData { items }) => {
                    sink.on_event(&ExecutionEvent::ExtraData {
                        task_id: task.task_id.clone(),
                        items,
                    })
                    .await;
                }
                Ok(AgentEvent::Final { mut response }) => {
                    if response.output_raw.is_empty() {
                        response.output_raw = partials;
                    }
                    return Ok(response);
                }
                Ok(AgentEvent::Error {
                    status_code,
                    detail,
                }) => {
                    return Err(FailureKind::Gateway {
                        status_code: Some(status_code),
                        detail,
                    });
                }
                Err(error) => {
                    return Err(FailureKind::Stream {
                        detail: error.to_string(),
                    });
                }
            }
        }

        Err(FailureKind::Stream {
            detail: "stream ended without a terminal event".to_string(),
        })
    }
}

fn failure_from_gateway(error: GatewayError) -> FailureKind {
    match error {
        GatewayError::Status {
            status_code,
            detail,
            ..
        } => FailureKind::Gateway {
            status_code: Some(status_code),
            detail,
        },
        GatewayError::Request { message, .. } => FailureKind::Gateway {
            status_code: None,
            detail: message,
        },
        GatewayError::Decode(detail) => FailureKind::Gateway {
            status_code: None,
            detail,
        },
        GatewayError::Stream(detail) => FailureKind::Stream { detail },
    }
}
