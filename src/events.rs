use crate::catalog::AgentId;
use crate::conversation::{PlanExecutionStatus, TaskResult};
use crate::gateway::ExtraDatum;
use crate::plan::Plan;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Live progress of one plan execution, delivered through an [`EventSink`].
///
/// Mirrors the streamed invocation sequence outward: consumers that
/// requested streamed execution see partial content as it arrives; everyone
/// else reads the final report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum ExecutionEvent {
    PlanReady {
        plan: Plan,
    },
    AgentRequest {
        task_id: String,
        agent: AgentId,
        goal: String,
    },
    StreamStart {
        task_id: String,
    },
    Partial {
        task_id: String,
        text: String,
    },
    /// Auxiliary telemetry an agent attached mid-stream; not part of any
    /// result text.
    ExtraData {
        task_id: String,
        items: Vec<ExtraDatum>,
    },
    /// Pulse emitted while a unary dispatch is still in flight.
    Keepalive {
        task_id: String,
    },
    TaskResolved {
        result: TaskResult,
    },
    Replanning {
        attempt: u32,
        detail: String,
    },
    Error {
        status_code: u16,
        detail: String,
    },
    Finished {
        status: PlanExecutionStatus,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_event(&self, event: &ExecutionEvent);
}

#[derive(Debug, Default)]
pub struct NullEventSink;

#[async_trait]
impl EventSink for NullEventSink {
    async fn on_event(&self, _event: &ExecutionEvent) {}
}

/// Forwards events into a bounded channel; the receiving half is the live
/// stream handed to a consumer. A dropped receiver silently discards further
/// events rather than failing the execution.
pub struct ChannelEventSink {
    sender: mpsc::Sender<ExecutionEvent>,
}

impl ChannelEventSink {
    pub fn new(sender: mpsc::Sender<ExecutionEvent>) -> Self {
        Self { sender }
    }

    /// Sink plus the live stream of what it will receive.
    pub fn channel(buffer: usize) -> (Self, ReceiverStream<ExecutionEvent>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self::new(tx), ReceiverStream::new(rx))
    }
}

#[async_trait]
impl EventSink for ChannelEventSink {
    async fn on_event(&self, event: &ExecutionEvent) {
        let _ = self.sender.send(event.clone()).await;
    }
}
