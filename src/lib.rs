#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod catalog;
pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod executor;
pub mod gateway;
pub mod plan;
pub mod planner;
pub mod state;
pub mod team;

pub use catalog::{AgentCatalog, AgentDescriptor, AgentId};
pub use config::Config;
pub use conversation::{Conversation, PlanExecutionStatus, TaskResult, TaskStatus};
pub use error::{Result, WeaveError};
pub use events::{EventSink, ExecutionEvent};
pub use executor::{ExecutionReport, ExecutorSettings, PlanExecutor};
pub use plan::{Plan, Step, Task};
pub use planner::PlanBuilder;
