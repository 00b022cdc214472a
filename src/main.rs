#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use taskweave::config::Config;
use taskweave::conversation::Conversation;
use taskweave::events::{ChannelEventSink, ExecutionEvent};
use taskweave::executor::PlanExecutor;
use taskweave::gateway::HttpAgentGateway;
use taskweave::planner::{PlanBuilder, RemotePlanningAgent};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "taskweave", about = "Goal-driven multi-agent task orchestration")]
struct Cli {
    /// Path to the TOML config
    #[arg(long, default_value = "taskweave.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan and execute a goal against the configured agents
    Run {
        goal: String,
        /// Print the event stream as JSON lines instead of text
        #[arg(long)]
        json: bool,
    },
    /// Build and print the plan without executing it
    Plan { goal: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let gateway = Arc::new(HttpAgentGateway::new(
        config.gateway.host.clone(),
        config.gateway.secure,
        config.gateway.resolved_api_key(),
    ));
    let planning_agent = Arc::new(RemotePlanningAgent::new(
        config.planner_id(),
        Arc::clone(&gateway) as _,
    ));
    let builder = PlanBuilder::new(planning_agent, config.catalog());

    match cli.command {
        Command::Plan { goal } => {
            let plan = builder.build_plan(&goal, None).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Run { goal, json } => {
            let (tx, mut rx) = mpsc::channel(64);
            let sink = Arc::new(ChannelEventSink::new(tx));
            let executor =
                PlanExecutor::new(builder, gateway as _, config.executor.to_settings(), sink);

            let printer = tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    print_event(&event, json);
                }
            });

            let plan = executor.builder().build_plan(&goal, None).await?;

            // Ctrl-C skips every not-yet-started task; in-flight dispatches
            // still run to completion.
            let state = executor.state();
            let cancel_plan = plan.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("cancellation requested");
                    state.cancel_remaining(&cancel_plan, &Conversation::new());
                }
            });

            let report = executor.execute(&goal, plan).await;
            drop(executor);
            printer.await.ok();

            println!("status: {}", report.status);
            if let Some(result) = report.final_output() {
                println!("{}", result.output);
            }
            if let Some(reason) = &report.abort_reason {
                println!("aborted: {reason}");
            }
        }
    }

    Ok(())
}

fn print_event(event: &ExecutionEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }

    match event {
        ExecutionEvent::PlanReady { plan } => {
            eprintln!(
                "plan: {} steps, {} tasks",
                plan.steps.len(),
                plan.task_count()
            );
        }
        ExecutionEvent::AgentRequest { task_id, agent, .. } => {
            eprintln!("-> {task_id} ({agent})");
        }
        ExecutionEvent::Partial { text, .. } => {
            eprint!("{text}");
            std::io::stderr().flush().ok();
        }
        ExecutionEvent::TaskResolved { result } => {
            eprintln!("<- {} [{:?}]", result.task_id, result.status);
        }
        ExecutionEvent::Replanning { attempt, detail } => {
            eprintln!("re-planning (attempt {attempt}): {detail}");
        }
        ExecutionEvent::Error { detail, .. } => {
            eprintln!("error: {detail}");
        }
        ExecutionEvent::Finished { status } => {
            eprintln!("finished: {status}");
        }
        ExecutionEvent::StreamStart { .. }
        | ExecutionEvent::ExtraData { .. }
        | ExecutionEvent::Keepalive { .. } => {}
    }
}
