use std::path::PathBuf;
use std::sync::Arc;

use action_flow::DefaultActionExecutor;
use agent_core::{AgentLoopController, ScriptedPlanner, TaskStatus};
use anyhow::{Context, Result};
use cdp_adapter::ChromiumDriver;
use clap::Args;
use perceiver_structural::ElementIndexer;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wayfinder_plan_cache::InMemoryPlanCache;

use crate::config::EngineConfig;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Start URL of the task
    #[arg(long)]
    pub url: String,

    /// Goal description handed to the planner
    #[arg(long)]
    pub goal: String,

    /// JSON array of planner responses, replayed one per step
    #[arg(long, value_name = "FILE")]
    pub plan: PathBuf,

    /// Override the configured step budget
    #[arg(long)]
    pub max_steps: Option<u32>,
}

pub async fn cmd_run(args: RunArgs, config: &EngineConfig) -> Result<()> {
    let script = tokio::fs::read_to_string(&args.plan)
        .await
        .with_context(|| format!("Failed to read plan file {}", args.plan.display()))?;
    let script: serde_json::Value = serde_json::from_str(&script)
        .with_context(|| format!("Plan file {} is not JSON", args.plan.display()))?;
    let planner = ScriptedPlanner::from_json(script).context("Invalid plan file")?;

    let executor = DefaultActionExecutor::from_config(&config.executor);
    let mut controller = AgentLoopController::new(config.agent.clone(), Arc::new(planner), Arc::new(executor))
        .with_indexer(ElementIndexer::new(config.index.clone()));
    if config.cache.enabled {
        controller = controller.with_cache(Arc::new(InMemoryPlanCache::new(config.cache.clone())));
    }

    let mut task = controller.new_task(&args.goal).with_start_url(&args.url);
    if let Some(max_steps) = args.max_steps {
        task = task.with_max_steps(max_steps);
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling task");
            interrupt.cancel();
        }
    });

    let driver = ChromiumDriver::launch(&config.browser)
        .await
        .context("Failed to launch browser")?;
    let task = controller.run(task, &driver, cancel).await;
    watcher.abort();
    driver.shutdown().await;

    info!(
        task_id = %task.id,
        status = %task.status,
        steps = task.steps_taken,
        "task finished"
    );
    if task.status != TaskStatus::Completed {
        warn!(status = %task.status, failure = ?task.failure, "task did not complete");
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&task).context("Failed to serialize task")?
    );
    Ok(())
}
