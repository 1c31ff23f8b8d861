//! Task loop: scrape, plan, execute, evaluate.
//!
//! One controller can drive many tasks concurrently; each call to
//! [`AgentLoopController::run`] owns its task and browser session, and only
//! the plan cache is shared between runs.

use std::sync::Arc;

use action_flow::{ActionExecutor, Sleeper, TokioSleeper};
use action_primitives::{Action, ActionKind, ActionStatus};
use cdp_adapter::PageDriver;
use chrono::Utc;
use perceiver_structural::{ElementIndexer, ElementTreeFormatter, ScrapeError, ScrapedPage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wayfinder_core_types::{ActionId, ErrorKind, ExecCtx, StepId};
use wayfinder_plan_cache::{ActionPlanCache, PlanKey, PlanSignature};

use super::config::AgentLoopConfig;
use super::types::{PlanSource, Step, StepStatus, Task, TaskFailure, TaskStatus};
use crate::convert::parse_actions;
use crate::errors::{AgentError, PlannerError};
use crate::events::{NoopObserver, TaskEvent, TaskObserver};
use crate::planner::{PlanRequest, Planner};

/// A batch ready to run, with its provenance.
struct PlannedBatch {
    actions: Vec<Action>,
    source: PlanSource,
    cache_key: Option<PlanKey>,
}

pub struct AgentLoopController {
    config: AgentLoopConfig,
    planner: Arc<dyn Planner>,
    executor: Arc<dyn ActionExecutor>,
    indexer: ElementIndexer,
    formatter: ElementTreeFormatter,
    cache: Option<Arc<dyn ActionPlanCache>>,
    observer: Arc<dyn TaskObserver>,
    sleeper: Arc<dyn Sleeper>,
}

impl AgentLoopController {
    pub fn new(
        config: AgentLoopConfig,
        planner: Arc<dyn Planner>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        let formatter = ElementTreeFormatter::new()
            .interactive_only(true)
            .with_max_text_length(config.max_element_text_length);
        Self {
            config,
            planner,
            executor,
            indexer: ElementIndexer::default(),
            formatter,
            cache: None,
            observer: Arc::new(NoopObserver),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_indexer(mut self, indexer: ElementIndexer) -> Self {
        self.indexer = indexer;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ActionPlanCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TaskObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Sleeper used for planner backoff.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn config(&self) -> &AgentLoopConfig {
        &self.config
    }

    /// A fresh task carrying the configured step budget.
    pub fn new_task(&self, goal: impl Into<String>) -> Task {
        Task::new(goal).with_max_steps(self.config.max_steps)
    }

    fn active_cache(&self) -> Option<&Arc<dyn ActionPlanCache>> {
        self.cache.as_ref().filter(|_| self.config.use_cache)
    }

    /// Run `task` until it reaches a terminal status and return it.
    pub async fn run(&self, mut task: Task, driver: &dyn PageDriver, cancel: CancellationToken) -> Task {
        let ctx = ExecCtx::new(task.id.clone(), cancel);
        task.started_at = Some(Utc::now());
        self.transition(&mut task, TaskStatus::Running, None).await;
        info!(task_id = %task.id, goal = %task.goal, max_steps = task.max_steps, "task started");

        if let Err(err) = self.open_start_url(&ctx, &task, driver).await {
            self.conclude(&mut task, err).await;
            return task;
        }

        let mut consecutive_failures = 0u32;
        let mut previous_keys: Vec<PlanKey> = Vec::new();

        loop {
            if ctx.is_cancelled() {
                self.conclude(&mut task, AgentError::Cancelled).await;
                break;
            }
            if task.budget_exhausted() {
                let budget = task.max_steps;
                self.conclude(&mut task, AgentError::BudgetExhausted(budget)).await;
                break;
            }

            let step_index = task.steps_taken;
            let step_ctx = ctx.for_step(step_index);
            let page = match self.indexer.scrape(&step_ctx, driver).await {
                Ok(page) => Arc::new(page),
                Err(ScrapeError::Cancelled) => {
                    self.conclude(&mut task, AgentError::Cancelled).await;
                    break;
                }
                Err(err) => {
                    self.conclude(&mut task, AgentError::Scrape(err)).await;
                    break;
                }
            };
            task.steps_taken += 1;
            let started_at = Utc::now();
            debug!(
                task_id = %task.id,
                step = step_index,
                url = page.url(),
                elements = page.len(),
                "page scraped"
            );

            let signature = PlanSignature::from_page(&page, &task.goal);
            let planned = match self
                .plan_step(&step_ctx, &task, &page, &signature, &previous_keys)
                .await
            {
                Ok(planned) => planned,
                Err(err) => {
                    self.conclude(&mut task, err).await;
                    break;
                }
            };

            let mut step = self
                .execute_batch(&step_ctx, &page, planned.actions, driver)
                .await;
            step.plan_source = planned.source;
            step.started_at = started_at;
            self.feed_cache(&signature, planned.cache_key.as_ref(), &step);

            previous_keys = std::iter::once(signature.key())
                .chain(planned.cache_key)
                .collect();

            info!(
                task_id = %task.id,
                step = step_index,
                status = ?step.status,
                executed = step.executed(),
                "step recorded"
            );
            self.observer
                .on_event(TaskEvent::StepRecorded {
                    task_id: task.id.clone(),
                    step: step.clone(),
                })
                .await;
            let outcome = step.status;
            task.steps.push(step);

            // A batch cut short by cancellation is not a failure of the task.
            if outcome != StepStatus::Terminal && ctx.is_cancelled() {
                self.conclude(&mut task, AgentError::Cancelled).await;
                break;
            }

            match outcome {
                StepStatus::Terminal => {
                    self.conclude_terminal(&mut task).await;
                    break;
                }
                StepStatus::Succeeded => consecutive_failures = 0,
                StepStatus::Failed => {
                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        let (kind, last) = task
                            .last_step()
                            .map(|step| {
                                (
                                    step.failure_kind().unwrap_or(ErrorKind::Internal),
                                    step.failure_reason().unwrap_or("unknown").to_string(),
                                )
                            })
                            .unwrap_or((ErrorKind::Internal, String::from("unknown")));
                        self.conclude(
                            &mut task,
                            AgentError::ConsecutiveFailures {
                                count: consecutive_failures,
                                last,
                                kind,
                            },
                        )
                        .await;
                        break;
                    }
                }
            }
        }

        task
    }

    async fn open_start_url(
        &self,
        ctx: &ExecCtx,
        task: &Task,
        driver: &dyn PageDriver,
    ) -> Result<(), AgentError> {
        let Some(url) = task.start_url.as_deref() else {
            return Ok(());
        };
        let navigation = tokio::select! {
            biased;
            _ = ctx.cancel_token.cancelled() => return Err(AgentError::Cancelled),
            result = driver.navigate(url, self.config.navigation_timeout()) => result,
        };
        navigation.map_err(|err| AgentError::Navigation {
            url: url.to_string(),
            reason: err.to_string(),
        })
    }

    async fn plan_step(
        &self,
        ctx: &ExecCtx,
        task: &Task,
        page: &ScrapedPage,
        signature: &PlanSignature,
        previous_keys: &[PlanKey],
    ) -> Result<PlannedBatch, AgentError> {
        if let Some(cache) = self.active_cache() {
            match cache.lookup(signature) {
                Some(hit) if previous_keys.contains(&hit.key) => {
                    debug!(
                        task_id = %ctx.task_id,
                        step = ctx.step_index,
                        key = %hit.key,
                        "cached plan already replayed on an unchanged page; asking planner"
                    );
                }
                Some(hit) => {
                    info!(
                        task_id = %ctx.task_id,
                        step = ctx.step_index,
                        key = %hit.key,
                        exact = hit.exact,
                        similarity = hit.similarity,
                        "replaying cached plan"
                    );
                    let actions = self.limit_batch(ctx, fresh_copies(hit.actions));
                    return Ok(PlannedBatch {
                        actions,
                        source: PlanSource::Cache {
                            key: hit.key.to_string(),
                            exact: hit.exact,
                            similarity: hit.similarity,
                        },
                        cache_key: Some(hit.key),
                    });
                }
                None => {}
            }
        }

        let element_tree = self.formatter.format(page);
        let request = PlanRequest {
            task_id: &task.id,
            goal: &task.goal,
            step_index: ctx.step_index,
            page,
            element_tree: &element_tree,
            history: &task.steps,
        };
        let (actions, attempts) = self.call_planner(ctx, &request).await?;
        Ok(PlannedBatch {
            actions: self.limit_batch(ctx, actions),
            source: PlanSource::Planner { attempts },
            cache_key: None,
        })
    }

    /// Ask the planner, retrying failures under the planner's own policy.
    async fn call_planner(
        &self,
        ctx: &ExecCtx,
        request: &PlanRequest<'_>,
    ) -> Result<(Vec<Action>, u32), AgentError> {
        let policy = self.config.planner_retry;
        let timeout = self.config.planner_timeout_duration();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let answer = tokio::select! {
                biased;
                _ = ctx.cancel_token.cancelled() => return Err(AgentError::Cancelled),
                answer = tokio::time::timeout(timeout, self.planner.plan(request)) => answer,
            };
            let error = match answer {
                Ok(Ok(response)) => match parse_actions(&response) {
                    Ok(actions) => return Ok((actions, attempts)),
                    Err(err) => err,
                },
                Ok(Err(err)) => err,
                Err(_) => PlannerError::Timeout(self.config.planner_timeout_ms),
            };

            if !error.is_retryable() || !policy.has_budget(attempts) {
                warn!(task_id = %ctx.task_id, step = ctx.step_index, attempts, %error, "planner gave up");
                return Err(error.into());
            }
            let delay = policy.calculate_backoff(attempts);
            warn!(
                task_id = %ctx.task_id,
                step = ctx.step_index,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                %error,
                "planner call failed; retrying"
            );
            tokio::select! {
                biased;
                _ = ctx.cancel_token.cancelled() => return Err(AgentError::Cancelled),
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }

    fn limit_batch(&self, ctx: &ExecCtx, mut actions: Vec<Action>) -> Vec<Action> {
        let limit = self.config.max_actions_per_step.max(1) as usize;
        if actions.len() > limit {
            warn!(
                task_id = %ctx.task_id,
                step = ctx.step_index,
                planned = actions.len(),
                limit,
                "dropping actions beyond the per-step limit"
            );
            actions.truncate(limit);
        }
        actions
    }

    /// Execute in order; everything after a halting result is skipped.
    async fn execute_batch(
        &self,
        ctx: &ExecCtx,
        page: &Arc<ScrapedPage>,
        mut actions: Vec<Action>,
        driver: &dyn PageDriver,
    ) -> Step {
        let mut results = Vec::with_capacity(actions.len());
        let mut halted = false;
        let mut failed = false;
        let mut terminal = false;

        for action in actions.iter_mut() {
            if halted {
                action.status = ActionStatus::Skipped;
                continue;
            }
            let result = self.executor.execute(ctx, page, action, driver).await;
            action.status = if result.success {
                ActionStatus::Completed
            } else {
                ActionStatus::Failed
            };
            failed |= !result.success;
            terminal |= result.success && action.is_terminal();
            halted = result.halt_batch || !result.success || action.is_terminal();
            results.push(result);
        }
        if halted {
            let skipped = actions
                .iter()
                .filter(|action| action.status == ActionStatus::Skipped)
                .count();
            if skipped > 0 {
                debug!(task_id = %ctx.task_id, step = ctx.step_index, skipped, "batch halted early");
            }
        }

        let status = if failed {
            StepStatus::Failed
        } else if terminal {
            StepStatus::Terminal
        } else {
            StepStatus::Succeeded
        };
        Step {
            id: StepId::new(),
            index: ctx.step_index,
            url: page.url().to_string(),
            element_count: page.len(),
            page: Some(Arc::clone(page)),
            plan_source: PlanSource::Planner { attempts: 0 },
            actions,
            results,
            status,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    fn feed_cache(&self, signature: &PlanSignature, replayed: Option<&PlanKey>, step: &Step) {
        let Some(cache) = self.active_cache() else {
            return;
        };
        if let Some(key) = replayed {
            let rate = cache.record_outcome(key, step.succeeded());
            debug!(key = %key, success = step.succeeded(), ?rate, "cached plan outcome recorded");
            return;
        }
        if !step.succeeded() {
            return;
        }
        let snapshot: Vec<Action> = step
            .actions
            .iter()
            .cloned()
            .map(|mut action| {
                action.status = ActionStatus::Pending;
                action
            })
            .collect();
        match cache.admit(signature, &snapshot, 1.0) {
            Ok(admission) => debug!(key = %signature.key(), ?admission, "plan admitted"),
            Err(err) => debug!(key = %signature.key(), %err, "plan not admitted"),
        }
    }

    async fn conclude_terminal(&self, task: &mut Task) {
        let terminal = task
            .last_step()
            .and_then(|step| step.actions.iter().find(|action| action.is_terminal()))
            .map(|action| action.kind.clone());
        match terminal {
            Some(ActionKind::Complete { verification }) => {
                task.output = verification;
                info!(task_id = %task.id, steps = task.steps_taken, "task completed");
                self.transition(task, TaskStatus::Completed, None).await;
            }
            Some(ActionKind::Terminate { errors }) => {
                info!(task_id = %task.id, steps = task.steps_taken, errors = errors.len(), "task terminated by planner");
                task.errors = errors;
                self.transition(task, TaskStatus::Terminated, None).await;
            }
            _ => {
                let error = PlannerError::malformed("terminal step without terminal action");
                self.conclude(task, AgentError::Planner(error)).await
            }
        }
    }

    async fn conclude(&self, task: &mut Task, error: AgentError) {
        let status = match &error {
            AgentError::Cancelled => TaskStatus::Cancelled,
            AgentError::BudgetExhausted(_) => TaskStatus::TimedOut,
            _ => TaskStatus::Failed,
        };
        let failure = TaskFailure {
            kind: error.kind(),
            message: error.to_string(),
        };
        match status {
            TaskStatus::Cancelled => info!(task_id = %task.id, steps = task.steps_taken, "task cancelled"),
            _ => warn!(
                task_id = %task.id,
                steps = task.steps_taken,
                kind = %failure.kind,
                error = %failure.message,
                "task ended without completing"
            ),
        }
        self.transition(task, status, Some(failure)).await;
    }

    async fn transition(&self, task: &mut Task, to: TaskStatus, failure: Option<TaskFailure>) {
        let from = task.status;
        if to.is_terminal() {
            task.finish(to, failure.clone());
        } else {
            task.status = to;
        }
        self.observer
            .on_event(TaskEvent::StatusChanged {
                task_id: task.id.clone(),
                from,
                to,
                failure,
                at: Utc::now(),
            })
            .await;
    }
}

/// Replayed actions get new ids so every step's actions stay distinct.
fn fresh_copies(actions: Vec<Action>) -> Vec<Action> {
    actions
        .into_iter()
        .map(|mut action| {
            action.id = ActionId::new();
            action.status = ActionStatus::Pending;
            action
        })
        .collect()
}
