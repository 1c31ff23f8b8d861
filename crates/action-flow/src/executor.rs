//! Action executor implementation
//!
//! Drives one action through resolve, validate, prepare, dispatch and verify,
//! retrying a failed attempt only when [`retry_allowed`] says replaying it cannot
//! repeat a side effect.

use action_locator::{ElementResolver, FrameResolver};
use action_primitives::{
    Action, ActionError, ActionKind, ActionPrimitives, ActionResult, DefaultActionPrimitives, Dispatch,
    Interaction,
};
use async_trait::async_trait;
use cdp_adapter::{ElementState, PageDriver};
use perceiver_structural::ScrapedPage;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use wayfinder_core_types::{ElementId, ExecCtx};

use crate::strategies::{retry_allowed, RetryPolicy, Sleeper, TokioSleeper};
use crate::types::{ExecutorConfig, Phase};

/// Action executor trait
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run one action against `page`. Failures are reported in the result.
    async fn execute(
        &self,
        ctx: &ExecCtx,
        page: &ScrapedPage,
        action: &Action,
        driver: &dyn PageDriver,
    ) -> ActionResult;
}

/// Default action executor implementation
pub struct DefaultActionExecutor {
    resolver: Arc<dyn ElementResolver>,
    primitives: Arc<dyn ActionPrimitives>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

struct AttemptFailure {
    phase: Phase,
    error: ActionError,
    idempotent: bool,
}

impl AttemptFailure {
    fn at(phase: Phase) -> impl FnOnce(ActionError) -> Self {
        move |error| Self {
            phase,
            error,
            idempotent: false,
        }
    }

    fn after_dispatch(phase: Phase, idempotent: bool) -> impl FnOnce(ActionError) -> Self {
        move |error| Self {
            phase,
            error,
            idempotent,
        }
    }
}

impl DefaultActionExecutor {
    /// Create a new executor
    pub fn new(primitives: Arc<dyn ActionPrimitives>) -> Self {
        Self {
            resolver: Arc::new(FrameResolver::new()),
            primitives,
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        let primitives =
            DefaultActionPrimitives::new(config.timeouts).with_max_dismissals(config.max_dismissals);
        Self::new(Arc::new(primitives)).with_retry_policy(config.retry)
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ElementResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn attempt(
        &self,
        ctx: &ExecCtx,
        page: &ScrapedPage,
        action: &Action,
        element_id: &ElementId,
        driver: &dyn PageDriver,
    ) -> Result<Dispatch, AttemptFailure> {
        let target = self
            .resolver
            .resolve(ctx, page, element_id, driver)
            .await
            .map_err(|err| AttemptFailure::at(Phase::Resolving)(err.into()))?;

        checkpoint(ctx, Phase::Validating)?;
        let state = self
            .primitives
            .validate(ctx, driver, &target)
            .await
            .map_err(AttemptFailure::at(Phase::Validating))?;
        let interaction = interaction_for(page.url(), &state, action).map_err(AttemptFailure::at(Phase::Validating))?;

        checkpoint(ctx, Phase::Preparing)?;
        self.primitives
            .prepare(ctx, driver, &target)
            .await
            .map_err(AttemptFailure::at(Phase::Preparing))?;

        checkpoint(ctx, Phase::Executing)?;
        let idempotent = interaction.is_idempotent();
        let dispatch = self
            .primitives
            .dispatch(ctx, driver, &target, &interaction)
            .await
            .map_err(AttemptFailure::after_dispatch(Phase::Executing, idempotent))?;

        // The interaction already happened; verification runs even if cancellation
        // arrived meanwhile so the outcome is known.
        self.primitives
            .verify(ctx, driver, &target, &dispatch)
            .await
            .map_err(AttemptFailure::after_dispatch(Phase::Verifying, idempotent))?;
        Ok(dispatch)
    }
}

#[async_trait]
impl ActionExecutor for DefaultActionExecutor {
    async fn execute(
        &self,
        ctx: &ExecCtx,
        page: &ScrapedPage,
        action: &Action,
        driver: &dyn PageDriver,
    ) -> ActionResult {
        let ctx = ctx.for_action(action.id.clone());
        let started = Instant::now();
        let elapsed = || started.elapsed().as_millis() as u64;

        if let Err(err) = action.validate() {
            warn!(action_id = %action.id, error = %err, "rejecting malformed action");
            return ActionResult::failed(&err, elapsed(), 0);
        }

        let element_id = match (&action.kind, action.element_id.as_ref()) {
            (ActionKind::Complete { verification }, _) => {
                info!(task_id = %ctx.task_id, step = ctx.step_index, "complete action received");
                return ActionResult::succeeded(json!({ "verification": verification }), elapsed(), 0);
            }
            (ActionKind::Terminate { errors }, _) => {
                info!(task_id = %ctx.task_id, step = ctx.step_index, errors = errors.len(), "terminate action received");
                return ActionResult::succeeded(json!({ "errors": errors }), elapsed(), 0);
            }
            (_, Some(id)) => id,
            (_, None) => {
                let err = ActionError::InvalidAction(format!("{} requires an element_id", action.name()));
                return ActionResult::failed(&err, elapsed(), 0);
            }
        };

        let mut attempts = 0;
        loop {
            if ctx.is_cancelled() {
                return ActionResult::failed(&ActionError::Cancelled, elapsed(), attempts);
            }
            attempts += 1;

            match self.attempt(&ctx, page, action, element_id, driver).await {
                Ok(dispatch) => {
                    let changed_url = dispatch.changed_url();
                    info!(
                        task_id = %ctx.task_id,
                        step = ctx.step_index,
                        action_id = %action.id,
                        action = action.name(),
                        element_id = %element_id,
                        attempt = attempts,
                        changed_url,
                        "action executed"
                    );
                    return ActionResult::succeeded(dispatch.payload(), elapsed(), attempts)
                        .with_halt(changed_url);
                }
                Err(failure) => {
                    let retry = retry_allowed(failure.phase, &failure.error, failure.idempotent)
                        && self.policy.has_budget(attempts);
                    if !retry {
                        warn!(
                            task_id = %ctx.task_id,
                            step = ctx.step_index,
                            action_id = %action.id,
                            element_id = %element_id,
                            phase = %failure.phase,
                            kind = %failure.error.kind(),
                            attempt = attempts,
                            error = %failure.error,
                            "action failed"
                        );
                        let mut result = ActionResult::failed(&failure.error, elapsed(), attempts);
                        result.data = json!({ "phase": failure.phase });
                        if let Some(hop) = locator_hop(&failure.error) {
                            result.data["hop"] = json!(hop);
                        }
                        return result;
                    }

                    let delay = self.policy.calculate_backoff(attempts);
                    debug!(
                        action_id = %action.id,
                        phase = %failure.phase,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure.error,
                        "retrying action"
                    );
                    tokio::select! {
                        biased;
                        _ = ctx.cancel_token.cancelled() => {
                            return ActionResult::failed(&ActionError::Cancelled, elapsed(), attempts);
                        }
                        _ = self.sleeper.sleep(delay) => {}
                    }
                }
            }
        }
    }
}

fn checkpoint(ctx: &ExecCtx, next: Phase) -> Result<(), AttemptFailure> {
    ctx.ensure_active()
        .map_err(|_| AttemptFailure::at(next)(ActionError::Cancelled))
}

fn locator_hop(error: &ActionError) -> Option<usize> {
    match error {
        ActionError::Locator(err) => err.hop(),
        _ => None,
    }
}

/// The single place an action variant becomes a browser interaction.
fn interaction_for(page_url: &str, state: &ElementState, action: &Action) -> Result<Interaction, ActionError> {
    match &action.kind {
        ActionKind::Click {
            download,
            modifiers,
            offset,
        } => Ok(Interaction::click(page_url, state, modifiers, *offset, *download)),
        ActionKind::InputText { text, strategy } => Ok(Interaction::enter(state, text, *strategy)),
        ActionKind::SelectOption { option } => Interaction::select(state, option),
        ActionKind::Complete { .. } | ActionKind::Terminate { .. } => Err(ActionError::Internal(format!(
            "{} is not dispatched to the page",
            action.name()
        ))),
    }
}
