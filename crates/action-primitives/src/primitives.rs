//! Action primitives implementation
//!
//! Each action runs as validate, prepare, dispatch, verify. The phases are
//! separate calls so the executor can decide between them whether a failure
//! may be retried.

mod click;
mod select;
mod type_text;

use action_locator::ResolvedTarget;
use async_trait::async_trait;
use cdp_adapter::{ElementState, PageDriver};
use tracing::debug;
use wayfinder_core_types::ExecCtx;

use crate::{
    errors::ActionError,
    interaction::{Dispatch, Interaction},
    types::ActionTimeouts,
    waiting::{prepare_target, validate_target},
};

/// Action primitives trait
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    /// Live state of the target; fails for detached or disabled elements.
    async fn validate(
        &self,
        ctx: &ExecCtx,
        driver: &dyn PageDriver,
        target: &ResolvedTarget,
    ) -> Result<ElementState, ActionError>;

    /// Bring the target into view, wait for visibility, clear overlays.
    async fn prepare(
        &self,
        ctx: &ExecCtx,
        driver: &dyn PageDriver,
        target: &ResolvedTarget,
    ) -> Result<(), ActionError>;

    /// Perform the interaction. Nothing may touch the page after this but verification.
    async fn dispatch(
        &self,
        ctx: &ExecCtx,
        driver: &dyn PageDriver,
        target: &ResolvedTarget,
        interaction: &Interaction,
    ) -> Result<Dispatch, ActionError>;

    /// Check the post-condition of a dispatched interaction, where one exists.
    async fn verify(
        &self,
        ctx: &ExecCtx,
        driver: &dyn PageDriver,
        target: &ResolvedTarget,
        dispatch: &Dispatch,
    ) -> Result<(), ActionError>;
}

/// Default implementation of action primitives
#[derive(Debug, Clone)]
pub struct DefaultActionPrimitives {
    timeouts: ActionTimeouts,
    max_dismissals: usize,
}

impl Default for DefaultActionPrimitives {
    fn default() -> Self {
        Self::new(ActionTimeouts::default())
    }
}

impl DefaultActionPrimitives {
    pub fn new(timeouts: ActionTimeouts) -> Self {
        Self {
            timeouts,
            max_dismissals: 2,
        }
    }

    /// Overlays dismissed before the target counts as obscured.
    pub fn with_max_dismissals(mut self, max: usize) -> Self {
        self.max_dismissals = max;
        self
    }

    pub fn timeouts(&self) -> &ActionTimeouts {
        &self.timeouts
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    async fn validate(
        &self,
        ctx: &ExecCtx,
        driver: &dyn PageDriver,
        target: &ResolvedTarget,
    ) -> Result<ElementState, ActionError> {
        validate_target(ctx, driver, target).await
    }

    async fn prepare(
        &self,
        ctx: &ExecCtx,
        driver: &dyn PageDriver,
        target: &ResolvedTarget,
    ) -> Result<(), ActionError> {
        prepare_target(
            ctx,
            driver,
            target,
            self.timeouts.visibility(),
            self.max_dismissals,
        )
        .await
    }

    async fn dispatch(
        &self,
        ctx: &ExecCtx,
        driver: &dyn PageDriver,
        target: &ResolvedTarget,
        interaction: &Interaction,
    ) -> Result<Dispatch, ActionError> {
        debug!(
            action_id = ?ctx.action_id,
            element_id = %target.element_id,
            interaction = interaction.name(),
            "dispatching"
        );
        match interaction {
            Interaction::Navigate { url } => click::execute_navigate(self, driver, url).await,
            Interaction::Click { options, download } => {
                click::execute_click(self, driver, target, options, *download).await
            }
            Interaction::Enter {
                field,
                text,
                strategy,
            } => type_text::execute_enter(self, driver, target, *field, text, strategy).await,
            Interaction::SelectNative { by } => select::execute_native(self, driver, target, by).await,
            Interaction::SelectCustom { selection } => {
                select::execute_custom(self, ctx, driver, target, selection).await
            }
        }
    }

    async fn verify(
        &self,
        _ctx: &ExecCtx,
        driver: &dyn PageDriver,
        target: &ResolvedTarget,
        dispatch: &Dispatch,
    ) -> Result<(), ActionError> {
        match dispatch {
            Dispatch::Navigated {
                url_before, target: destination, ..
            } => click::verify_navigation(driver, url_before, destination).await,
            Dispatch::Entered { field, value, .. } => {
                type_text::verify_entered(driver, target, *field, value).await
            }
            Dispatch::SelectedNative { option, .. } => {
                select::verify_native(driver, target, &option.value).await
            }
            Dispatch::Clicked { .. } | Dispatch::SelectedCustom { .. } => Ok(()),
        }
    }
}
