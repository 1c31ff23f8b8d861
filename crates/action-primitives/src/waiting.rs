//! Pre-interaction checks: validation and preparation waits

use action_locator::ResolvedTarget;
use cdp_adapter::{AdapterErrorKind, ElementState, PageDriver};
use std::time::Duration;
use tracing::debug;
use wayfinder_core_types::ExecCtx;

use crate::errors::ActionError;

/// Reads the live state of the target and rejects detached or disabled elements.
pub async fn validate_target(
    ctx: &ExecCtx,
    driver: &dyn PageDriver,
    target: &ResolvedTarget,
) -> Result<ElementState, ActionError> {
    let state = driver.element_state(&target.handle).await?;
    if !state.attached {
        return Err(ActionError::ElementMissing(format!(
            "element {} is no longer in the DOM",
            target.element_id
        )));
    }
    if !state.enabled {
        return Err(ActionError::NotInteractable(format!(
            "element {} is disabled",
            target.element_id
        )));
    }
    debug!(
        action_id = ?ctx.action_id,
        element_id = %target.element_id,
        tag = %state.tag,
        "target validated"
    );
    Ok(state)
}

/// Scrolls the target into view, waits for it to show, and clears overlays.
pub async fn prepare_target(
    ctx: &ExecCtx,
    driver: &dyn PageDriver,
    target: &ResolvedTarget,
    visibility_timeout: Duration,
    max_dismissals: usize,
) -> Result<(), ActionError> {
    driver
        .scroll_into_view(&target.handle, visibility_timeout)
        .await?;
    driver
        .wait_for_visible(&target.handle, visibility_timeout)
        .await
        .map_err(|err| match err.kind {
            AdapterErrorKind::Timeout => ActionError::Timeout(format!(
                "element {} not visible within {}ms",
                target.element_id,
                visibility_timeout.as_millis()
            )),
            _ => ActionError::from(err),
        })?;

    for attempt in 0..=max_dismissals {
        let Some(obstruction) = driver.obstruction(&target.handle).await? else {
            return Ok(());
        };
        if attempt == max_dismissals {
            return Err(ActionError::Obscured(format!(
                "element {} covered by {}",
                target.element_id, obstruction.description
            )));
        }
        let gone = driver
            .dismiss_obstruction(&obstruction, visibility_timeout)
            .await?;
        debug!(
            action_id = ?ctx.action_id,
            element_id = %target.element_id,
            blocker = %obstruction.description,
            dismissed = gone,
            "overlay dismissal attempted"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_adapter::mock::{MockDriver, MockElement, MockEvent, MAIN_FRAME};
    use cdp_adapter::{ElementHandle, FrameHandle};
    use tokio_util::sync::CancellationToken;
    use wayfinder_core_types::{ElementId, FrameId, TaskId};

    fn target(selector: &str) -> ResolvedTarget {
        ResolvedTarget {
            element_id: ElementId::from("e1"),
            handle: ElementHandle::new(FrameHandle::top(), selector, 0),
            frame: FrameHandle::top(),
            frame_path: vec![FrameId::main()],
        }
    }

    fn ctx() -> ExecCtx {
        ExecCtx::new(TaskId::new(), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_disabled_target_is_not_interactable() {
        let driver = MockDriver::new("https://example.test/");
        driver.add(MAIN_FRAME, MockElement::new("button").attr("id", "go").disabled());
        let err = validate_target(&ctx(), &driver, &target("#go")).await.unwrap_err();
        assert!(matches!(err, ActionError::NotInteractable(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_dismissable_overlay_is_cleared() {
        let driver = MockDriver::new("https://example.test/");
        let overlay = driver.add(MAIN_FRAME, MockElement::new("div").attr("id", "cookie").dismissable());
        driver.add(MAIN_FRAME, MockElement::new("button").attr("id", "go").covered_by(overlay));

        prepare_target(&ctx(), &driver, &target("#go"), Duration::from_secs(1), 2)
            .await
            .unwrap();
        assert!(driver
            .events()
            .contains(&MockEvent::Dismissed { node: overlay }));
    }

    #[tokio::test]
    async fn test_stubborn_overlay_is_obscured() {
        let driver = MockDriver::new("https://example.test/");
        let overlay = driver.add(MAIN_FRAME, MockElement::new("div").attr("id", "modal"));
        driver.add(MAIN_FRAME, MockElement::new("button").attr("id", "go").covered_by(overlay));

        let err = prepare_target(&ctx(), &driver, &target("#go"), Duration::from_secs(1), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Obscured(_)));
        assert!(err.to_string().contains("div#modal"));
    }

    #[tokio::test]
    async fn test_hidden_target_times_out() {
        let driver = MockDriver::new("https://example.test/");
        driver.add(MAIN_FRAME, MockElement::new("button").attr("id", "go").hidden());
        let err = prepare_target(&ctx(), &driver, &target("#go"), Duration::from_millis(50), 2)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), wayfinder_core_types::ErrorKind::ActionTimeout);
    }
}
