//! Type text primitive - clear the field, enter normalized text, read it back

use action_locator::ResolvedTarget;
use cdp_adapter::PageDriver;
use std::time::Duration;

use crate::{
    errors::ActionError,
    interaction::Dispatch,
    normalize::FieldKind,
    primitives::DefaultActionPrimitives,
    types::InputStrategy,
};

pub(super) async fn execute_enter(
    primitives: &DefaultActionPrimitives,
    driver: &dyn PageDriver,
    target: &ResolvedTarget,
    field: FieldKind,
    text: &str,
    strategy: &InputStrategy,
) -> Result<Dispatch, ActionError> {
    let timeout = primitives.timeouts().action();
    match strategy {
        InputStrategy::Fill => driver.fill(&target.handle, text, timeout).await?,
        InputStrategy::Type { delay_ms } => {
            driver.fill(&target.handle, "", timeout).await?;
            let delay = Duration::from_millis(*delay_ms);
            let keys = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
            let typing = timeout.saturating_add(delay.saturating_mul(keys));
            driver
                .type_chars(&target.handle, text, delay, typing)
                .await?
        }
        InputStrategy::Paste => {
            driver.fill(&target.handle, "", timeout).await?;
            driver.paste(&target.handle, text, timeout).await?
        }
    }
    Ok(Dispatch::Entered {
        field,
        value: text.to_string(),
        strategy: strategy.name(),
    })
}

pub(super) async fn verify_entered(
    driver: &dyn PageDriver,
    target: &ResolvedTarget,
    field: FieldKind,
    expected: &str,
) -> Result<(), ActionError> {
    let actual = driver.input_value(&target.handle).await?;
    if actual == expected {
        return Ok(());
    }
    let detail = if field == FieldKind::Password {
        format!(
            "field {} holds {} characters, expected {}",
            target.element_id,
            actual.chars().count(),
            expected.chars().count()
        )
    } else {
        format!(
            "field {} holds {:?}, expected {:?}",
            target.element_id, actual, expected
        )
    };
    Err(ActionError::Verification(detail))
}
