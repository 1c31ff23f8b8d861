//! Select primitive - native `<select>` and rendered custom dropdowns

use action_locator::ResolvedTarget;
use cdp_adapter::{ClickOptions, OptionCandidate, PageDriver, SelectBy};
use tracing::debug;
use wayfinder_core_types::ExecCtx;

use crate::{
    errors::ActionError,
    interaction::{select_by_name, Dispatch},
    primitives::DefaultActionPrimitives,
    types::OptionSelection,
};

pub(super) async fn execute_native(
    primitives: &DefaultActionPrimitives,
    driver: &dyn PageDriver,
    target: &ResolvedTarget,
    by: &SelectBy,
) -> Result<Dispatch, ActionError> {
    let option = driver
        .select_native(&target.handle, by, primitives.timeouts().action())
        .await?;
    Ok(Dispatch::SelectedNative {
        selected_by: select_by_name(by),
        option,
    })
}

pub(super) async fn verify_native(
    driver: &dyn PageDriver,
    target: &ResolvedTarget,
    expected: &str,
) -> Result<(), ActionError> {
    let actual = driver.input_value(&target.handle).await?;
    if actual == expected {
        Ok(())
    } else {
        Err(ActionError::Verification(format!(
            "select {} holds {:?}, expected {:?}",
            target.element_id, actual, expected
        )))
    }
}

/// Opens the widget, narrows it through its search box, clicks the match.
pub(super) async fn execute_custom(
    primitives: &DefaultActionPrimitives,
    ctx: &ExecCtx,
    driver: &dyn PageDriver,
    target: &ResolvedTarget,
    selection: &OptionSelection,
) -> Result<Dispatch, ActionError> {
    let timeout = primitives.timeouts().action();
    driver
        .click(&target.handle, &ClickOptions::default(), timeout)
        .await?;

    let mut snapshot = driver.dropdown_snapshot(&target.frame).await?;
    let query = selection.label.as_ref().or(selection.value.as_ref());
    if let (Some(search), Some(query), None) = (snapshot.search_input.clone(), query, selection.index) {
        debug!(action_id = ?ctx.action_id, %query, "filtering dropdown");
        driver.fill(&search, query, timeout).await?;
        snapshot = driver.dropdown_snapshot(&target.frame).await?;
    }

    let chosen = match_option(&snapshot.options, selection).ok_or_else(|| {
        ActionError::OptionNotFound(format!(
            "no option matching {} among {} rendered",
            describe(selection),
            snapshot.options.len()
        ))
    })?;
    driver
        .click(&chosen.handle, &ClickOptions::default(), timeout)
        .await?;
    Ok(Dispatch::SelectedCustom {
        text: chosen.text.clone(),
        value: chosen.value.clone(),
    })
}

/// Index first, then exact value, then trimmed case-insensitive text.
fn match_option<'a>(options: &'a [OptionCandidate], selection: &OptionSelection) -> Option<&'a OptionCandidate> {
    if let Some(index) = selection.index {
        return options.get(index);
    }
    if let Some(value) = &selection.value {
        if let Some(found) = options.iter().find(|o| o.value.as_deref() == Some(value.as_str())) {
            return Some(found);
        }
    }
    let wanted: Vec<String> = [selection.label.as_ref(), selection.value.as_ref()]
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_lowercase())
        .collect();
    options
        .iter()
        .find(|o| wanted.contains(&o.text.trim().to_lowercase()))
}

fn describe(selection: &OptionSelection) -> String {
    let mut parts = Vec::new();
    if let Some(index) = selection.index {
        parts.push(format!("index={index}"));
    }
    if let Some(value) = &selection.value {
        parts.push(format!("value={value:?}"));
    }
    if let Some(label) = &selection.label {
        parts.push(format!("label={label:?}"));
    }
    parts.join(", ")
}
