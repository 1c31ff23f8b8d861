//! What an action does to the page, decided after validation.

use cdp_adapter::{ClickOffset, ClickOptions, ElementState, Modifier, SelectBy, SelectedOption};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::errors::ActionError;
use crate::normalize::FieldKind;
use crate::types::{InputStrategy, OptionSelection};

/// Concrete browser interaction for one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// Anchor click replaced by loading its destination.
    Navigate { url: Url },
    Click { options: ClickOptions, download: bool },
    /// Field is cleared before `text` is entered.
    Enter {
        field: FieldKind,
        text: String,
        strategy: InputStrategy,
    },
    SelectNative { by: SelectBy },
    SelectCustom { selection: OptionSelection },
}

impl Interaction {
    /// Direct navigation for plain anchor clicks, a dispatched click otherwise.
    pub fn click(
        page_url: &str,
        state: &ElementState,
        modifiers: &[Modifier],
        offset: Option<ClickOffset>,
        download: bool,
    ) -> Self {
        let plain = modifiers.is_empty() && offset.is_none() && !download;
        if plain {
            if let Some(url) = navigation_target(page_url, state) {
                return Interaction::Navigate { url };
            }
        }
        Interaction::Click {
            options: ClickOptions {
                modifiers: modifiers.to_vec(),
                offset,
            },
            download,
        }
    }

    pub fn enter(state: &ElementState, raw: &str, strategy: InputStrategy) -> Self {
        let field = FieldKind::classify(state);
        Interaction::Enter {
            field,
            text: field.normalize(raw),
            strategy,
        }
    }

    pub fn select(state: &ElementState, selection: &OptionSelection) -> Result<Self, ActionError> {
        if state.is_native_select() {
            let by = selection.select_by().ok_or_else(|| {
                ActionError::InvalidAction("select_option needs an index, value or label".into())
            })?;
            return Ok(Interaction::SelectNative { by });
        }
        if selection.is_empty() {
            return Err(ActionError::InvalidAction(
                "select_option needs an index, value or label".into(),
            ));
        }
        Ok(Interaction::SelectCustom {
            selection: selection.clone(),
        })
    }

    /// Repeating the interaction leaves the page as a single run would.
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self,
            Interaction::Navigate { .. } | Interaction::Enter { .. } | Interaction::SelectNative { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Interaction::Navigate { .. } => "navigate",
            Interaction::Click { .. } => "click",
            Interaction::Enter { .. } => "enter_text",
            Interaction::SelectNative { .. } => "select_native",
            Interaction::SelectCustom { .. } => "select_custom",
        }
    }
}

/// Absolute destination of an anchor, when a direct load is equivalent to the click.
pub fn navigation_target(page_url: &str, state: &ElementState) -> Option<Url> {
    if !state.is_anchor() {
        return None;
    }
    let href = state.href.as_deref()?.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href.to_ascii_lowercase().starts_with("javascript:") {
        return None;
    }
    if let Some(target) = state.target.as_deref() {
        if !target.is_empty() && !target.eq_ignore_ascii_case("_self") {
            return None;
        }
    }
    let base = Url::parse(page_url).ok();
    let url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    matches!(url.scheme(), "http" | "https" | "file").then_some(url)
}

/// What an interaction did, kept for verification and reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Dispatch {
    Navigated {
        url_before: String,
        url_after: String,
        target: String,
    },
    Clicked {
        url_before: String,
        url_after: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        download: bool,
    },
    Entered {
        field: FieldKind,
        value: String,
        strategy: &'static str,
    },
    SelectedNative {
        selected_by: &'static str,
        option: SelectedOption,
    },
    SelectedCustom {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
}

impl Dispatch {
    /// The page moved to another URL, so the scrape the batch was planned on is stale.
    pub fn changed_url(&self) -> bool {
        match self {
            Dispatch::Navigated {
                url_before,
                url_after,
                ..
            }
            | Dispatch::Clicked {
                url_before,
                url_after,
                ..
            } => url_before != url_after,
            _ => false,
        }
    }

    pub fn payload(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

pub(crate) fn select_by_name(by: &SelectBy) -> &'static str {
    match by {
        SelectBy::Index(_) => "index",
        SelectBy::Value(_) => "value",
        SelectBy::Label(_) => "label",
    }
}
