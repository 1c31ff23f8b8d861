//! Core data types for actions

use cdp_adapter::{ClickOffset, Modifier, SelectBy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use wayfinder_core_types::{ActionId, ElementId, ErrorKind};

use crate::errors::ActionError;

/// One planned browser action.
///
/// Serialized flat: `{"action_type": "click", "element_id": "...", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub id: ActionId,

    /// Target element; absent for terminal actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<ElementId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default)]
    pub status: ActionStatus,

    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum ActionKind {
    Click {
        /// The click is expected to start a download.
        #[serde(default)]
        download: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        modifiers: Vec<Modifier>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset: Option<ClickOffset>,
    },
    InputText {
        text: String,
        #[serde(default)]
        strategy: InputStrategy,
    },
    SelectOption {
        option: OptionSelection,
    },
    Complete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verification: Option<Value>,
    },
    Terminate {
        #[serde(default)]
        errors: Vec<UserDefinedError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Skipped,
}

/// How text reaches an input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum InputStrategy {
    /// Assign the whole value at once.
    #[default]
    Fill,
    /// One key per character with a pause in between.
    Type {
        #[serde(default = "default_key_delay_ms")]
        delay_ms: u64,
    },
    /// Single clipboard-style insertion.
    Paste,
}

fn default_key_delay_ms() -> u64 {
    50
}

/// Longest pause between typed characters an action may ask for.
pub const MAX_KEY_DELAY_MS: u64 = 5_000;

impl InputStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            InputStrategy::Fill => "fill",
            InputStrategy::Type { .. } => "type",
            InputStrategy::Paste => "paste",
        }
    }
}

/// Option criteria. When several are given, index wins over value, value over label.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl OptionSelection {
    pub fn by_index(index: usize) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    pub fn by_value(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn by_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_none() && self.value.is_none() && self.label.is_none()
    }

    /// The single criterion used for a native select.
    pub fn select_by(&self) -> Option<SelectBy> {
        if let Some(index) = self.index {
            return Some(SelectBy::Index(index));
        }
        if let Some(value) = &self.value {
            return Some(SelectBy::Value(value.clone()));
        }
        self.label.clone().map(SelectBy::Label)
    }
}

/// Failure reported by the planner through a Terminate action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDefinedError {
    pub error_code: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl Action {
    pub fn new(kind: ActionKind, element_id: Option<ElementId>) -> Self {
        Self {
            id: ActionId::new(),
            element_id,
            reasoning: None,
            confidence: None,
            status: ActionStatus::Pending,
            kind,
        }
    }

    pub fn click(element_id: impl Into<ElementId>) -> Self {
        Self::new(
            ActionKind::Click {
                download: false,
                modifiers: Vec::new(),
                offset: None,
            },
            Some(element_id.into()),
        )
    }

    pub fn input_text(element_id: impl Into<ElementId>, text: impl Into<String>) -> Self {
        Self::new(
            ActionKind::InputText {
                text: text.into(),
                strategy: InputStrategy::Fill,
            },
            Some(element_id.into()),
        )
    }

    pub fn select_option(element_id: impl Into<ElementId>, option: OptionSelection) -> Self {
        Self::new(ActionKind::SelectOption { option }, Some(element_id.into()))
    }

    pub fn complete(verification: Option<Value>) -> Self {
        Self::new(ActionKind::Complete { verification }, None)
    }

    pub fn terminate(errors: Vec<UserDefinedError>) -> Self {
        Self::new(ActionKind::Terminate { errors }, None)
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_strategy(mut self, strategy: InputStrategy) -> Self {
        if let ActionKind::InputText { strategy: current, .. } = &mut self.kind {
            *current = strategy;
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            ActionKind::Click { .. } => "click",
            ActionKind::InputText { .. } => "input_text",
            ActionKind::SelectOption { .. } => "select_option",
            ActionKind::Complete { .. } => "complete",
            ActionKind::Terminate { .. } => "terminate",
        }
    }

    /// Complete and Terminate end the task instead of touching the page.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            ActionKind::Complete { .. } | ActionKind::Terminate { .. }
        )
    }

    pub fn requires_target(&self) -> bool {
        !self.is_terminal()
    }

    /// Structural checks that need no page.
    pub fn validate(&self) -> Result<(), ActionError> {
        if self.requires_target() && self.element_id.is_none() {
            return Err(ActionError::InvalidAction(format!(
                "{} requires an element_id",
                self.name()
            )));
        }
        if let Some(confidence) = self.confidence {
            if !(0.0..=1.0).contains(&confidence) {
                return Err(ActionError::InvalidAction(format!(
                    "confidence {confidence} outside [0, 1]"
                )));
            }
        }
        match &self.kind {
            ActionKind::SelectOption { option } if option.is_empty() => Err(
                ActionError::InvalidAction("select_option needs an index, value or label".into()),
            ),
            ActionKind::InputText {
                strategy: InputStrategy::Type { delay_ms },
                ..
            } if *delay_ms > MAX_KEY_DELAY_MS => Err(ActionError::InvalidAction(format!(
                "key delay {delay_ms}ms exceeds {MAX_KEY_DELAY_MS}ms"
            ))),
            ActionKind::Terminate { errors } if errors.iter().any(|e| e.error_code.is_empty()) => {
                Err(ActionError::InvalidAction("terminate error without error_code".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Outcome of one action, as recorded in a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Structured output of the interaction.
    #[serde(default)]
    pub data: Value,
    pub elapsed_ms: u64,
    /// Remaining actions of the batch must not run.
    #[serde(default)]
    pub halt_batch: bool,
    /// Attempts made, including the first.
    #[serde(default)]
    pub attempts: u32,
}

impl ActionResult {
    pub fn succeeded(data: Value, elapsed_ms: u64, attempts: u32) -> Self {
        Self {
            success: true,
            failure_reason: None,
            error_kind: None,
            data,
            elapsed_ms,
            halt_batch: false,
            attempts,
        }
    }

    /// Failed result; a failure always halts the rest of the batch.
    pub fn failed(error: &ActionError, elapsed_ms: u64, attempts: u32) -> Self {
        Self {
            success: false,
            failure_reason: Some(error.to_string()),
            error_kind: Some(error.kind()),
            data: Value::Null,
            elapsed_ms,
            halt_batch: true,
            attempts,
        }
    }

    pub fn with_halt(mut self, halt: bool) -> Self {
        self.halt_batch = halt;
        self
    }
}

/// Bounds for every wait the primitives perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionTimeouts {
    pub visibility_ms: u64,
    pub action_ms: u64,
    pub navigation_ms: u64,
}

impl Default for ActionTimeouts {
    fn default() -> Self {
        Self {
            visibility_ms: 5_000,
            action_ms: 10_000,
            navigation_ms: 30_000,
        }
    }
}

impl ActionTimeouts {
    pub fn visibility(&self) -> Duration {
        Duration::from_millis(self.visibility_ms)
    }

    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }
}
