//! Coerce untyped planner output into a validated action batch.

use action_primitives::{
    Action, ActionKind, InputStrategy, OptionSelection, UserDefinedError,
};
use cdp_adapter::{ClickOffset, Modifier};
use serde_json::{Map, Value};
use wayfinder_core_types::ElementId;

use crate::errors::PlannerError;

const TAG_KEYS: [&str; 3] = ["action_type", "action", "type"];
const TARGET_KEYS: [&str; 2] = ["element_id", "id"];

/// Accepts a bare array, `{"actions": [...]}` or a single action object.
///
/// Every action must validate; the batch ends at its first terminal action.
pub fn parse_actions(response: &Value) -> Result<Vec<Action>, PlannerError> {
    let raw: Vec<&Value> = match response {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match map.get("actions") {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(_) => return Err(PlannerError::malformed("\"actions\" is not an array")),
            None => vec![response],
        },
        _ => return Err(PlannerError::malformed("expected an array or object of actions")),
    };
    if raw.is_empty() {
        return Err(PlannerError::malformed("planner returned no actions"));
    }

    let mut batch = Vec::with_capacity(raw.len());
    for (position, value) in raw.into_iter().enumerate() {
        let action = parse_action(value)
            .and_then(|action| {
                action
                    .validate()
                    .map(|_| action)
                    .map_err(|err| PlannerError::malformed(err.to_string()))
            })
            .map_err(|err| match err {
                PlannerError::Malformed(reason) => {
                    PlannerError::malformed(format!("action {position}: {reason}"))
                }
                other => other,
            })?;
        let terminal = action.is_terminal();
        batch.push(action);
        if terminal {
            break;
        }
    }
    Ok(batch)
}

fn parse_action(value: &Value) -> Result<Action, PlannerError> {
    let map = value
        .as_object()
        .ok_or_else(|| PlannerError::malformed("action is not an object"))?;
    let tag = TAG_KEYS
        .iter()
        .find_map(|key| map.get(*key).and_then(Value::as_str))
        .ok_or_else(|| PlannerError::malformed("missing action type"))?;

    let kind = match tag.trim().to_ascii_lowercase().as_str() {
        "click" | "click_element" => ActionKind::Click {
            download: map.get("download").and_then(Value::as_bool).unwrap_or(false),
            modifiers: modifiers(map)?,
            offset: offset(map)?,
        },
        "input_text" | "type_text" | "input" | "type" | "fill" => ActionKind::InputText {
            text: string_field(map, &["text", "value"])
                .ok_or_else(|| PlannerError::malformed("input_text without text"))?,
            strategy: strategy(map)?,
        },
        "select_option" | "select" | "select_dropdown_option" => ActionKind::SelectOption {
            option: option(map)?,
        },
        "complete" | "done" | "finish" => ActionKind::Complete {
            verification: map
                .get("verification")
                .or_else(|| map.get("output"))
                .filter(|value| !value.is_null())
                .cloned(),
        },
        "terminate" | "abort" | "fail" => ActionKind::Terminate {
            errors: errors(map)?,
        },
        other => return Err(PlannerError::malformed(format!("unknown action type {other:?}"))),
    };

    let mut action = Action::new(kind, target(map));
    action.reasoning = string_field(map, &["reasoning", "reason", "thought"]);
    action.confidence = map.get("confidence").and_then(Value::as_f64);
    Ok(action)
}

fn target(map: &Map<String, Value>) -> Option<ElementId> {
    TARGET_KEYS.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(id)) if !id.trim().is_empty() => Some(ElementId::from(id.trim())),
        Some(Value::Number(id)) => Some(ElementId::from(id.to_string())),
        _ => None,
    })
}

fn string_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn modifiers(map: &Map<String, Value>) -> Result<Vec<Modifier>, PlannerError> {
    let Some(raw) = map.get("modifiers") else {
        return Ok(Vec::new());
    };
    let items = raw
        .as_array()
        .ok_or_else(|| PlannerError::malformed("modifiers is not an array"))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(Modifier::parse)
                .ok_or_else(|| PlannerError::malformed(format!("unknown modifier {item}")))
        })
        .collect()
}

fn offset(map: &Map<String, Value>) -> Result<Option<ClickOffset>, PlannerError> {
    match map.get("offset") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let x = value.get("x").and_then(Value::as_f64);
            let y = value.get("y").and_then(Value::as_f64);
            match (x, y) {
                (Some(x), Some(y)) => Ok(Some(ClickOffset { x, y })),
                _ => Err(PlannerError::malformed("offset needs numeric x and y")),
            }
        }
    }
}

fn strategy(map: &Map<String, Value>) -> Result<InputStrategy, PlannerError> {
    let (mode, delay) = match map.get("strategy") {
        None | Some(Value::Null) => return Ok(InputStrategy::Fill),
        Some(Value::String(mode)) => (mode.as_str(), map.get("delay_ms")),
        Some(Value::Object(inner)) => (
            inner.get("mode").and_then(Value::as_str).unwrap_or("fill"),
            inner.get("delay_ms").or_else(|| map.get("delay_ms")),
        ),
        Some(other) => {
            return Err(PlannerError::malformed(format!("strategy {other} is not a string")))
        }
    };
    match mode.to_ascii_lowercase().as_str() {
        "fill" => Ok(InputStrategy::Fill),
        "paste" => Ok(InputStrategy::Paste),
        "type" | "keys" => Ok(InputStrategy::Type {
            delay_ms: delay.and_then(Value::as_u64).unwrap_or(50),
        }),
        other => Err(PlannerError::malformed(format!("unknown input strategy {other:?}"))),
    }
}

fn option(map: &Map<String, Value>) -> Result<OptionSelection, PlannerError> {
    let source = match map.get("option") {
        Some(Value::Object(inner)) => inner,
        Some(Value::String(label)) => return Ok(OptionSelection::by_label(label.clone())),
        Some(Value::Number(index)) => {
            return index
                .as_u64()
                .map(|index| OptionSelection::by_index(index as usize))
                .ok_or_else(|| PlannerError::malformed("option index must be a whole number"))
        }
        _ => map,
    };
    Ok(OptionSelection {
        index: source
            .get("index")
            .or_else(|| source.get("option_index"))
            .and_then(Value::as_u64)
            .map(|index| index as usize),
        value: string_field(source, &["value", "option_value"]),
        label: string_field(source, &["label", "text", "option_label"]),
    })
}

fn errors(map: &Map<String, Value>) -> Result<Vec<UserDefinedError>, PlannerError> {
    match map.get("errors") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|err| PlannerError::malformed(format!("terminate errors: {err}"))),
    }
}
