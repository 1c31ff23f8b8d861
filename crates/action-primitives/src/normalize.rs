//! Field classification and type-specific input normalization

use cdp_adapter::ElementState;
use serde::{Deserialize, Serialize};

/// Declared kind of a text-accepting field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Tel,
    Email,
    Password,
}

impl FieldKind {
    pub fn from_input_type(input_type: &str) -> Self {
        match input_type.trim().to_ascii_lowercase().as_str() {
            "number" | "range" => FieldKind::Number,
            "tel" => FieldKind::Tel,
            "email" => FieldKind::Email,
            "password" => FieldKind::Password,
            _ => FieldKind::Text,
        }
    }

    /// Textareas and contenteditable hosts are free text.
    pub fn classify(state: &ElementState) -> Self {
        state
            .input_type
            .as_deref()
            .map(Self::from_input_type)
            .unwrap_or(FieldKind::Text)
    }

    pub fn normalize(&self, raw: &str) -> String {
        match self {
            FieldKind::Text | FieldKind::Password => raw.to_string(),
            FieldKind::Tel => raw.chars().filter(char::is_ascii_digit).collect(),
            FieldKind::Number => normalize_number(raw),
            FieldKind::Email => raw.trim().to_lowercase(),
        }
    }
}

/// Digits, at most one decimal point, and a sign only when it leads.
fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    if trimmed.starts_with('-') {
        out.push('-');
    }
    let mut seen_point = false;
    for c in trimmed.chars() {
        match c {
            '0'..='9' => out.push(c),
            '.' if !seen_point => {
                seen_point = true;
                out.push(c);
            }
            _ => {}
        }
    }
    out
}
