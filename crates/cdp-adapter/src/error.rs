use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// High-level error categories surfaced by a page driver.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    #[error("operation timed out")]
    Timeout,
    /// Handle no longer points at a live node or document. No input was delivered.
    #[error("target detached")]
    Detached,
    #[error("target element not found")]
    TargetNotFound,
    #[error("option not found")]
    OptionNotFound,
    #[error("target not interactable")]
    NotInteractable,
    #[error("target obscured")]
    Obscured,
    #[error("navigation failed")]
    Navigation,
    #[error("script evaluation failed")]
    Script,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("internal error")]
    Internal,
}

impl AdapterErrorKind {
    pub(crate) fn from_wire(raw: &str) -> Self {
        match raw {
            "timeout" => Self::Timeout,
            "detached" => Self::Detached,
            "target_not_found" => Self::TargetNotFound,
            "option_not_found" => Self::OptionNotFound,
            "not_interactable" => Self::NotInteractable,
            "obscured" => Self::Obscured,
            "navigation" => Self::Navigation,
            "cdp_io" => Self::CdpIo,
            "internal" => Self::Internal,
            _ => Self::Script,
        }
    }
}

/// Enriched error metadata passed back to higher layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self { kind, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn timeout(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Timeout).with_hint(hint)
    }

    pub fn detached(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Detached).with_hint(hint)
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == AdapterErrorKind::Timeout
    }
}
