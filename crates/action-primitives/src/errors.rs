//! Error types for action primitives

use action_locator::LocatorError;
use cdp_adapter::{AdapterError, AdapterErrorKind};
use thiserror::Error;
use wayfinder_core_types::ErrorKind;

/// Comprehensive error types for action operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ActionError {
    /// The action itself is malformed (missing target, empty selection, ...)
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Target could not be mapped to exactly one live element
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// Target resolved but is no longer attached to the document
    #[error("Element missing: {0}")]
    ElementMissing(String),

    /// Target is disabled, read-only or otherwise refuses the interaction
    #[error("Element not interactable: {0}")]
    NotInteractable(String),

    /// Another element keeps covering the target
    #[error("Element obscured: {0}")]
    Obscured(String),

    /// A bounded wait ran out
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Handle went stale between resolution and use
    #[error("Stale element: {0}")]
    Stale(String),

    /// Post-condition did not hold after the interaction
    #[error("Verification failed: {0}")]
    Verification(String),

    /// Dropdown option was not found
    #[error("Option not found: {0}")]
    OptionNotFound(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// Operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// CDP communication or script failure
    #[error("Driver error: {0}")]
    Driver(AdapterError),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::InvalidAction(_) => ErrorKind::InvalidAction,
            ActionError::Locator(err) => err.kind(),
            ActionError::ElementMissing(_) => ErrorKind::ElementMissing,
            ActionError::NotInteractable(_) => ErrorKind::ElementNotInteractable,
            ActionError::Obscured(_) => ErrorKind::ElementObscured,
            ActionError::Timeout(_) => ErrorKind::ActionTimeout,
            ActionError::Stale(_) => ErrorKind::StaleElement,
            ActionError::Verification(_) => ErrorKind::VerificationFailed,
            ActionError::OptionNotFound(_) => ErrorKind::OptionNotFound,
            ActionError::Navigation(_) => ErrorKind::NavigationFailed,
            ActionError::Cancelled => ErrorKind::Cancelled,
            ActionError::Driver(_) | ActionError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<AdapterError> for ActionError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::Timeout => ActionError::Timeout(message),
            AdapterErrorKind::Detached => ActionError::Stale(message),
            AdapterErrorKind::TargetNotFound => ActionError::ElementMissing(message),
            AdapterErrorKind::OptionNotFound => ActionError::OptionNotFound(message),
            AdapterErrorKind::NotInteractable => ActionError::NotInteractable(message),
            AdapterErrorKind::Obscured => ActionError::Obscured(message),
            AdapterErrorKind::Navigation => ActionError::Navigation(message),
            AdapterErrorKind::Script | AdapterErrorKind::CdpIo | AdapterErrorKind::Internal => {
                ActionError::Driver(err)
            }
        }
    }
}
