//! Error types for frame and element resolution

use cdp_adapter::{AdapterError, AdapterErrorKind};
use perceiver_structural::FrameTreeError;
use thiserror::Error;
use wayfinder_core_types::{ElementId, ErrorKind, FrameId};

/// Why a single frame hop could not be taken.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HopFailure {
    #[error("frame element not found")]
    FrameElementMissing,

    #[error("frame element locator matched {0} elements")]
    FrameElementAmbiguous(usize),

    #[error("content frame is null")]
    ContentFrameNull,

    #[error("no locator recorded for frame")]
    MissingLocator,

    #[error("parent document detached: {0}")]
    Detached(AdapterError),
}

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocatorError {
    /// Logical id is not part of the scrape.
    #[error("element {id} is not in the scrape")]
    UnknownElement { id: ElementId },

    #[error("frame tree of element {id} is broken: {source}")]
    FrameTree {
        id: ElementId,
        #[source]
        source: FrameTreeError,
    },

    /// Hop `hop` (1-based position in the frame path) into `frame` failed.
    #[error("frame hop {hop} into {frame} failed: {reason}")]
    FrameHop {
        hop: usize,
        frame: FrameId,
        reason: HopFailure,
    },

    #[error("element {id} matches no live element")]
    NoMatch { id: ElementId },

    #[error("element {id} matches {count} live elements")]
    AmbiguousMatch { id: ElementId, count: usize },

    #[error("resolution cancelled")]
    Cancelled,

    #[error("driver error: {0}")]
    Driver(AdapterError),
}

impl LocatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LocatorError::UnknownElement { .. } | LocatorError::NoMatch { .. } => {
                ErrorKind::ElementMissing
            }
            LocatorError::FrameTree { .. } | LocatorError::FrameHop { .. } => {
                ErrorKind::FrameResolutionFailed
            }
            LocatorError::AmbiguousMatch { .. } => ErrorKind::AmbiguousElement,
            LocatorError::Cancelled => ErrorKind::Cancelled,
            LocatorError::Driver(err) => adapter_error_kind(err),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Failed hop index, for frame resolution failures.
    pub fn hop(&self) -> Option<usize> {
        match self {
            LocatorError::FrameHop { hop, .. } => Some(*hop),
            _ => None,
        }
    }
}

/// Maps a driver failure onto the engine-wide taxonomy.
pub fn adapter_error_kind(err: &AdapterError) -> ErrorKind {
    match err.kind {
        AdapterErrorKind::Timeout => ErrorKind::ActionTimeout,
        AdapterErrorKind::Detached => ErrorKind::StaleElement,
        AdapterErrorKind::TargetNotFound => ErrorKind::ElementMissing,
        AdapterErrorKind::OptionNotFound => ErrorKind::OptionNotFound,
        AdapterErrorKind::NotInteractable => ErrorKind::ElementNotInteractable,
        AdapterErrorKind::Obscured => ErrorKind::ElementObscured,
        AdapterErrorKind::Navigation => ErrorKind::NavigationFailed,
        AdapterErrorKind::Script | AdapterErrorKind::CdpIo | AdapterErrorKind::Internal => {
            ErrorKind::Internal
        }
    }
}
