use cdp_adapter::AdapterError;
use thiserror::Error;
use wayfinder_core_types::{ErrorKind, FrameId};

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("root frame unavailable: {0}")]
    RootFrameGone(AdapterError),
    #[error("scrape cancelled")]
    Cancelled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::RootFrameGone(_) => ErrorKind::ScrapeFailed,
            ScrapeError::Cancelled => ErrorKind::Cancelled,
            ScrapeError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// The recorded frame tree cannot produce a root-to-frame chain.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameTreeError {
    #[error("frame {0} is not part of the scrape")]
    UnknownFrame(FrameId),
    #[error("frame tree loops back through {0}")]
    Cycle(FrameId),
}
