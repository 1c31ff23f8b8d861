use cdp_adapter::{ElementHandle, FrameHandle};
use serde::{Deserialize, Serialize};
use wayfinder_core_types::{ElementId, FrameId};

/// A logical element mapped onto exactly one live element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTarget {
    pub element_id: ElementId,
    pub handle: ElementHandle,
    /// Innermost document the element was found in.
    pub frame: FrameHandle,
    /// Frame ids from `main` down to the owning frame.
    pub frame_path: Vec<FrameId>,
}

impl ResolvedTarget {
    /// Number of frame boundaries crossed.
    pub fn hops(&self) -> usize {
        self.frame_path.len().saturating_sub(1)
    }
}
