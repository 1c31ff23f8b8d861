//! Element index for Wayfinder.
//!
//! Scrapes every reachable document of a page into a [`ScrapedPage`]:
//! elements carry ids derived from their content and position, so the same
//! page yields the same ids across scrapes, and each element records the
//! frame it lives in so it can be found again later.

pub mod element_tree;
pub mod errors;
pub mod fingerprint;
pub mod model;
pub mod structural;

pub use element_tree::{is_interactive, ElementTreeFormatter};
pub use errors::{FrameTreeError, ScrapeError};
pub use fingerprint::{fingerprint, IdAllocator};
pub use model::{ElementDescriptor, FrameNode, ScrapedPage, ScrapedPageBuilder, Screenshot};
pub use structural::{
    marker_selector, ElementIndexer, FrameCandidate, FrameFilter, IndexOptions, MARKER_ATTRIBUTE,
};
