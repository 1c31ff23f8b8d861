//! Frame resolver for Wayfinder.
//!
//! Turns a logical element id from a [`ScrapedPage`](perceiver_structural::ScrapedPage)
//! back into a live element handle, descending through every nested frame
//! recorded at scrape time. Ambiguity is always an error.

pub mod errors;
pub mod resolver;
pub mod types;

pub use errors::{adapter_error_kind, HopFailure, LocatorError};
pub use resolver::{ElementResolver, FrameResolver};
pub use types::ResolvedTarget;
