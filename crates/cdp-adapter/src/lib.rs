//! Browser driver layer for Wayfinder.
//!
//! [`PageDriver`] is the narrow surface the execution core talks to.
//! [`ChromiumDriver`] drives a real browser through the DevTools protocol;
//! [`mock::MockDriver`] is an in-memory page with fault injection.

pub mod chromium;
pub mod config;
pub mod driver;
pub mod error;
pub mod mock;
mod scripts;
pub mod types;

pub use chromium::ChromiumDriver;
pub use config::CdpConfig;
pub use driver::PageDriver;
pub use error::{AdapterError, AdapterErrorKind};
pub use types::{
    ClickOffset, ClickOptions, DropdownSnapshot, ElementHandle, ElementState, FrameHandle,
    FrameHop, Modifier, Obstruction, OptionCandidate, PageMetrics, RawElement, Rect, SelectBy,
    SelectedOption,
};
