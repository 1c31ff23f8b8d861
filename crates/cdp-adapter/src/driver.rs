use async_trait::async_trait;
use std::time::Duration;

use crate::error::AdapterError;
use crate::types::{
    ClickOptions, DropdownSnapshot, ElementHandle, ElementState, FrameHandle, Obstruction,
    PageMetrics, RawElement, SelectBy, SelectedOption,
};

/// Browser automation surface the execution core drives.
///
/// Every wait is bounded by the explicit timeout passed in. Interaction
/// primitives (`click`, `fill`, `type_chars`, `paste`, `select_native`)
/// report [`AdapterErrorKind::Detached`](crate::AdapterErrorKind::Detached)
/// only when the handle failed to resolve, i.e. before any input reached
/// the page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn current_url(&self) -> Result<String, AdapterError>;

    /// Candidate elements of one document, in document order.
    async fn enumerate_elements(&self, frame: &FrameHandle) -> Result<Vec<RawElement>, AdapterError>;

    /// Clears `attr` from every element of `frame`, then sets it on the first
    /// match of each `(selector, value)` pair. Returns how many were marked.
    async fn set_markers(
        &self,
        frame: &FrameHandle,
        attr: &str,
        marks: &[(String, String)],
    ) -> Result<usize, AdapterError>;

    async fn query_all(
        &self,
        frame: &FrameHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, AdapterError>;

    /// Document owned by a frame element, `None` when it is absent or inaccessible.
    async fn content_frame(&self, element: &ElementHandle) -> Result<Option<FrameHandle>, AdapterError>;

    async fn element_state(&self, element: &ElementHandle) -> Result<ElementState, AdapterError>;

    async fn scroll_into_view(&self, element: &ElementHandle, timeout: Duration) -> Result<(), AdapterError>;

    async fn wait_for_visible(&self, element: &ElementHandle, timeout: Duration) -> Result<(), AdapterError>;

    async fn obstruction(&self, element: &ElementHandle) -> Result<Option<Obstruction>, AdapterError>;

    /// Tries to get a blocker out of the way. Returns whether it is gone.
    async fn dismiss_obstruction(
        &self,
        obstruction: &Obstruction,
        timeout: Duration,
    ) -> Result<bool, AdapterError>;

    async fn click(
        &self,
        element: &ElementHandle,
        options: &ClickOptions,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), AdapterError>;

    /// Replaces the field value in one operation.
    async fn fill(&self, element: &ElementHandle, text: &str, timeout: Duration) -> Result<(), AdapterError>;

    /// Sends `text` one character at a time with `delay` between characters.
    async fn type_chars(
        &self,
        element: &ElementHandle,
        text: &str,
        delay: Duration,
        timeout: Duration,
    ) -> Result<(), AdapterError>;

    /// Inserts `text` at the caret as a single paste.
    async fn paste(&self, element: &ElementHandle, text: &str, timeout: Duration) -> Result<(), AdapterError>;

    async fn input_value(&self, element: &ElementHandle) -> Result<String, AdapterError>;

    async fn select_native(
        &self,
        element: &ElementHandle,
        by: &SelectBy,
        timeout: Duration,
    ) -> Result<SelectedOption, AdapterError>;

    async fn dropdown_snapshot(&self, frame: &FrameHandle) -> Result<DropdownSnapshot, AdapterError>;

    async fn page_metrics(&self) -> Result<PageMetrics, AdapterError>;

    async fn scroll_to(&self, y: f64) -> Result<(), AdapterError>;

    async fn screenshot(&self, timeout: Duration) -> Result<Vec<u8>, AdapterError>;
}
