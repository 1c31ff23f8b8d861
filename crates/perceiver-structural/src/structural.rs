//! Breadth-first frame traversal producing a [`ScrapedPage`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{FrameHandle, PageDriver, RawElement};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wayfinder_core_types::{ElementId, ExecCtx, FrameId};

use crate::errors::ScrapeError;
use crate::fingerprint::{fingerprint, IdAllocator};
use crate::model::{ElementDescriptor, ScrapedPage, ScrapedPageBuilder, Screenshot};

pub const MARKER_ATTRIBUTE: &str = "data-wayfinder-id";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Deepest frame nesting entered; `main` is depth 0.
    pub max_frame_depth: usize,
    pub max_elements: usize,
    /// Keep elements that are not visible. Frame hosts are always kept.
    pub include_hidden: bool,
    pub mark_elements: bool,
    pub marker_attribute: String,
    /// Viewport screenshots captured while scrolling down; 0 disables capture.
    pub screenshots: usize,
    pub screenshot_timeout_ms: u64,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_frame_depth: 5,
            max_elements: 1_000,
            include_hidden: false,
            mark_elements: true,
            marker_attribute: MARKER_ATTRIBUTE.to_string(),
            screenshots: 1,
            screenshot_timeout_ms: 5_000,
        }
    }
}

impl IndexOptions {
    pub fn with_screenshots(mut self, count: usize) -> Self {
        self.screenshots = count;
        self
    }

    pub fn with_marking(mut self, mark: bool) -> Self {
        self.mark_elements = mark;
        self
    }

    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }
}

/// Frame about to be entered, offered to the exclusion predicate.
#[derive(Debug)]
pub struct FrameCandidate<'a> {
    pub id: &'a FrameId,
    pub parent: &'a FrameId,
    pub depth: usize,
    pub host: &'a ElementDescriptor,
}

/// Returns `true` for frames the indexer must not enter.
pub type FrameFilter = Arc<dyn Fn(&FrameCandidate<'_>) -> bool + Send + Sync>;

#[derive(Clone, Default)]
pub struct ElementIndexer {
    options: IndexOptions,
    exclude: Option<FrameFilter>,
}

impl fmt::Debug for ElementIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementIndexer")
            .field("options", &self.options)
            .field("exclude", &self.exclude.is_some())
            .finish()
    }
}

struct PendingElement {
    descriptor: ElementDescriptor,
    is_frame: bool,
}

impl ElementIndexer {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            options,
            exclude: None,
        }
    }

    pub fn with_frame_filter(mut self, filter: FrameFilter) -> Self {
        self.exclude = Some(filter);
        self
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// Scrapes the page behind `driver`.
    ///
    /// A frame that detaches mid-traversal is skipped; losing the top
    /// document fails the scrape.
    pub async fn scrape(&self, ctx: &ExecCtx, driver: &dyn PageDriver) -> Result<ScrapedPage, ScrapeError> {
        ctx.ensure_active().map_err(|_| ScrapeError::Cancelled)?;
        let url = driver
            .current_url()
            .await
            .map_err(ScrapeError::RootFrameGone)?;

        let mut builder = ScrapedPageBuilder::new(url);
        let mut ids = IdAllocator::new();
        let mut queue = VecDeque::from([(FrameId::main(), FrameHandle::top(), 0usize)]);
        let mut total = 0usize;
        let mut frames_entered = 0usize;

        while let Some((frame_id, handle, depth)) = queue.pop_front() {
            ctx.ensure_active().map_err(|_| ScrapeError::Cancelled)?;
            let raws = match driver.enumerate_elements(&handle).await {
                Ok(raws) => raws,
                Err(err) if frame_id.is_main() => return Err(ScrapeError::RootFrameGone(err)),
                Err(err) => {
                    warn!(task_id = %ctx.task_id, frame = %frame_id, %err, "frame detached during scrape; skipping");
                    builder.drop_frame(&frame_id);
                    continue;
                }
            };
            frames_entered += 1;

            let pending = self.describe_frame(&frame_id, raws, &mut ids, &mut total);
            let marked = self.mark_frame(ctx, driver, &frame_id, &handle, &pending).await;

            let mut child_ordinal = 0usize;
            for PendingElement {
                mut descriptor,
                is_frame,
            } in pending
            {
                let locator = if marked {
                    marker_selector(&self.options.marker_attribute, &descriptor.id)
                } else {
                    descriptor.dom_path.clone()
                };

                if is_frame {
                    child_ordinal += 1;
                    let child_id = child_frame_id(&frame_id, child_ordinal);
                    if let Some(child_handle) = self
                        .enter_frame(ctx, driver, &handle, &frame_id, &child_id, depth + 1, &descriptor, &locator)
                        .await
                    {
                        builder.push_frame(child_id.clone(), frame_id.clone(), Some(descriptor.id.clone()), locator.clone());
                        descriptor.hosts_frame = Some(child_id.clone());
                        queue.push_back((child_id, child_handle, depth + 1));
                    }
                }
                builder.push_element(descriptor, locator);
            }
        }

        self.capture_screenshots(ctx, driver, &mut builder).await;
        let page = builder.build();
        info!(
            task_id = %ctx.task_id,
            step = ctx.step_index,
            url = %page.url(),
            elements = page.len(),
            frames = frames_entered,
            "page scraped"
        );
        Ok(page)
    }

    fn describe_frame(
        &self,
        frame_id: &FrameId,
        raws: Vec<RawElement>,
        ids: &mut IdAllocator,
        total: &mut usize,
    ) -> Vec<PendingElement> {
        let mut pending = Vec::with_capacity(raws.len());
        for mut raw in raws {
            if *total >= self.options.max_elements {
                debug!(frame = %frame_id, limit = self.options.max_elements, "element limit reached");
                break;
            }
            if !raw.is_frame && !raw.visible && !self.options.include_hidden {
                continue;
            }
            raw.attributes.remove(&self.options.marker_attribute);
            let id = ids.allocate(fingerprint(frame_id, &raw));
            *total += 1;
            pending.push(PendingElement {
                is_frame: raw.is_frame,
                descriptor: ElementDescriptor {
                    id,
                    frame_id: frame_id.clone(),
                    tag: raw.tag.to_ascii_lowercase(),
                    text: raw.text,
                    attributes: raw.attributes,
                    dom_path: raw.dom_path,
                    visible: raw.visible,
                    enabled: raw.enabled,
                    in_dom: true,
                    rect: raw.rect,
                    hosts_frame: None,
                },
            });
        }
        pending
    }

    /// Writes marker attributes; `false` means locators fall back to DOM paths.
    async fn mark_frame(
        &self,
        ctx: &ExecCtx,
        driver: &dyn PageDriver,
        frame_id: &FrameId,
        handle: &FrameHandle,
        pending: &[PendingElement],
    ) -> bool {
        if !self.options.mark_elements || pending.is_empty() {
            return false;
        }
        let marks: Vec<(String, String)> = pending
            .iter()
            .map(|p| (p.descriptor.dom_path.clone(), p.descriptor.id.0.clone()))
            .collect();
        match driver
            .set_markers(handle, &self.options.marker_attribute, &marks)
            .await
        {
            Ok(count) if count == marks.len() => true,
            Ok(count) => {
                warn!(task_id = %ctx.task_id, frame = %frame_id, marked = count, expected = marks.len(), "partial marking; using structural paths");
                false
            }
            Err(err) => {
                warn!(task_id = %ctx.task_id, frame = %frame_id, %err, "marking failed; using structural paths");
                false
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn enter_frame(
        &self,
        ctx: &ExecCtx,
        driver: &dyn PageDriver,
        parent_handle: &FrameHandle,
        parent: &FrameId,
        child: &FrameId,
        depth: usize,
        host: &ElementDescriptor,
        locator: &str,
    ) -> Option<FrameHandle> {
        if depth > self.options.max_frame_depth {
            debug!(frame = %child, depth, "frame below depth limit; not entered");
            return None;
        }
        if let Some(exclude) = &self.exclude {
            let candidate = FrameCandidate {
                id: child,
                parent,
                depth,
                host,
            };
            if exclude(&candidate) {
                debug!(frame = %child, "frame excluded by filter");
                return None;
            }
        }
        let hosts = match driver.query_all(parent_handle, locator).await {
            Ok(hosts) if hosts.len() == 1 => hosts,
            Ok(hosts) => {
                warn!(task_id = %ctx.task_id, frame = %child, matches = hosts.len(), "frame host not unique; skipping");
                return None;
            }
            Err(err) => {
                warn!(task_id = %ctx.task_id, frame = %child, %err, "frame host lookup failed; skipping");
                return None;
            }
        };
        match driver.content_frame(&hosts[0]).await {
            Ok(Some(handle)) => Some(handle),
            Ok(None) => {
                warn!(task_id = %ctx.task_id, frame = %child, "frame has no accessible document; skipping");
                None
            }
            Err(err) => {
                warn!(task_id = %ctx.task_id, frame = %child, %err, "frame detached during scrape; skipping");
                None
            }
        }
    }

    async fn capture_screenshots(&self, ctx: &ExecCtx, driver: &dyn PageDriver, builder: &mut ScrapedPageBuilder) {
        if self.options.screenshots == 0 {
            return;
        }
        let timeout = Duration::from_millis(self.options.screenshot_timeout_ms);
        let metrics = match driver.page_metrics().await {
            Ok(metrics) => metrics,
            Err(err) => {
                warn!(task_id = %ctx.task_id, %err, "page metrics unavailable; no screenshots");
                return;
            }
        };

        if self.options.screenshots == 1 {
            match driver.screenshot(timeout).await {
                Ok(png) => builder.push_screenshot(Screenshot {
                    frame_id: FrameId::main(),
                    scroll_y: metrics.scroll_y,
                    png,
                }),
                Err(err) => warn!(task_id = %ctx.task_id, %err, "screenshot failed"),
            }
            return;
        }

        let step = metrics.viewport_height.max(1.0);
        let max_scroll = (metrics.document_height - metrics.viewport_height).max(0.0);
        let mut y = 0.0_f64;
        for shot in 0..self.options.screenshots {
            if shot > 0 {
                if y >= max_scroll {
                    break;
                }
                y = (y + step).min(max_scroll);
            }
            if let Err(err) = driver.scroll_to(y).await {
                warn!(task_id = %ctx.task_id, %err, "scroll for screenshot failed");
                break;
            }
            match driver.screenshot(timeout).await {
                Ok(png) => builder.push_screenshot(Screenshot {
                    frame_id: FrameId::main(),
                    scroll_y: y,
                    png,
                }),
                Err(err) => {
                    warn!(task_id = %ctx.task_id, %err, "screenshot failed");
                    break;
                }
            }
        }
        if let Err(err) = driver.scroll_to(metrics.scroll_y).await {
            warn!(task_id = %ctx.task_id, %err, "failed to restore scroll position");
        }
    }
}

pub fn marker_selector(attr: &str, id: &ElementId) -> String {
    format!("[{}=\"{}\"]", attr, id)
}

fn child_frame_id(parent: &FrameId, ordinal: usize) -> FrameId {
    if parent.is_main() {
        FrameId(format!("iframe-{ordinal}"))
    } else {
        FrameId(format!("{parent}-{ordinal}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_frame_ids() {
        let first = child_frame_id(&FrameId::main(), 1);
        assert_eq!(first.as_str(), "iframe-1");
        assert_eq!(child_frame_id(&first, 2).as_str(), "iframe-1-2");
    }

    #[test]
    fn test_marker_selector() {
        assert_eq!(
            marker_selector(MARKER_ATTRIBUTE, &ElementId::from("ab12cd34")),
            "[data-wayfinder-id=\"ab12cd34\"]"
        );
    }
}
