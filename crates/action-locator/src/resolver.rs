//! Logical id to live handle resolution through the recorded frame tree

use crate::{
    errors::{HopFailure, LocatorError},
    types::ResolvedTarget,
};
use async_trait::async_trait;
use cdp_adapter::{AdapterError, AdapterErrorKind, ElementHandle, FrameHandle, PageDriver};
use perceiver_structural::ScrapedPage;
use tracing::{debug, warn};
use wayfinder_core_types::{ElementId, ExecCtx, FrameId};

/// Element resolver trait
#[async_trait]
pub trait ElementResolver: Send + Sync {
    /// Resolve `element_id` from `page` to exactly one live element.
    async fn resolve(
        &self,
        ctx: &ExecCtx,
        page: &ScrapedPage,
        element_id: &ElementId,
        driver: &dyn PageDriver,
    ) -> Result<ResolvedTarget, LocatorError>;
}

/// Walks the frame path root to leaf, one hop per nested frame.
///
/// Never retries and never picks among several matches: every frame
/// element and the target itself must match exactly once.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameResolver;

impl FrameResolver {
    pub fn new() -> Self {
        Self
    }

    /// Enters every frame of `path` after the leading `main`.
    ///
    /// Hop `i` enters `path[i]`; a failure names the first hop that broke.
    pub async fn descend(
        &self,
        ctx: &ExecCtx,
        page: &ScrapedPage,
        path: &[FrameId],
        driver: &dyn PageDriver,
    ) -> Result<FrameHandle, LocatorError> {
        let mut current = FrameHandle::top();
        for (hop, frame_id) in path.iter().enumerate().skip(1) {
            ctx.ensure_active().map_err(|_| LocatorError::Cancelled)?;
            let hop_failed = |reason: HopFailure| LocatorError::FrameHop {
                hop,
                frame: frame_id.clone(),
                reason,
            };

            let locator = page
                .frame(frame_id)
                .and_then(|node| node.locator.as_deref())
                .ok_or_else(|| hop_failed(HopFailure::MissingLocator))?;

            let mut hosts = driver
                .query_all(&current, locator)
                .await
                .map_err(|err| hop_driver_error(hop, frame_id, err))?;
            match hosts.len() {
                1 => {}
                0 => return Err(hop_failed(HopFailure::FrameElementMissing)),
                n => return Err(hop_failed(HopFailure::FrameElementAmbiguous(n))),
            }
            let host = hosts.swap_remove(0);

            current = driver
                .content_frame(&host)
                .await
                .map_err(|err| hop_driver_error(hop, frame_id, err))?
                .ok_or_else(|| hop_failed(HopFailure::ContentFrameNull))?;
            debug!(task_id = %ctx.task_id, hop, frame = %frame_id, "entered frame");
        }
        Ok(current)
    }
}

#[async_trait]
impl ElementResolver for FrameResolver {
    async fn resolve(
        &self,
        ctx: &ExecCtx,
        page: &ScrapedPage,
        element_id: &ElementId,
        driver: &dyn PageDriver,
    ) -> Result<ResolvedTarget, LocatorError> {
        ctx.ensure_active().map_err(|_| LocatorError::Cancelled)?;
        let unknown = || LocatorError::UnknownElement {
            id: element_id.clone(),
        };
        let descriptor = page.element(element_id).ok_or_else(unknown)?;
        let locator = page.locator(element_id).ok_or_else(unknown)?;
        let frame_path = page
            .frame_path(&descriptor.frame_id)
            .map_err(|source| LocatorError::FrameTree {
                id: element_id.clone(),
                source,
            })?;

        let frame = match self.descend(ctx, page, &frame_path, driver).await {
            Ok(frame) => frame,
            Err(err) => {
                warn!(task_id = %ctx.task_id, element_id = %element_id, %err, "frame resolution failed");
                return Err(err);
            }
        };

        let mut matches = driver
            .query_all(&frame, locator)
            .await
            .map_err(LocatorError::Driver)?;
        let handle: ElementHandle = match matches.len() {
            1 => matches.swap_remove(0),
            0 => {
                return Err(LocatorError::NoMatch {
                    id: element_id.clone(),
                })
            }
            count => {
                return Err(LocatorError::AmbiguousMatch {
                    id: element_id.clone(),
                    count,
                })
            }
        };

        debug!(
            task_id = %ctx.task_id,
            element_id = %element_id,
            hops = frame_path.len() - 1,
            "element resolved"
        );
        Ok(ResolvedTarget {
            element_id: element_id.clone(),
            handle,
            frame,
            frame_path,
        })
    }
}

/// A detached parent document breaks the hop; other driver faults pass through.
fn hop_driver_error(hop: usize, frame: &FrameId, err: AdapterError) -> LocatorError {
    if err.kind == AdapterErrorKind::Detached {
        LocatorError::FrameHop {
            hop,
            frame: frame.clone(),
            reason: HopFailure::Detached(err),
        }
    } else {
        LocatorError::Driver(err)
    }
}
