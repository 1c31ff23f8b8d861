//! [`PageDriver`] over a real Chromium through `chromiumoxide`.
//!
//! DOM work runs as scripts evaluated in the top document; nested documents
//! are reached through `contentDocument`, so only same-origin frames are
//! addressable. Pointer and keyboard input go through the DevTools input
//! domain so pages observe trusted events.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::config::CdpConfig;
use crate::driver::PageDriver;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::scripts;
use crate::types::{
    ClickOptions, DropdownSnapshot, ElementHandle, ElementState, FrameHandle, Obstruction,
    OptionCandidate, PageMetrics, RawElement, SelectBy, SelectedOption,
};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const DISMISS_SETTLE: Duration = Duration::from_millis(150);

#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

#[derive(Deserialize)]
struct RawObstruction {
    selector: String,
    tag: String,
    description: String,
}

#[derive(Deserialize)]
struct RawDropdownOption {
    selector: String,
    text: String,
    value: Option<String>,
}

#[derive(Deserialize)]
struct RawDropdown {
    options: Vec<RawDropdownOption>,
    search: Option<String>,
}

pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    eval_timeout: Duration,
}

impl ChromiumDriver {
    pub async fn launch(config: &CdpConfig) -> Result<Self, AdapterError> {
        let browser_config = Self::browser_config(config)?;
        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::CdpIo)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(target: "cdp-adapter", %err, "browser handler error");
                }
            }
            debug!(target: "cdp-adapter", "browser handler loop ended");
        });

        let page = browser.new_page("about:blank").await.map_err(cdp_io)?;
        info!(
            target: "cdp-adapter",
            headless = config.headless,
            "chromium driver ready"
        );

        Ok(Self {
            browser,
            page,
            handler_task,
            eval_timeout: Duration::from_millis(config.eval_timeout_ms),
        })
    }

    pub async fn shutdown(mut self) {
        if let Err(err) = self.browser.close().await {
            warn!(target: "cdp-adapter", %err, "failed to close browser");
        }
        self.handler_task.abort();
    }

    fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
        if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
            return Err(AdapterError::new(AdapterErrorKind::CdpIo).with_hint(format!(
                "chrome executable not found at {}; set WAYFINDER_CHROME",
                cfg.executable.display()
            )));
        }

        let mut builder = BrowserConfig::builder()
            .window_size(cfg.window_width, cfg.window_height)
            .request_timeout(Duration::from_millis(cfg.eval_timeout_ms))
            .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms));

        if !cfg.headless {
            builder = builder.with_head();
        }
        if cfg.no_sandbox {
            builder = builder.no_sandbox();
        }
        if !cfg.executable.as_os_str().is_empty() {
            builder = builder.chrome_executable(cfg.executable.clone());
        }
        if let Some(dir) = &cfg.user_data_dir {
            builder = builder.user_data_dir(dir.clone());
        }

        builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("browser config error: {err}"))
        })
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T, AdapterError> {
        self.eval_within(script, self.eval_timeout).await
    }

    async fn eval_within<T: DeserializeOwned>(
        &self,
        script: String,
        limit: Duration,
    ) -> Result<T, AdapterError> {
        let result = timeout(limit, self.page.evaluate(script))
            .await
            .map_err(|_| AdapterError::timeout("script evaluation"))?
            .map_err(cdp_io)?;
        let envelope: Envelope = result.into_value().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Script).with_hint(format!("bad script result: {err}"))
        })?;
        if !envelope.ok {
            let kind = envelope
                .kind
                .as_deref()
                .map(AdapterErrorKind::from_wire)
                .unwrap_or(AdapterErrorKind::Script);
            let mut err = AdapterError::new(kind);
            if let Some(message) = envelope.message {
                err = err.with_hint(message);
            }
            return Err(err);
        }
        serde_json::from_value(envelope.value).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Script).with_hint(format!("bad script value: {err}"))
        })
    }

    async fn mouse(&self, kind: DispatchMouseEventType, x: f64, y: f64, flags: i64) -> Result<(), AdapterError> {
        let mut builder = DispatchMouseEventParams::builder()
            .r#type(kind.clone())
            .x(x)
            .y(y)
            .modifiers(flags);
        if !matches!(kind, DispatchMouseEventType::MouseMoved) {
            builder = builder.button(MouseButton::Left).click_count(1);
        }
        let params = builder.build().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to build mouse event: {err}"))
        })?;
        self.page.execute(params).await.map_err(cdp_io)?;
        Ok(())
    }

    async fn insert_text(&self, text: &str) -> Result<(), AdapterError> {
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(cdp_io)?;
        Ok(())
    }
}

fn cdp_io(err: impl std::fmt::Display) -> AdapterError {
    AdapterError::new(AdapterErrorKind::CdpIo).with_hint(err.to_string())
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn current_url(&self) -> Result<String, AdapterError> {
        let url = self.page.url().await.map_err(cdp_io)?;
        Ok(url.unwrap_or_default())
    }

    async fn enumerate_elements(&self, frame: &FrameHandle) -> Result<Vec<RawElement>, AdapterError> {
        self.eval(scripts::enumerate(frame)).await
    }

    async fn set_markers(
        &self,
        frame: &FrameHandle,
        attr: &str,
        marks: &[(String, String)],
    ) -> Result<usize, AdapterError> {
        self.eval(scripts::set_markers(frame, attr, marks)).await
    }

    async fn query_all(
        &self,
        frame: &FrameHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, AdapterError> {
        let count: usize = self.eval(scripts::count_matches(frame, selector)).await?;
        Ok((0..count)
            .map(|index| ElementHandle::new(frame.clone(), selector, index))
            .collect())
    }

    async fn content_frame(&self, element: &ElementHandle) -> Result<Option<FrameHandle>, AdapterError> {
        let accessible: bool = self.eval(scripts::has_content_document(element)).await?;
        Ok(accessible.then(|| element.frame.child(element.as_hop())))
    }

    async fn element_state(&self, element: &ElementHandle) -> Result<ElementState, AdapterError> {
        self.eval(scripts::element_state(element)).await
    }

    async fn scroll_into_view(&self, element: &ElementHandle, timeout: Duration) -> Result<(), AdapterError> {
        self.eval_within::<Value>(scripts::scroll_into_view(element), timeout)
            .await
            .map(|_| ())
    }

    async fn wait_for_visible(&self, element: &ElementHandle, timeout: Duration) -> Result<(), AdapterError> {
        let deadline = Instant::now() + timeout;
        loop {
            let visible: bool = self.eval(scripts::is_visible(element)).await?;
            if visible {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AdapterError::timeout(format!(
                    "{} not visible within {}ms",
                    element.selector,
                    timeout.as_millis()
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn obstruction(&self, element: &ElementHandle) -> Result<Option<Obstruction>, AdapterError> {
        let raw: Option<RawObstruction> = self.eval(scripts::obstruction(element)).await?;
        Ok(raw.map(|raw| Obstruction {
            blocker: ElementHandle::new(element.frame.clone(), raw.selector, 0),
            tag: raw.tag,
            description: raw.description,
        }))
    }

    async fn dismiss_obstruction(
        &self,
        obstruction: &Obstruction,
        timeout: Duration,
    ) -> Result<bool, AdapterError> {
        let strategy: String = self
            .eval_within(scripts::dismiss(&obstruction.blocker), timeout)
            .await?;
        debug!(target: "cdp-adapter", blocker = %obstruction.description, %strategy, "dismissing blocker");
        sleep(DISMISS_SETTLE).await;
        self.eval(scripts::blocker_gone(&obstruction.blocker)).await
    }

    async fn click(
        &self,
        element: &ElementHandle,
        options: &ClickOptions,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        let offset = options.offset.map(|o| (o.x, o.y));
        let point: Option<Point> = self
            .eval_within(scripts::click_point(element, offset), timeout)
            .await?;
        let Some(point) = point else {
            // Zero-size targets cannot be hit-tested; fall back to a DOM click.
            return self
                .eval_within::<Value>(scripts::dom_click(element), timeout)
                .await
                .map(|_| ());
        };
        let flags = options.modifier_flags();
        self.mouse(DispatchMouseEventType::MouseMoved, point.x, point.y, flags)
            .await?;
        self.mouse(DispatchMouseEventType::MousePressed, point.x, point.y, flags)
            .await?;
        self.mouse(DispatchMouseEventType::MouseReleased, point.x, point.y, flags)
            .await
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), AdapterError> {
        tokio::time::timeout(timeout, self.page.goto(url))
            .await
            .map_err(|_| AdapterError::timeout(format!("navigation to {url}")))?
            .map_err(|err| AdapterError::new(AdapterErrorKind::Navigation).with_hint(err.to_string()))?;
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, text: &str, timeout: Duration) -> Result<(), AdapterError> {
        self.eval_within::<Value>(scripts::fill(element, text), timeout)
            .await
            .map(|_| ())
    }

    async fn type_chars(
        &self,
        element: &ElementHandle,
        text: &str,
        delay: Duration,
        timeout: Duration,
    ) -> Result<(), AdapterError> {
        let deadline = Instant::now() + timeout;
        self.eval::<Value>(scripts::focus(element)).await?;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            if Instant::now() >= deadline {
                return Err(AdapterError::timeout("typing exceeded its deadline"));
            }
            self.insert_text(ch.encode_utf8(&mut buf)).await?;
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
        self.eval::<Value>(scripts::commit_input(element)).await.map(|_| ())
    }

    async fn paste(&self, element: &ElementHandle, text: &str, timeout: Duration) -> Result<(), AdapterError> {
        self.eval_within::<Value>(scripts::focus(element), timeout).await?;
        self.insert_text(text).await?;
        self.eval::<Value>(scripts::commit_input(element)).await.map(|_| ())
    }

    async fn input_value(&self, element: &ElementHandle) -> Result<String, AdapterError> {
        self.eval(scripts::input_value(element)).await
    }

    async fn select_native(
        &self,
        element: &ElementHandle,
        by: &SelectBy,
        timeout: Duration,
    ) -> Result<SelectedOption, AdapterError> {
        self.eval_within(scripts::select_native(element, by), timeout).await
    }

    async fn dropdown_snapshot(&self, frame: &FrameHandle) -> Result<DropdownSnapshot, AdapterError> {
        let raw: RawDropdown = self.eval(scripts::dropdown_snapshot(frame)).await?;
        Ok(DropdownSnapshot {
            options: raw
                .options
                .into_iter()
                .map(|opt| OptionCandidate {
                    handle: ElementHandle::new(frame.clone(), opt.selector, 0),
                    text: opt.text,
                    value: opt.value,
                })
                .collect(),
            search_input: raw
                .search
                .map(|selector| ElementHandle::new(frame.clone(), selector, 0)),
        })
    }

    async fn page_metrics(&self) -> Result<PageMetrics, AdapterError> {
        self.eval(scripts::PAGE_METRICS.to_string()).await
    }

    async fn scroll_to(&self, y: f64) -> Result<(), AdapterError> {
        self.eval::<Value>(scripts::scroll_to(y)).await.map(|_| ())
    }

    async fn screenshot(&self, timeout: Duration) -> Result<Vec<u8>, AdapterError> {
        tokio::time::timeout(timeout, self.page.screenshot(ScreenshotParams::builder().build()))
            .await
            .map_err(|_| AdapterError::timeout("screenshot"))?
            .map_err(cdp_io)
    }
}
