use std::collections::{BTreeMap, HashMap, HashSet};

use cdp_adapter::Rect;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use wayfinder_core_types::{ElementId, FrameId};

use crate::errors::FrameTreeError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementDescriptor {
    pub id: ElementId,
    pub frame_id: FrameId,
    pub tag: String,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    pub dom_path: String,
    pub visible: bool,
    pub enabled: bool,
    pub in_dom: bool,
    pub rect: Option<Rect>,
    /// Frame whose document this element hosts, for `iframe`/`frame` elements.
    pub hosts_frame: Option<FrameId>,
}

impl ElementDescriptor {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn is_interactable(&self) -> bool {
        self.visible && self.enabled && self.in_dom
    }

    /// Declared `type` of an `<input>`, lower-cased; `text` when absent.
    pub fn input_type(&self) -> Option<String> {
        (self.tag == "input").then(|| {
            self.attribute("type")
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "text".to_string())
        })
    }
}

/// A frame recorded in the scrape. `parent` is `None` only for `main`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameNode {
    pub id: FrameId,
    pub parent: Option<FrameId>,
    /// Element hosting this frame inside `parent`.
    pub host: Option<ElementId>,
    /// Locator of the host element, valid inside `parent`.
    pub locator: Option<String>,
    pub depth: usize,
}

/// Viewport capture keyed by frame and scroll offset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Screenshot {
    pub frame_id: FrameId,
    pub scroll_y: f64,
    #[serde(with = "base64_bytes")]
    pub png: Vec<u8>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD as Base64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Base64.decode(raw).map_err(serde::de::Error::custom)
    }
}

/// Immutable snapshot of a page's addressable elements and frame tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "PageRecord", into = "PageRecord")]
pub struct ScrapedPage {
    url: String,
    elements: Vec<ElementDescriptor>,
    index: HashMap<ElementId, usize>,
    locators: BTreeMap<ElementId, String>,
    frames: BTreeMap<FrameId, FrameNode>,
    screenshots: Vec<Screenshot>,
    captured_at: DateTime<Utc>,
}

#[derive(Clone, Serialize, Deserialize)]
struct PageRecord {
    url: String,
    elements: Vec<ElementDescriptor>,
    locators: BTreeMap<ElementId, String>,
    frames: BTreeMap<FrameId, FrameNode>,
    screenshots: Vec<Screenshot>,
    captured_at: DateTime<Utc>,
}

impl From<PageRecord> for ScrapedPage {
    fn from(record: PageRecord) -> Self {
        let index = record
            .elements
            .iter()
            .enumerate()
            .map(|(pos, el)| (el.id.clone(), pos))
            .collect();
        Self {
            url: record.url,
            elements: record.elements,
            index,
            locators: record.locators,
            frames: record.frames,
            screenshots: record.screenshots,
            captured_at: record.captured_at,
        }
    }
}

impl From<ScrapedPage> for PageRecord {
    fn from(page: ScrapedPage) -> Self {
        Self {
            url: page.url,
            elements: page.elements,
            locators: page.locators,
            frames: page.frames,
            screenshots: page.screenshots,
            captured_at: page.captured_at,
        }
    }
}

impl ScrapedPage {
    pub fn builder(url: impl Into<String>) -> ScrapedPageBuilder {
        ScrapedPageBuilder::new(url)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Elements in traversal order: frames breadth-first, document order within a frame.
    pub fn elements(&self) -> &[ElementDescriptor] {
        &self.elements
    }

    pub fn element(&self, id: &ElementId) -> Option<&ElementDescriptor> {
        self.index.get(id).map(|pos| &self.elements[*pos])
    }

    pub fn locator(&self, id: &ElementId) -> Option<&str> {
        self.locators.get(id).map(String::as_str)
    }

    pub fn frame(&self, id: &FrameId) -> Option<&FrameNode> {
        self.frames.get(id)
    }

    pub fn frames(&self) -> impl Iterator<Item = &FrameNode> {
        self.frames.values()
    }

    pub fn screenshots(&self) -> &[Screenshot] {
        &self.screenshots
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Chain of frame ids from `main` down to `frame`, inclusive.
    pub fn frame_path(&self, frame: &FrameId) -> Result<Vec<FrameId>, FrameTreeError> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(frame.clone());
        while let Some(id) = current {
            if !seen.insert(id.clone()) {
                return Err(FrameTreeError::Cycle(id));
            }
            let node = self
                .frames
                .get(&id)
                .ok_or_else(|| FrameTreeError::UnknownFrame(id.clone()))?;
            current = node.parent.clone();
            path.push(id);
        }
        path.reverse();
        match path.first() {
            Some(root) if root.is_main() => Ok(path),
            Some(root) => Err(FrameTreeError::UnknownFrame(root.clone())),
            None => Err(FrameTreeError::UnknownFrame(frame.clone())),
        }
    }
}

/// Accumulates a [`ScrapedPage`]; the page is frozen by [`build`](Self::build).
#[derive(Debug)]
pub struct ScrapedPageBuilder {
    url: String,
    elements: Vec<ElementDescriptor>,
    locators: BTreeMap<ElementId, String>,
    frames: BTreeMap<FrameId, FrameNode>,
    screenshots: Vec<Screenshot>,
}

impl ScrapedPageBuilder {
    pub fn new(url: impl Into<String>) -> Self {
        let mut frames = BTreeMap::new();
        frames.insert(
            FrameId::main(),
            FrameNode {
                id: FrameId::main(),
                parent: None,
                host: None,
                locator: None,
                depth: 0,
            },
        );
        Self {
            url: url.into(),
            elements: Vec::new(),
            locators: BTreeMap::new(),
            frames,
            screenshots: Vec::new(),
        }
    }

    /// Records a frame hosted by `host` (an element already added to `parent`).
    pub fn frame(mut self, id: FrameId, parent: FrameId, host: Option<ElementId>, locator: impl Into<String>) -> Self {
        self.push_frame(id, parent, host, locator.into());
        self
    }

    pub fn element(mut self, descriptor: ElementDescriptor, locator: impl Into<String>) -> Self {
        self.push_element(descriptor, locator.into());
        self
    }

    pub fn screenshot(mut self, shot: Screenshot) -> Self {
        self.screenshots.push(shot);
        self
    }

    pub(crate) fn push_frame(&mut self, id: FrameId, parent: FrameId, host: Option<ElementId>, locator: String) {
        let depth = self.frames.get(&parent).map(|p| p.depth + 1).unwrap_or(1);
        self.frames.insert(
            id.clone(),
            FrameNode {
                id,
                parent: Some(parent),
                host,
                locator: Some(locator),
                depth,
            },
        );
    }

    pub(crate) fn push_element(&mut self, descriptor: ElementDescriptor, locator: String) {
        self.locators.insert(descriptor.id.clone(), locator);
        self.elements.push(descriptor);
    }

    /// Forgets a frame that could not be read and unlinks its host element.
    pub(crate) fn drop_frame(&mut self, id: &FrameId) {
        if self.frames.remove(id).is_none() {
            return;
        }
        for element in &mut self.elements {
            if element.hosts_frame.as_ref() == Some(id) {
                element.hosts_frame = None;
            }
        }
    }

    pub(crate) fn push_screenshot(&mut self, shot: Screenshot) {
        self.screenshots.push(shot);
    }

    pub fn build(self) -> ScrapedPage {
        ScrapedPage::from(PageRecord {
            url: self.url,
            elements: self.elements,
            locators: self.locators,
            frames: self.frames,
            screenshots: self.screenshots,
            captured_at: Utc::now(),
        })
    }
}
