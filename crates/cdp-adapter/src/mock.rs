//! In-memory [`PageDriver`] for tests and offline runs.
//!
//! Models a page as frames holding flat, ordered element lists. Frame
//! elements own a child frame key; `"main"` is the top document. Selectors
//! understood: the structural path reported by enumeration, `#id`,
//! `[attr]`, `[attr="value"]` / `[attr='value']`, and a bare tag name.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::driver::PageDriver;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::types::{
    ClickOptions, DropdownSnapshot, ElementHandle, ElementState, FrameHandle, Modifier,
    Obstruction, OptionCandidate, PageMetrics, RawElement, Rect, SelectBy, SelectedOption,
};

pub const MAIN_FRAME: &str = "main";

/// Index of an element registered with a [`MockDriver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Driver operation, used for call counting and fault injection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MockOp {
    CurrentUrl,
    Enumerate,
    SetMarkers,
    QueryAll,
    ContentFrame,
    ElementState,
    ScrollIntoView,
    WaitVisible,
    Obstruction,
    DismissObstruction,
    Click,
    Navigate,
    Fill,
    TypeChars,
    Paste,
    InputValue,
    SelectNative,
    Dropdown,
    PageMetrics,
    ScrollTo,
    Screenshot,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MockOption {
    pub value: String,
    pub label: String,
    pub disabled: bool,
}

impl MockOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
            disabled: false,
        }
    }
}

/// Side effect applied when an element is clicked.
#[derive(Clone, Debug, PartialEq)]
pub enum ClickEffect {
    Navigate(String),
    Show(NodeId),
    Hide(NodeId),
    Remove(NodeId),
    /// Sets the value of another element (e.g. a custom dropdown's hidden input).
    SetValue(NodeId, String),
}

/// Element description used to populate a [`MockDriver`].
#[derive(Clone, Debug)]
pub struct MockElement {
    tag: String,
    text: String,
    attributes: BTreeMap<String, String>,
    visible: bool,
    enabled: bool,
    readonly: bool,
    rect: Rect,
    value: String,
    options: Vec<MockOption>,
    on_click: Vec<ClickEffect>,
    covered_by: Option<NodeId>,
    dismissable: bool,
}

impl MockElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            text: String::new(),
            attributes: BTreeMap::new(),
            visible: true,
            enabled: true,
            readonly: false,
            rect: Rect::new(10.0, 10.0, 120.0, 32.0),
            value: String::new(),
            options: Vec::new(),
            on_click: Vec::new(),
            covered_by: None,
            dismissable: false,
        }
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn at(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn option(mut self, option: MockOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn on_click(mut self, effect: ClickEffect) -> Self {
        self.on_click.push(effect);
        self
    }

    /// Another element sits on top of this one until it is hidden or removed.
    pub fn covered_by(mut self, blocker: NodeId) -> Self {
        self.covered_by = Some(blocker);
        self
    }

    /// Overlay that goes away when the driver is asked to dismiss it.
    pub fn dismissable(mut self) -> Self {
        self.dismissable = true;
        self
    }
}

#[derive(Clone, Debug)]
struct MockNode {
    frame: String,
    element: MockElement,
    content_frame: Option<String>,
    attached: bool,
}

/// Interaction recorded by the mock, in dispatch order.
#[derive(Clone, Debug, PartialEq)]
pub enum MockEvent {
    Clicked { node: NodeId, modifiers: Vec<Modifier> },
    Navigated(String),
    Filled { node: NodeId, text: String },
    Typed { node: NodeId, text: String, delay: Duration },
    Pasted { node: NodeId, text: String },
    Selected { node: NodeId, value: String },
    Dismissed { node: NodeId },
    Scrolled(f64),
}

#[derive(Clone, Debug)]
struct Fault {
    kind: AdapterErrorKind,
    remaining: Option<usize>,
}

#[derive(Debug)]
struct MockState {
    url: String,
    nodes: Vec<MockNode>,
    frames: HashSet<String>,
    detached_frames: HashSet<String>,
    null_content: HashSet<NodeId>,
    faults: HashMap<MockOp, VecDeque<Fault>>,
    calls: HashMap<MockOp, usize>,
    events: Vec<MockEvent>,
    scroll_y: f64,
    viewport_height: f64,
    document_height: f64,
}

/// Scriptable in-memory page with fault injection.
#[derive(Debug)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    pub fn new(url: impl Into<String>) -> Self {
        let mut frames = HashSet::new();
        frames.insert(MAIN_FRAME.to_string());
        Self {
            state: Mutex::new(MockState {
                url: url.into(),
                nodes: Vec::new(),
                frames,
                detached_frames: HashSet::new(),
                null_content: HashSet::new(),
                faults: HashMap::new(),
                calls: HashMap::new(),
                events: Vec::new(),
                scroll_y: 0.0,
                viewport_height: 800.0,
                document_height: 800.0,
            }),
        }
    }

    /// Adds an element to `frame`, after every element already there.
    pub fn add(&self, frame: &str, element: MockElement) -> NodeId {
        let mut state = self.state.lock();
        let id = NodeId(state.nodes.len());
        state.nodes.push(MockNode {
            frame: frame.to_string(),
            element,
            content_frame: None,
            attached: true,
        });
        id
    }

    /// Adds a frame element to `parent` owning the document `child`.
    pub fn add_frame(&self, parent: &str, child: &str, element: MockElement) -> NodeId {
        let mut state = self.state.lock();
        let id = NodeId(state.nodes.len());
        state.frames.insert(child.to_string());
        state.nodes.push(MockNode {
            frame: parent.to_string(),
            element,
            content_frame: Some(child.to_string()),
            attached: true,
        });
        id
    }

    /// The frame element stays, but its content document reads as null.
    pub fn null_content_frame(&self, frame_element: NodeId) {
        self.state.lock().null_content.insert(frame_element);
    }

    /// Every operation inside `frame` fails as detached from now on.
    pub fn detach_frame(&self, frame: &str) {
        self.state.lock().detached_frames.insert(frame.to_string());
    }

    pub fn remove(&self, node: NodeId) {
        if let Some(n) = self.state.lock().nodes.get_mut(node.0) {
            n.attached = false;
        }
    }

    pub fn set_visible(&self, node: NodeId, visible: bool) {
        if let Some(n) = self.state.lock().nodes.get_mut(node.0) {
            n.element.visible = visible;
        }
    }

    pub fn set_text(&self, node: NodeId, text: impl Into<String>) {
        if let Some(n) = self.state.lock().nodes.get_mut(node.0) {
            n.element.text = text.into();
        }
    }

    pub fn set_url(&self, url: impl Into<String>) {
        self.state.lock().url = url.into();
    }

    pub fn set_document_height(&self, height: f64) {
        self.state.lock().document_height = height;
    }

    /// `op` fails with `kind` on every call.
    pub fn fail_always(&self, op: MockOp, kind: AdapterErrorKind) {
        self.push_fault(op, kind, None);
    }

    /// `op` fails with `kind` on its next `times` calls.
    pub fn fail_times(&self, op: MockOp, kind: AdapterErrorKind, times: usize) {
        self.push_fault(op, kind, Some(times));
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults.clear();
    }

    fn push_fault(&self, op: MockOp, kind: AdapterErrorKind, remaining: Option<usize>) {
        self.state
            .lock()
            .faults
            .entry(op)
            .or_default()
            .push_back(Fault { kind, remaining });
    }

    pub fn calls(&self, op: MockOp) -> usize {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.state.lock().events.clone()
    }

    pub fn value_of(&self, node: NodeId) -> String {
        self.state
            .lock()
            .nodes
            .get(node.0)
            .map(|n| n.element.value.clone())
            .unwrap_or_default()
    }

    pub fn attribute_of(&self, node: NodeId, name: &str) -> Option<String> {
        self.state
            .lock()
            .nodes
            .get(node.0)
            .and_then(|n| n.element.attributes.get(name).cloned())
    }

    /// Structural path the mock reports for `node` during enumeration.
    pub fn dom_path_of(&self, node: NodeId) -> String {
        let state = self.state.lock();
        state.dom_path(node)
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }
}

impl MockState {
    fn enter(&mut self, op: MockOp) -> Result<(), AdapterError> {
        *self.calls.entry(op).or_insert(0) += 1;
        let Some(queue) = self.faults.get_mut(&op) else {
            return Ok(());
        };
        let Some(front) = queue.front_mut() else {
            return Ok(());
        };
        let kind = front.kind;
        if let Some(remaining) = front.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                queue.pop_front();
            }
        }
        Err(AdapterError::new(kind).with_hint(format!("injected fault on {op:?}")))
    }

    fn frame_nodes(&self, frame: &str) -> impl Iterator<Item = NodeId> + '_ {
        let frame = frame.to_string();
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.attached && n.frame == frame)
            .map(|(idx, _)| NodeId(idx))
    }

    fn dom_path(&self, node: NodeId) -> String {
        let Some(target) = self.nodes.get(node.0) else {
            return String::new();
        };
        let position = self
            .frame_nodes(&target.frame)
            .filter(|id| id.0 <= node.0 && self.nodes[id.0].element.tag == target.element.tag)
            .count();
        format!(
            "html > body:nth-of-type(1) > {}:nth-of-type({})",
            target.element.tag, position
        )
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        let el = &self.nodes[node.0].element;
        let selector = selector.trim();
        if let Some(id) = selector.strip_prefix('#') {
            return el.attributes.get("id").map(String::as_str) == Some(id);
        }
        if let Some(inner) = selector
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
        {
            return match inner.split_once('=') {
                Some((name, raw)) => {
                    let want = raw.trim_matches(|c| c == '"' || c == '\'');
                    el.attributes.get(name.trim()).map(String::as_str) == Some(want)
                }
                None => el.attributes.contains_key(inner.trim()),
            };
        }
        if selector.contains('>') {
            return self.dom_path(node) == selector;
        }
        el.tag == selector.to_ascii_lowercase()
    }

    fn frame_key(&self, frame: &FrameHandle) -> Result<String, AdapterError> {
        let mut key = MAIN_FRAME.to_string();
        for (hop_idx, hop) in frame.hops().iter().enumerate() {
            self.ensure_frame_live(&key)?;
            let host = self
                .frame_nodes(&key)
                .filter(|id| self.matches(*id, &hop.selector))
                .nth(hop.index)
                .ok_or_else(|| {
                    AdapterError::detached(format!("frame hop {hop_idx} missing: {}", hop.selector))
                })?;
            let child = self.nodes[host.0]
                .content_frame
                .clone()
                .filter(|_| !self.null_content.contains(&host))
                .ok_or_else(|| {
                    AdapterError::detached(format!("frame hop {hop_idx} has no content document"))
                })?;
            key = child;
        }
        self.ensure_frame_live(&key)?;
        Ok(key)
    }

    fn ensure_frame_live(&self, key: &str) -> Result<(), AdapterError> {
        if self.detached_frames.contains(key) || !self.frames.contains(key) {
            return Err(AdapterError::detached(format!("frame {key} detached")));
        }
        Ok(())
    }

    fn locate(&self, handle: &ElementHandle) -> Result<NodeId, AdapterError> {
        let key = self.frame_key(&handle.frame)?;
        self.frame_nodes(&key)
            .filter(|id| self.matches(*id, &handle.selector))
            .nth(handle.index)
            .ok_or_else(|| AdapterError::detached(format!("element missing: {}", handle.selector)))
    }

    fn blocker_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].element.covered_by.filter(|blocker| {
            self.nodes
                .get(blocker.0)
                .map(|b| b.attached && b.element.visible)
                .unwrap_or(false)
        })
    }

    fn editable(&self, node: NodeId) -> Result<(), AdapterError> {
        let el = &self.nodes[node.0].element;
        let is_field = matches!(el.tag.as_str(), "input" | "textarea")
            || el.attributes.get("contenteditable").map(String::as_str) == Some("true");
        if !is_field || !el.enabled || el.readonly {
            return Err(AdapterError::new(AdapterErrorKind::NotInteractable)
                .with_hint(format!("<{}> does not accept text", el.tag)));
        }
        Ok(())
    }

    fn write_value(&mut self, node: NodeId, value: String) {
        let el = &mut self.nodes[node.0].element;
        let limit = el
            .attributes
            .get("maxlength")
            .and_then(|raw| raw.parse::<usize>().ok());
        el.value = match limit {
            Some(limit) => value.chars().take(limit).collect(),
            None => value,
        };
    }

    fn apply_click_effects(&mut self, node: NodeId) {
        let effects = self.nodes[node.0].element.on_click.clone();
        for effect in effects {
            match effect {
                ClickEffect::Navigate(url) => {
                    self.url = url.clone();
                    self.events.push(MockEvent::Navigated(url));
                }
                ClickEffect::Show(target) => {
                    if let Some(n) = self.nodes.get_mut(target.0) {
                        n.element.visible = true;
                    }
                }
                ClickEffect::Hide(target) => {
                    if let Some(n) = self.nodes.get_mut(target.0) {
                        n.element.visible = false;
                    }
                }
                ClickEffect::Remove(target) => {
                    if let Some(n) = self.nodes.get_mut(target.0) {
                        n.attached = false;
                    }
                }
                ClickEffect::SetValue(target, value) => {
                    if let Some(n) = self.nodes.get_mut(target.0) {
                        n.element.value = value;
                    }
                }
            }
        }
    }

    fn raw(&self, node: NodeId) -> RawElement {
        let n = &self.nodes[node.0];
        RawElement {
            dom_path: self.dom_path(node),
            tag: n.element.tag.clone(),
            text: n.element.text.clone(),
            attributes: n.element.attributes.clone(),
            visible: n.element.visible,
            enabled: n.element.enabled,
            rect: Some(n.element.rect),
            is_frame: n.content_frame.is_some() || matches!(n.element.tag.as_str(), "iframe" | "frame"),
        }
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn current_url(&self) -> Result<String, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::CurrentUrl)?;
        Ok(state.url.clone())
    }

    async fn enumerate_elements(&self, frame: &FrameHandle) -> Result<Vec<RawElement>, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Enumerate)?;
        let key = state.frame_key(frame)?;
        let nodes: Vec<NodeId> = state.frame_nodes(&key).collect();
        Ok(nodes.into_iter().map(|id| state.raw(id)).collect())
    }

    async fn set_markers(
        &self,
        frame: &FrameHandle,
        attr: &str,
        marks: &[(String, String)],
    ) -> Result<usize, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::SetMarkers)?;
        let key = state.frame_key(frame)?;
        let nodes: Vec<NodeId> = state.frame_nodes(&key).collect();
        for id in &nodes {
            state.nodes[id.0].element.attributes.remove(attr);
        }
        let mut marked = 0;
        for (selector, value) in marks {
            let target = nodes.iter().copied().find(|id| state.matches(*id, selector));
            if let Some(id) = target {
                state.nodes[id.0]
                    .element
                    .attributes
                    .insert(attr.to_string(), value.clone());
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn query_all(
        &self,
        frame: &FrameHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::QueryAll)?;
        let key = state.frame_key(frame)?;
        let count = state
            .frame_nodes(&key)
            .filter(|id| state.matches(*id, selector))
            .count();
        Ok((0..count)
            .map(|index| ElementHandle::new(frame.clone(), selector, index))
            .collect())
    }

    async fn content_frame(&self, element: &ElementHandle) -> Result<Option<FrameHandle>, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::ContentFrame)?;
        let node = state.locate(element)?;
        let accessible = state.nodes[node.0].content_frame.is_some() && !state.null_content.contains(&node);
        Ok(accessible.then(|| element.frame.child(element.as_hop())))
    }

    async fn element_state(&self, element: &ElementHandle) -> Result<ElementState, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::ElementState)?;
        let node = state.locate(element)?;
        let n = &state.nodes[node.0];
        let el = &n.element;
        let input_type = (el.tag == "input").then(|| {
            el.attributes
                .get("type")
                .map(|t| t.to_ascii_lowercase())
                .unwrap_or_else(|| "text".to_string())
        });
        Ok(ElementState {
            attached: n.attached,
            visible: el.visible,
            enabled: el.enabled,
            editable: state.editable(node).is_ok(),
            tag: el.tag.clone(),
            input_type,
            href: (el.tag == "a").then(|| el.attributes.get("href").cloned()).flatten(),
            target: el.attributes.get("target").cloned(),
            value: matches!(el.tag.as_str(), "input" | "textarea" | "select").then(|| el.value.clone()),
            rect: Some(el.rect),
        })
    }

    async fn scroll_into_view(&self, element: &ElementHandle, _timeout: Duration) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::ScrollIntoView)?;
        state.locate(element).map(|_| ())
    }

    async fn wait_for_visible(&self, element: &ElementHandle, timeout: Duration) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::WaitVisible)?;
        let node = state.locate(element)?;
        if state.nodes[node.0].element.visible {
            Ok(())
        } else {
            Err(AdapterError::timeout(format!(
                "{} not visible within {}ms",
                element.selector,
                timeout.as_millis()
            )))
        }
    }

    async fn obstruction(&self, element: &ElementHandle) -> Result<Option<Obstruction>, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Obstruction)?;
        let node = state.locate(element)?;
        Ok(state.blocker_of(node).map(|blocker| {
            let b = &state.nodes[blocker.0];
            Obstruction {
                blocker: ElementHandle::new(element.frame.clone(), state.dom_path(blocker), 0),
                tag: b.element.tag.clone(),
                description: b
                    .element
                    .attributes
                    .get("id")
                    .map(|id| format!("{}#{}", b.element.tag, id))
                    .unwrap_or_else(|| b.element.tag.clone()),
            }
        }))
    }

    async fn dismiss_obstruction(
        &self,
        obstruction: &Obstruction,
        _timeout: Duration,
    ) -> Result<bool, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::DismissObstruction)?;
        let Ok(blocker) = state.locate(&obstruction.blocker) else {
            return Ok(true);
        };
        if state.nodes[blocker.0].element.dismissable {
            state.nodes[blocker.0].element.visible = false;
            state.events.push(MockEvent::Dismissed { node: blocker });
            return Ok(true);
        }
        Ok(!state.nodes[blocker.0].element.visible)
    }

    async fn click(
        &self,
        element: &ElementHandle,
        options: &ClickOptions,
        _timeout: Duration,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Click)?;
        let node = state.locate(element)?;
        if let Some(blocker) = state.blocker_of(node) {
            let desc = state.dom_path(blocker);
            return Err(AdapterError::new(AdapterErrorKind::Obscured)
                .with_hint(format!("click intercepted by {desc}")));
        }
        if !state.nodes[node.0].element.enabled {
            return Err(AdapterError::new(AdapterErrorKind::NotInteractable).with_hint("element disabled"));
        }
        state.events.push(MockEvent::Clicked {
            node,
            modifiers: options.modifiers.clone(),
        });
        state.apply_click_effects(node);
        Ok(())
    }

    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Navigate)?;
        state.url = url.to_string();
        state.events.push(MockEvent::Navigated(url.to_string()));
        Ok(())
    }

    async fn fill(&self, element: &ElementHandle, text: &str, _timeout: Duration) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Fill)?;
        let node = state.locate(element)?;
        state.editable(node)?;
        state.write_value(node, text.to_string());
        state.events.push(MockEvent::Filled {
            node,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn type_chars(
        &self,
        element: &ElementHandle,
        text: &str,
        delay: Duration,
        _timeout: Duration,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::TypeChars)?;
        let node = state.locate(element)?;
        state.editable(node)?;
        let value = format!("{}{}", state.nodes[node.0].element.value, text);
        state.write_value(node, value);
        state.events.push(MockEvent::Typed {
            node,
            text: text.to_string(),
            delay,
        });
        Ok(())
    }

    async fn paste(&self, element: &ElementHandle, text: &str, _timeout: Duration) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Paste)?;
        let node = state.locate(element)?;
        state.editable(node)?;
        let value = format!("{}{}", state.nodes[node.0].element.value, text);
        state.write_value(node, value);
        state.events.push(MockEvent::Pasted {
            node,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn input_value(&self, element: &ElementHandle) -> Result<String, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::InputValue)?;
        let node = state.locate(element)?;
        Ok(state.nodes[node.0].element.value.clone())
    }

    async fn select_native(
        &self,
        element: &ElementHandle,
        by: &SelectBy,
        _timeout: Duration,
    ) -> Result<SelectedOption, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::SelectNative)?;
        let node = state.locate(element)?;
        let el = &state.nodes[node.0].element;
        if el.tag != "select" {
            return Err(AdapterError::new(AdapterErrorKind::NotInteractable)
                .with_hint("element is not a native select"));
        }
        let options = &el.options;
        let index = match by {
            SelectBy::Index(idx) => (*idx < options.len()).then_some(*idx),
            SelectBy::Value(value) => options.iter().position(|o| &o.value == value),
            SelectBy::Label(label) => {
                let want = label.trim().to_lowercase();
                options
                    .iter()
                    .position(|o| o.label.trim().to_lowercase() == want)
            }
        };
        let index = index
            .filter(|idx| !options[*idx].disabled)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::OptionNotFound)
                    .with_hint(format!("no selectable option for {by:?}"))
            })?;
        let chosen = options[index].clone();
        state.nodes[node.0].element.value = chosen.value.clone();
        state.events.push(MockEvent::Selected {
            node,
            value: chosen.value.clone(),
        });
        Ok(SelectedOption {
            index,
            value: chosen.value,
            label: chosen.label.trim().to_string(),
        })
    }

    async fn dropdown_snapshot(&self, frame: &FrameHandle) -> Result<DropdownSnapshot, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Dropdown)?;
        let key = state.frame_key(frame)?;
        let nodes: Vec<NodeId> = state.frame_nodes(&key).collect();
        let mut snapshot = DropdownSnapshot::default();
        for id in nodes {
            let el = &state.nodes[id.0].element;
            if !el.visible {
                continue;
            }
            let role = el.attributes.get("role").map(String::as_str);
            if matches!(role, Some("option") | Some("menuitem")) {
                snapshot.options.push(OptionCandidate {
                    handle: ElementHandle::new(frame.clone(), state.dom_path(id), 0),
                    text: el.text.trim().to_string(),
                    value: el
                        .attributes
                        .get("data-value")
                        .or_else(|| el.attributes.get("value"))
                        .cloned(),
                });
            } else if snapshot.search_input.is_none()
                && (role == Some("searchbox")
                    || (el.tag == "input" && el.attributes.get("type").map(String::as_str) == Some("search")))
            {
                snapshot.search_input = Some(ElementHandle::new(frame.clone(), state.dom_path(id), 0));
            }
        }
        Ok(snapshot)
    }

    async fn page_metrics(&self) -> Result<PageMetrics, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::PageMetrics)?;
        Ok(PageMetrics {
            scroll_y: state.scroll_y,
            viewport_height: state.viewport_height,
            document_height: state.document_height,
        })
    }

    async fn scroll_to(&self, y: f64) -> Result<(), AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::ScrollTo)?;
        let max = (state.document_height - state.viewport_height).max(0.0);
        state.scroll_y = y.clamp(0.0, max);
        let scrolled = state.scroll_y;
        state.events.push(MockEvent::Scrolled(scrolled));
        Ok(())
    }

    async fn screenshot(&self, _timeout: Duration) -> Result<Vec<u8>, AdapterError> {
        let mut state = self.state.lock();
        state.enter(MockOp::Screenshot)?;
        Ok(format!("png@{}", state.scroll_y).into_bytes())
    }
}
