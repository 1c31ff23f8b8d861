//! Plain-data handles and snapshots exchanged with a [`PageDriver`](crate::PageDriver).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One step into a nested document: the `index`-th match of `selector`
/// in the enclosing document, which must be a frame element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHop {
    pub selector: String,
    pub index: usize,
}

/// Address of a document inside the page, as a chain of hops from the top document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHandle {
    hops: Vec<FrameHop>,
}

impl FrameHandle {
    pub fn top() -> Self {
        Self::default()
    }

    pub fn child(&self, hop: FrameHop) -> Self {
        let mut hops = self.hops.clone();
        hops.push(hop);
        Self { hops }
    }

    pub fn hops(&self) -> &[FrameHop] {
        &self.hops
    }

    pub fn depth(&self) -> usize {
        self.hops.len()
    }

    pub fn is_top(&self) -> bool {
        self.hops.is_empty()
    }
}

/// The `index`-th live match of `selector` inside `frame`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    pub frame: FrameHandle,
    pub selector: String,
    pub index: usize,
}

impl ElementHandle {
    pub fn new(frame: FrameHandle, selector: impl Into<String>, index: usize) -> Self {
        Self {
            frame,
            selector: selector.into(),
            index,
        }
    }

    /// Hop that enters the document owned by this element.
    pub fn as_hop(&self) -> FrameHop {
        FrameHop {
            selector: self.selector.clone(),
            index: self.index,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Candidate element as reported by a frame enumeration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawElement {
    /// Structural CSS path from the document root, usable as a selector.
    pub dom_path: String,
    pub tag: String,
    pub text: String,
    pub attributes: BTreeMap<String, String>,
    pub visible: bool,
    pub enabled: bool,
    pub rect: Option<Rect>,
    /// The element owns a nested document (`iframe`/`frame`).
    pub is_frame: bool,
}

/// Live state of a resolved element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    pub attached: bool,
    pub visible: bool,
    pub enabled: bool,
    pub editable: bool,
    pub tag: String,
    pub input_type: Option<String>,
    pub href: Option<String>,
    pub target: Option<String>,
    pub value: Option<String>,
    pub rect: Option<Rect>,
}

impl ElementState {
    pub fn is_native_select(&self) -> bool {
        self.tag.eq_ignore_ascii_case("select")
    }

    pub fn is_anchor(&self) -> bool {
        self.tag.eq_ignore_ascii_case("a")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Alt,
    Control,
    Meta,
    Shift,
}

impl Modifier {
    /// Bit used by the DevTools input domain.
    pub fn flag(&self) -> i64 {
        match self {
            Modifier::Alt => 1,
            Modifier::Control => 2,
            Modifier::Meta => 4,
            Modifier::Shift => 8,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "alt" | "option" => Some(Modifier::Alt),
            "ctrl" | "control" => Some(Modifier::Control),
            "meta" | "cmd" | "command" => Some(Modifier::Meta),
            "shift" => Some(Modifier::Shift),
            _ => None,
        }
    }
}

/// Offset in CSS pixels from the element's top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClickOffset {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickOptions {
    pub modifiers: Vec<Modifier>,
    pub offset: Option<ClickOffset>,
}

impl ClickOptions {
    pub fn modifier_flags(&self) -> i64 {
        self.modifiers.iter().fold(0, |acc, m| acc | m.flag())
    }
}

/// How a native `<select>` option is picked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum SelectBy {
    Index(usize),
    Value(String),
    Label(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    pub index: usize,
    pub value: String,
    pub label: String,
}

/// Rendered option of a custom (non-native) dropdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptionCandidate {
    pub handle: ElementHandle,
    pub text: String,
    pub value: Option<String>,
}

/// Visible options and search box of an opened custom dropdown.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DropdownSnapshot {
    pub options: Vec<OptionCandidate>,
    pub search_input: Option<ElementHandle>,
}

/// Element covering the hit-test point of a target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstruction {
    pub blocker: ElementHandle,
    pub tag: String,
    pub description: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    pub scroll_y: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}
