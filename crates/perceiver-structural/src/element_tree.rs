//! Indexed text rendering of a [`ScrapedPage`] for planners.
//!
//! Each line is `[id]<tag attr="...">text</tag>`; elements of a nested
//! frame follow their host element, indented one level deeper.

use std::collections::HashMap;

use wayfinder_core_types::FrameId;

use crate::model::{ElementDescriptor, ScrapedPage};

const INTERACTIVE_TAGS: &[&str] = &[
    "a", "button", "input", "select", "textarea", "option", "label", "summary", "details",
];

/// Attributes that indicate interactivity on otherwise inert tags.
const INTERACTIVE_ATTRIBUTES: &[&str] = &[
    "onclick",
    "onmousedown",
    "ontouchstart",
    "tabindex",
    "contenteditable",
];

const INTERACTIVE_ROLES: &[&str] = &[
    "button",
    "link",
    "checkbox",
    "radio",
    "textbox",
    "combobox",
    "listbox",
    "option",
    "menuitem",
    "tab",
    "switch",
    "searchbox",
];

const RENDERED_ATTRIBUTES: &[&str] = &[
    "id",
    "type",
    "name",
    "value",
    "placeholder",
    "href",
    "title",
    "role",
    "aria-label",
];

#[derive(Debug, Clone)]
pub struct ElementTreeFormatter {
    include_attributes: bool,
    max_text_length: usize,
    interactive_only: bool,
}

impl Default for ElementTreeFormatter {
    fn default() -> Self {
        Self {
            include_attributes: true,
            max_text_length: 100,
            interactive_only: false,
        }
    }
}

impl ElementTreeFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attributes(mut self, include: bool) -> Self {
        self.include_attributes = include;
        self
    }

    pub fn with_max_text_length(mut self, len: usize) -> Self {
        self.max_text_length = len;
        self
    }

    /// Drop elements that look inert. Frame hosts are always kept.
    pub fn interactive_only(mut self, only: bool) -> Self {
        self.interactive_only = only;
        self
    }

    pub fn format(&self, page: &ScrapedPage) -> String {
        let mut by_frame: HashMap<&FrameId, Vec<&ElementDescriptor>> = HashMap::new();
        for element in page.elements() {
            by_frame.entry(&element.frame_id).or_default().push(element);
        }
        let mut lines = Vec::new();
        self.render_frame(&FrameId::main(), 0, &by_frame, &mut lines);
        lines.join("\n")
    }

    fn render_frame(
        &self,
        frame: &FrameId,
        depth: usize,
        by_frame: &HashMap<&FrameId, Vec<&ElementDescriptor>>,
        lines: &mut Vec<String>,
    ) {
        let Some(elements) = by_frame.get(frame) else {
            return;
        };
        let indent = "  ".repeat(depth);
        for element in elements {
            if self.interactive_only && element.hosts_frame.is_none() && !is_interactive(element) {
                continue;
            }
            lines.push(format!("{}[{}]{}", indent, element.id, self.html_repr(element)));
            if let Some(child) = &element.hosts_frame {
                self.render_frame(child, depth + 1, by_frame, lines);
            }
        }
    }

    fn html_repr(&self, element: &ElementDescriptor) -> String {
        let mut out = format!("<{}", element.tag);
        if self.include_attributes {
            for attr in RENDERED_ATTRIBUTES {
                if let Some(value) = element.attribute(attr) {
                    let truncated = self.truncate_text(value);
                    if !truncated.is_empty() {
                        out.push_str(&format!(" {}=\"{}\"", attr, escape_html(&truncated)));
                    }
                }
            }
            if !element.enabled {
                out.push_str(" disabled");
            }
        }
        out.push('>');
        out.push_str(&escape_html(&self.truncate_text(&element.text)));
        out.push_str(&format!("</{}>", element.tag));
        out
    }

    fn truncate_text(&self, text: &str) -> String {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= self.max_text_length {
            collapsed
        } else {
            let truncated: String = collapsed
                .chars()
                .take(self.max_text_length.saturating_sub(3))
                .collect();
            format!("{}...", truncated)
        }
    }
}

impl ScrapedPage {
    /// Planner-facing rendering with default formatting.
    pub fn element_tree(&self) -> String {
        ElementTreeFormatter::default().format(self)
    }
}

pub fn is_interactive(element: &ElementDescriptor) -> bool {
    if INTERACTIVE_TAGS.contains(&element.tag.as_str()) {
        return true;
    }
    for attr in INTERACTIVE_ATTRIBUTES {
        match element.attribute(attr) {
            Some("-1") if *attr == "tabindex" => continue,
            Some(_) => return true,
            None => {}
        }
    }
    element
        .attribute("role")
        .map(|role| INTERACTIVE_ROLES.contains(&role.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wayfinder_core_types::ElementId;

    fn element(id: &str, frame: &str, tag: &str, text: &str) -> ElementDescriptor {
        ElementDescriptor {
            id: ElementId::from(id),
            frame_id: FrameId::from(frame),
            tag: tag.into(),
            text: text.into(),
            attributes: BTreeMap::new(),
            dom_path: format!("html > {tag}"),
            visible: true,
            enabled: true,
            in_dom: true,
            rect: None,
            hosts_frame: None,
        }
    }

    #[test]
    fn test_nested_frames_follow_host() {
        let mut host = element("f0", "main", "iframe", "");
        host.hosts_frame = Some("iframe-1".into());
        let mut submit = element("b1", "iframe-1", "button", "Pay  now");
        submit.attributes.insert("type".into(), "submit".into());
        let page = ScrapedPage::builder("https://shop.test")
            .element(element("h1", "main", "div", "Checkout"), "#h")
            .element(host, "#f")
            .element(element("a1", "main", "a", "Help"), "#a")
            .frame("iframe-1".into(), FrameId::main(), Some("f0".into()), "#f")
            .element(submit, "#b")
            .build();

        let tree = ElementTreeFormatter::new().format(&page);
        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines[0], "[h1]<div>Checkout</div>");
        assert_eq!(lines[1], "[f0]<iframe></iframe>");
        assert_eq!(lines[2], "  [b1]<button type=\"submit\">Pay now</button>");
        assert_eq!(lines[3], "[a1]<a>Help</a>");

        let compact = ElementTreeFormatter::new().interactive_only(true).format(&page);
        assert!(!compact.contains("[h1]"));
        assert!(compact.contains("[f0]"));
    }

    #[test]
    fn test_is_interactive() {
        assert!(is_interactive(&element("x", "main", "button", "")));
        assert!(!is_interactive(&element("x", "main", "div", "")));
        let mut div = element("x", "main", "div", "");
        div.attributes.insert("tabindex".into(), "-1".into());
        assert!(!is_interactive(&div));
        div.attributes.insert("role".into(), "Button".into());
        assert!(is_interactive(&div));
    }

    #[test]
    fn test_truncate_and_escape() {
        let formatter = ElementTreeFormatter::new().with_max_text_length(10);
        assert_eq!(formatter.truncate_text("short"), "short");
        assert_eq!(formatter.truncate_text("a very long label"), "a very ...");
        assert_eq!(escape_html("<b>\"x\""), "&lt;b&gt;&quot;x&quot;");
    }
}
