//! Content and position based element ids.

use std::collections::HashMap;

use cdp_adapter::RawElement;
use sha2::{Digest, Sha256};
use wayfinder_core_types::{ElementId, FrameId};

/// Attributes stable enough to contribute to an element's identity.
const IDENTITY_ATTRIBUTES: &[&str] = &[
    "id",
    "name",
    "type",
    "role",
    "aria-label",
    "placeholder",
    "href",
];

const TEXT_PREFIX_CHARS: usize = 64;
const ID_HEX_CHARS: usize = 8;

/// Hash of the element's frame, structural path, tag, text prefix and identity attributes.
pub fn fingerprint(frame: &FrameId, raw: &RawElement) -> String {
    let mut hasher = Sha256::new();
    hasher.update(frame.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(raw.dom_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(raw.tag.to_ascii_lowercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(normalized_text(&raw.text).as_bytes());
    for attr in IDENTITY_ATTRIBUTES {
        if let Some(value) = raw.attributes.get(*attr) {
            hasher.update([0u8]);
            hasher.update(attr.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
    }
    let digest = hex::encode(hasher.finalize());
    digest[..ID_HEX_CHARS].to_string()
}

fn normalized_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(TEXT_PREFIX_CHARS)
        .collect()
}

/// Hands out ids unique within one scrape.
///
/// A repeated fingerprint gets `-2`, `-3`, ... in allocation order, so the
/// same traversal of the same page yields the same ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    seen: HashMap<String, usize>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, fingerprint: String) -> ElementId {
        let count = self.seen.entry(fingerprint.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            ElementId(fingerprint)
        } else {
            ElementId(format!("{}-{}", fingerprint, count))
        }
    }
}
