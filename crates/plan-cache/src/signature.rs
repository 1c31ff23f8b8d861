//! Page and goal signatures used as cache keys.

use perceiver_structural::{is_interactive, ScrapedPage};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::Url;

const ID_PLACEHOLDER: &str = ":id";

/// Digest of a [`PlanSignature`]; one cache entry per key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanKey(pub String);

impl PlanKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized identity of a page plus the goal pursued on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSignature {
    pub url_pattern: String,
    /// Fingerprint over `tokens`.
    pub structure: String,
    pub goal: String,
    /// Sorted structural tokens of the interactive elements.
    pub tokens: Vec<String>,
}

impl PlanSignature {
    pub fn from_page(page: &ScrapedPage, goal: &str) -> Self {
        let tokens = structural_tokens(page);
        Self {
            url_pattern: url_pattern(page.url()),
            structure: fingerprint_tokens(&tokens),
            goal: goal_signature(goal),
            tokens,
        }
    }

    pub fn key(&self) -> PlanKey {
        let mut hasher = Sha256::new();
        for part in [&self.url_pattern, &self.structure, &self.goal] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        PlanKey(hex::encode(hasher.finalize()))
    }
}

/// Scheme, host and path with id-like segments replaced; query and fragment dropped.
pub fn url_pattern(raw: &str) -> String {
    let Ok(url) = Url::parse(raw) else {
        let base = raw.split(['?', '#']).next().unwrap_or(raw);
        return base
            .split('/')
            .map(normalize_segment)
            .collect::<Vec<_>>()
            .join("/");
    };
    let mut out = format!("{}://{}", url.scheme(), url.host_str().unwrap_or(""));
    if let Some(port) = url.port() {
        out.push_str(&format!(":{port}"));
    }
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    if segments.is_empty() {
        out.push('/');
    }
    for segment in segments {
        out.push('/');
        out.push_str(normalize_segment(segment));
    }
    out
}

fn normalize_segment(segment: &str) -> &str {
    if is_numeric(segment) || is_uuid(segment) || is_hex_id(segment) {
        ID_PLACEHOLDER
    } else {
        segment
    }
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn is_hex_id(segment: &str) -> bool {
    segment.len() >= 8
        && segment.bytes().all(|b| b.is_ascii_hexdigit())
        && segment.bytes().any(|b| b.is_ascii_digit())
}

fn is_uuid(segment: &str) -> bool {
    segment.len() == 36
        && segment.char_indices().all(|(i, c)| match i {
            8 | 13 | 18 | 23 => c == '-',
            _ => c.is_ascii_hexdigit(),
        })
}

/// Lower-cased, whitespace-collapsed goal.
pub fn goal_signature(goal: &str) -> String {
    goal.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// SHA-256 over the sorted `tag[:type|:role]` multiset of interactive, interactable elements.
pub fn structural_fingerprint(page: &ScrapedPage) -> String {
    fingerprint_tokens(&structural_tokens(page))
}

fn structural_tokens(page: &ScrapedPage) -> Vec<String> {
    let mut tokens: Vec<String> = page
        .elements()
        .iter()
        .filter(|e| e.is_interactable() && is_interactive(e))
        .map(|e| match (e.input_type(), e.attribute("role")) {
            (Some(kind), _) => format!("{}:{}", e.tag, kind),
            (None, Some(role)) => format!("{}:{}", e.tag, role.to_ascii_lowercase()),
            (None, None) => e.tag.clone(),
        })
        .collect();
    tokens.sort();
    tokens
}

fn fingerprint_tokens(tokens: &[String]) -> String {
    let mut hasher = Sha256::new();
    for token in tokens {
        hasher.update(token.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_pattern_masks_ids() {
        assert_eq!(
            url_pattern("https://shop.test/orders/12345/items?page=2#top"),
            "https://shop.test/orders/:id/items"
        );
        assert_eq!(
            url_pattern("https://shop.test/u/0b5f1c2e-8d3a-4e6b-9f10-2a3b4c5d6e7f/profile"),
            "https://shop.test/u/:id/profile"
        );
        assert_eq!(url_pattern("http://localhost:8080/a1b2c3d4e5"), "http://localhost:8080/:id");
        assert_eq!(url_pattern("https://shop.test"), "https://shop.test/");
        assert_eq!(url_pattern("https://shop.test/checkout/"), "https://shop.test/checkout");
        // Words made of hex letters only are kept.
        assert_eq!(url_pattern("https://shop.test/deadbeefcafe"), "https://shop.test/deadbeefcafe");
    }

    #[test]
    fn test_goal_signature_normalizes_case_and_spacing() {
        assert_eq!(goal_signature("  Click   the\tSubmit button "), "click the submit button");
    }

    #[test]
    fn test_key_depends_on_every_part() {
        let base = PlanSignature {
            url_pattern: "https://shop.test/cart".into(),
            structure: "abc".into(),
            goal: "checkout".into(),
            tokens: vec![],
        };
        let mut other_goal = base.clone();
        other_goal.goal = "empty cart".into();
        let mut other_structure = base.clone();
        other_structure.structure = "abd".into();

        assert_eq!(base.key(), base.clone().key());
        assert_ne!(base.key(), other_goal.key());
        assert_ne!(base.key(), other_structure.key());
        assert_eq!(base.key().as_str().len(), 64);
    }
}
