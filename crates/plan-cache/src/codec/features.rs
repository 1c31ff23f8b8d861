use std::collections::BTreeMap;

use crate::signature::PlanSignature;

pub type FeatureMap = BTreeMap<String, f32>;

/// Weighted bag of URL segments, structural tokens and goal words.
pub fn from_signature(signature: &PlanSignature) -> FeatureMap {
    let mut map = FeatureMap::new();
    let (origin, path) = signature
        .url_pattern
        .split_once("://")
        .map(|(_, rest)| rest.split_once('/').unwrap_or((rest, "")))
        .unwrap_or(("", signature.url_pattern.as_str()));
    map.insert(format!("origin::{origin}"), 2.0);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        map.insert(format!("path::{segment}"), 1.0);
    }
    for token in &signature.tokens {
        map.entry(format!("struct::{token}"))
            .and_modify(|w| *w += 0.5)
            .or_insert(0.5);
    }
    for word in signature.goal.split_whitespace() {
        map.entry(format!("goal::{word}"))
            .and_modify(|w| *w += 1.5)
            .or_insert(1.5);
    }
    map
}

/// Cosine over the word counts of two normalized goals.
pub fn goal_similarity(a: &str, b: &str) -> f32 {
    fn count<'a>(goal: &'a str) -> BTreeMap<&'a str, f32> {
        let mut words = BTreeMap::<&str, f32>::new();
        for word in goal.split_whitespace() {
            *words.entry(word).or_insert(0.0) += 1.0;
        }
        words
    }
    let (a, b) = (count(a), count(b));
    let norm = |words: &BTreeMap<&str, f32>| words.values().map(|c| c * c).sum::<f32>().sqrt();
    let (norm_a, norm_b) = (norm(&a), norm(&b));
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let dot: f32 = a
        .iter()
        .filter_map(|(word, count)| b.get(word).map(|other| count * other))
        .sum();
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_similarity() {
        assert!((goal_similarity("place the order", "place the order") - 1.0).abs() < 1e-6);
        let extended = goal_similarity("click submit button", "click submit button please");
        assert!(extended > 0.86 && extended < 0.87);
        assert!(goal_similarity("delete my account", "save my profile") < 0.34);
        assert_eq!(goal_similarity("", "save"), 0.0);
    }
}
