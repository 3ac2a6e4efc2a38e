//! Link harvesting from response bodies
//!
//! Links are found with a deliberately permissive token pattern: a scheme
//! of `http://` or `https://` followed by every non-whitespace character.
//! No HTML parsing happens, so markup directly glued to a URL is part of
//! the match (`https://x.com/a</a>` stays as is).

use regex::Regex;
use std::sync::OnceLock;

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"https?://\S+").expect("link pattern is valid"))
}

/// Extracts every absolute-URL token from a body, in order of appearance
///
/// Repeated tokens are returned every time they occur; deduplication is
/// left to the frontier.
///
/// # Example
///
/// ```
/// use noisewake::probe::extract_links;
///
/// let links = extract_links("see https://example.com/a and http://example.org");
/// assert_eq!(links, vec!["https://example.com/a", "http://example.org"]);
/// ```
pub fn extract_links(body: &str) -> Vec<String> {
    link_pattern()
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect()
}
