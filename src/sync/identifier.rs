//! Channel identifier extraction from public profile URLs.

use regex::Regex;
use std::sync::OnceLock;

/// Tried in order; the first match wins.
const CHANNEL_URL_PATTERNS: [&str; 3] = [
    r"youtube\.com/channel/([a-zA-Z0-9_-]+)",
    r"youtube\.com/@([a-zA-Z0-9_-]+)",
    r"youtube\.com/c/([a-zA-Z0-9_-]+)",
];

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        CHANNEL_URL_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

/// Extract the channel id, handle or custom name from a channel URL.
///
/// Returns an empty string when the URL has none of the known shapes.
pub fn extract_channel_identifier(url: &str) -> String {
    patterns()
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Canonical channel ids are 24 characters and start with `UC`.
pub fn is_canonical_channel_id(identifier: &str) -> bool {
    identifier.len() == 24
        && identifier.starts_with("UC")
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url() {
        assert_eq!(
            extract_channel_identifier("https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv"),
            "UCabcdefghijklmnopqrstuv"
        );
    }

    #[test]
    fn test_handle_url() {
        assert_eq!(extract_channel_identifier("https://youtube.com/@chefabc"), "chefabc");
        assert_eq!(extract_channel_identifier("https://m.youtube.com/@chef_abc-1/videos"), "chef_abc-1");
    }

    #[test]
    fn test_custom_name_url() {
        assert_eq!(extract_channel_identifier("https://www.youtube.com/c/FoodTours?sub=1"), "FoodTours");
    }

    #[test]
    fn test_channel_shape_wins_over_handle() {
        // A channel path anywhere in the URL beats a handle earlier in it.
        assert_eq!(
            extract_channel_identifier("https://youtube.com/@alias?next=youtube.com/channel/UCreal"),
            "UCreal"
        );
    }

    #[test]
    fn test_unrecognized_shapes() {
        assert_eq!(extract_channel_identifier(""), "");
        assert_eq!(extract_channel_identifier("https://youtube.com/watch?v=abc"), "");
        assert_eq!(extract_channel_identifier("https://vimeo.com/@chef"), "");
        assert_eq!(extract_channel_identifier("not a url at all \u{1F355}"), "");
        assert_eq!(extract_channel_identifier("https://youtube.com/@"), "");
    }

    #[test]
    fn test_canonical_channel_id() {
        assert!(is_canonical_channel_id("UCabcdefghijklmnopqrstuv"));
        assert!(!is_canonical_channel_id("chefabc"));
        assert!(!is_canonical_channel_id("UCshort"));
        assert!(!is_canonical_channel_id("XXabcdefghijklmnopqrstuv"));
    }
}
