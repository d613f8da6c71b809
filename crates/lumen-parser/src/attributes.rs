//! Tag header attribute parsing
//!
//! Only well-formed `key="value"` / `key='value'` pairs are kept. Anything
//! else in the header is skipped, so a half-written attribute at the end of a
//! streamed header never poisons the ones before it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_][\w:.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("attribute regex must compile")
});

/// Parse attribute pairs from the text between the tag name and `>`
///
/// Later duplicates of a key overwrite earlier ones.
#[must_use]
pub fn parse_attributes(header: &str) -> BTreeMap<String, String> {
    ATTRIBUTE
        .captures_iter(header)
        .filter_map(|caps| {
            let key = caps.get(1)?.as_str();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str();
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Look up an attribute, treating empty values as absent
#[must_use]
pub fn non_empty<'a>(attributes: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    attributes
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_and_single_quotes() {
        let attrs = parse_attributes(r#" identifier="a" type='text/html' title="My page""#);
        assert_eq!(attrs.get("identifier").map(String::as_str), Some("a"));
        assert_eq!(attrs.get("type").map(String::as_str), Some("text/html"));
        assert_eq!(attrs.get("title").map(String::as_str), Some("My page"));
    }

    #[test]
    fn malformed_pairs_are_ignored() {
        let attrs = parse_attributes(r#" identifier=a broken="x title="ok" closed"#);
        assert!(!attrs.contains_key("identifier"));
        // `broken="x title="` is the first well-formed pair the scanner sees
        assert_eq!(attrs.get("broken").map(String::as_str), Some("x title="));
        assert!(!attrs.contains_key("closed"));
    }

    #[test]
    fn unterminated_trailing_pair_is_dropped() {
        let attrs = parse_attributes(r#" identifier="chart" title="Sales"#);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs.get("identifier").map(String::as_str), Some("chart"));
    }

    #[test]
    fn whitespace_around_equals() {
        let attrs = parse_attributes(r#" language = "rust""#);
        assert_eq!(attrs.get("language").map(String::as_str), Some("rust"));
    }

    #[test]
    fn empty_values_read_as_absent() {
        let attrs = parse_attributes(r#" title="" language="  ""#);
        assert_eq!(non_empty(&attrs, "title"), None);
        assert_eq!(non_empty(&attrs, "language"), None);
        assert!(attrs.contains_key("title"));
    }

    #[test]
    fn later_duplicate_key_wins() {
        let attrs = parse_attributes(r#" title="one" title="two""#);
        assert_eq!(attrs.get("title").map(String::as_str), Some("two"));
    }
}
