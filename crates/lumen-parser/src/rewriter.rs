//! Placeholder rewriting
//!
//! Replaces each completed artifact block with `[[artifact:{id}]]` so the
//! surrounding prose can be handed to a markdown renderer on its own. Text
//! outside the blocks is copied byte for byte, and an unclosed trailing block
//! is left exactly as streamed.

use crate::scanner::ScanResult;
use lumen_artifact::ArtifactId;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Opening sentinel of a placeholder
pub const PLACEHOLDER_PREFIX: &str = "[[artifact:";
/// Closing sentinel of a placeholder
pub const PLACEHOLDER_SUFFIX: &str = "]]";

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[\[artifact:([^\[\]\s]+)\]\]").expect("placeholder regex must compile")
});

/// Placeholder token for an id
#[must_use]
pub fn placeholder(id: &ArtifactId) -> String {
    format!("{PLACEHOLDER_PREFIX}{id}{PLACEHOLDER_SUFFIX}")
}

/// Recover placeholder ids, in order, from already rewritten text
#[must_use]
pub fn extract_placeholder_ids(text: &str) -> Vec<ArtifactId> {
    PLACEHOLDER
        .captures_iter(text)
        .filter_map(|caps| ArtifactId::new(caps.get(1)?.as_str()).ok())
        .collect()
}

/// A placeholder inserted by one rewrite pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// Artifact the placeholder stands for
    pub id: ArtifactId,
    /// Byte range of the token in the rewritten text
    pub range: Range<usize>,
}

/// Piece of rewritten text, in reading order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Narrative text for the markdown renderer
    Prose(&'a str),
    /// Where an artifact reference card goes
    Artifact(&'a ArtifactId),
}

/// Output of a rewrite pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewrittenText {
    text: String,
    placeholders: Vec<Placeholder>,
}

impl RewrittenText {
    /// Full rewritten text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume into the rewritten string
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.text
    }

    /// Placeholders in appearance order
    #[inline]
    #[must_use]
    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    /// Ids in placeholder order
    pub fn ids(&self) -> impl Iterator<Item = &ArtifactId> {
        self.placeholders.iter().map(|p| &p.id)
    }

    /// Split into prose and artifact segments
    ///
    /// Whitespace-only prose between placeholders is dropped.
    #[must_use]
    pub fn segments(&self) -> Vec<Segment<'_>> {
        let mut out = Vec::with_capacity(self.placeholders.len() * 2 + 1);
        let mut cursor = 0;
        for p in &self.placeholders {
            push_prose(&mut out, &self.text[cursor..p.range.start]);
            out.push(Segment::Artifact(&p.id));
            cursor = p.range.end;
        }
        push_prose(&mut out, &self.text[cursor..]);
        out
    }
}

fn push_prose<'a>(out: &mut Vec<Segment<'a>>, prose: &'a str) {
    if !prose.trim().is_empty() {
        out.push(Segment::Prose(prose));
    }
}

/// Substitutes completed spans with placeholder tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentRewriter;

impl ContentRewriter {
    /// Create new rewriter
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Rewrite `text` using the spans of a scan of that same text
    ///
    /// Spans that fall outside the text or overlap an earlier span are skipped
    /// (they cannot come from a scan of this text).
    #[must_use]
    pub fn rewrite(&self, text: &str, scan: &ScanResult) -> RewrittenText {
        let mut out = String::with_capacity(text.len());
        let mut placeholders = Vec::with_capacity(scan.spans.len());
        let mut cursor = 0;

        for span in &scan.spans {
            let Range { start, end } = span.range;
            let in_bounds = start >= cursor
                && end <= text.len()
                && text.is_char_boundary(start)
                && text.is_char_boundary(end);
            if !in_bounds {
                tracing::warn!(id = %span.id, ?span.range, "span does not belong to this text; skipped");
                continue;
            }

            out.push_str(&text[cursor..start]);
            let token_start = out.len();
            out.push_str(PLACEHOLDER_PREFIX);
            out.push_str(span.id.as_str());
            out.push_str(PLACEHOLDER_SUFFIX);
            placeholders.push(Placeholder {
                id: span.id.clone(),
                range: token_start..out.len(),
            });
            cursor = end;
        }
        out.push_str(&text[cursor..]);

        RewrittenText {
            text: out,
            placeholders,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::TagScanner;
    use pretty_assertions::assert_eq;

    fn rewrite(text: &str) -> RewrittenText {
        let scan = TagScanner::default().scan(text);
        ContentRewriter::new().rewrite(text, &scan)
    }

    fn id(s: &str) -> ArtifactId {
        ArtifactId::new(s).unwrap()
    }

    #[test]
    fn replaces_closed_span() {
        let out = rewrite(r#"Intro <artifact id="a" type="text/html"><b>hi</b></artifact> outro"#);
        assert_eq!(out.as_str(), "Intro [[artifact:a]] outro");
        assert_eq!(out.placeholders().len(), 1);
        assert_eq!(&out.as_str()[out.placeholders()[0].range.clone()], "[[artifact:a]]");
    }

    #[test]
    fn unclosed_tail_is_untouched() {
        let text = r#"Before <artifact id="a">x</artifact> after <artifact id="b" type="text/markdown">partial"#;
        let out = rewrite(text);
        assert_eq!(
            out.as_str(),
            r#"Before [[artifact:a]] after <artifact id="b" type="text/markdown">partial"#
        );
    }

    #[test]
    fn text_without_tags_is_identical() {
        let text = "Plain *markdown* with <em>html</em> and [[links]].";
        assert_eq!(rewrite(text).as_str(), text);
    }

    #[test]
    fn placeholder_order_matches_document_order() {
        let out = rewrite("<artifact id=\"z\">1</artifact>-<artifact id=\"a\">2</artifact>-<artifact id=\"m\">3</artifact>");
        let ids: Vec<_> = out.ids().map(ArtifactId::as_str).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
        assert_eq!(out.as_str(), "[[artifact:z]]-[[artifact:a]]-[[artifact:m]]");
    }

    #[test]
    fn duplicate_ids_get_one_placeholder_per_span() {
        let out = rewrite("<artifact id=\"a\">1</artifact> <artifact id=\"a\">2</artifact>");
        assert_eq!(out.as_str(), "[[artifact:a]] [[artifact:a]]");
    }

    #[test]
    fn segments_split_prose_and_cards() {
        let out = rewrite("Intro\n<artifact id=\"a\">x</artifact>\n\n<artifact id=\"b\">y</artifact>\nDone");
        assert_eq!(
            out.segments(),
            vec![
                Segment::Prose("Intro\n"),
                Segment::Artifact(&id("a")),
                Segment::Artifact(&id("b")),
                Segment::Prose("\nDone"),
            ]
        );
    }

    #[test]
    fn extract_ids_from_plain_string() {
        let text = rewrite("a <artifact id=\"one\">1</artifact> b <artifact>2</artifact>").into_string();
        let ids = extract_placeholder_ids(&text);
        assert_eq!(ids, vec![id("one"), ArtifactId::generated(36, 1)]);
    }

    #[test]
    fn foreign_spans_are_skipped() {
        let scan = TagScanner::default().scan("<artifact id=\"a\">long body here</artifact>");
        let out = ContentRewriter::new().rewrite("short", &scan);
        assert_eq!(out.as_str(), "short");
        assert!(out.placeholders().is_empty());
    }

    #[test]
    fn placeholder_helper_matches_rewrite() {
        assert_eq!(placeholder(&id("x")), "[[artifact:x]]");
    }
}
