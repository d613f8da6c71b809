//! Renderer contracts and default adapters
//!
//! Highlighting, markdown and diagram engines live outside this crate. These
//! traits are the seams a host plugs them into; the defaults here are small
//! enough to ship with and always fail safe.

use crate::error::RenderError;
use crate::html::{sanitize, AllowList};
use once_cell::sync::Lazy;
use pulldown_cmark::{html, Event, Options, Parser};
use regex::Regex;

static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(^|[\s/"'])on[a-z]+\s*="#).expect("event handler regex must compile")
});

/// Source code to HTML
pub trait CodeHighlighter: Send + Sync {
    /// Render `source`, optionally tagged with a language
    fn highlight(&self, source: &str, language: Option<&str>) -> Result<String, RenderError>;
}

/// Markdown to HTML
pub trait MarkdownRenderer: Send + Sync {
    /// Render a markdown document
    fn render(&self, source: &str) -> Result<String, RenderError>;
}

/// SVG source to embeddable markup
pub trait SvgRenderer: Send + Sync {
    /// Validate and return markup safe to inline
    ///
    /// References outside `allow` must not survive.
    fn render(&self, source: &str, allow: &AllowList) -> Result<String, RenderError>;
}

/// Diagram source (mermaid) to SVG
#[async_trait::async_trait]
pub trait DiagramEngine: Send + Sync {
    /// Render a diagram; may take arbitrarily long
    async fn render(&self, source: &str) -> Result<String, RenderError>;
}

/// Escape text for HTML element content and attribute values
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escaped `<pre><code>` block with a `language-*` class
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodeHighlighter;

impl CodeHighlighter for PlainCodeHighlighter {
    fn highlight(&self, source: &str, language: Option<&str>) -> Result<String, RenderError> {
        let class = language
            .map(|lang| format!(r#" class="language-{}""#, escape_html(lang)))
            .unwrap_or_default();
        Ok(format!("<pre><code{class}>{}</code></pre>", escape_html(source)))
    }
}

/// Markdown through pulldown-cmark
///
/// Raw HTML inside the markdown is escaped and shown as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CmarkRenderer;

impl MarkdownRenderer for CmarkRenderer {
    fn render(&self, source: &str) -> Result<String, RenderError> {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;
        let events = Parser::new_ext(source, options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, events);
        Ok(out)
    }
}

/// Inline SVG with active content rejected
///
/// Requires an `<svg` root element. Scripts, `<foreignObject>`, event
/// handler attributes and `javascript:` URLs are errors; every other
/// reference goes through the sandbox allow-list.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSvg;

impl SvgRenderer for InlineSvg {
    fn render(&self, source: &str, allow: &AllowList) -> Result<String, RenderError> {
        let lower = source.to_ascii_lowercase();
        let body = lower.trim_start();
        let body = match body.strip_prefix("<?xml") {
            Some(rest) => rest.split_once("?>").map_or("", |(_, tail)| tail).trim_start(),
            None => body,
        };
        if !body.starts_with("<svg") {
            return Err(RenderError::Svg("missing <svg> root element".to_string()));
        }
        if lower.contains("<script") {
            return Err(RenderError::Svg("embedded script is not allowed".to_string()));
        }
        if lower.contains("<foreignobject") {
            return Err(RenderError::Svg("foreignObject is not allowed".to_string()));
        }
        if EVENT_HANDLER.is_match(&lower) {
            return Err(RenderError::Svg("event handler attributes are not allowed".to_string()));
        }
        let compact: String = lower.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if compact.contains("javascript:") {
            return Err(RenderError::Svg("javascript: URLs are not allowed".to_string()));
        }

        let sanitized = sanitize(source.trim(), allow);
        if !sanitized.blocked.is_empty() {
            tracing::debug!(blocked = sanitized.blocked.len(), "svg references blocked");
        }
        Ok(sanitized.html)
    }
}

/// Engine used when no diagram backend is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDiagramEngine;

#[async_trait::async_trait]
impl DiagramEngine for UnavailableDiagramEngine {
    async fn render(&self, _source: &str) -> Result<String, RenderError> {
        Err(RenderError::Diagram("no diagram engine configured".to_string()))
    }
}
