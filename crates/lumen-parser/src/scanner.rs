//! Artifact tag scanner
//!
//! Scans the cumulative text of one assistant turn and reports every fully
//! closed artifact block in document order. The scanner is called again on
//! every snapshot of a growing buffer, so it is pure: the same text always
//! yields the same spans.
//!
//! Tags never nest. An opening tag is closed by the first matching closing
//! tag that follows it. An opening tag with no closing tag yet marks the rest
//! of the buffer as an in-progress block and ends the scan.

use crate::attributes::{non_empty, parse_attributes};
use lumen_artifact::{ArtifactDraft, ArtifactId, ArtifactKind, ArtifactType, DEFAULT_TITLE};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

/// Scanner settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Element names recognized as artifact tags
    pub tag_names: Vec<String>,
    /// Title given to artifacts whose tag has none
    pub default_title: String,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            tag_names: vec!["antArtifact".to_string(), "artifact".to_string()],
            default_title: DEFAULT_TITLE.to_string(),
        }
    }
}

/// One completed artifact block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSpan {
    /// Byte range of the whole block, opening tag through closing tag
    pub range: Range<usize>,
    /// Tag name that opened the block
    pub tag: String,
    /// Resolved identifier (from `identifier`/`id`, or generated)
    pub id: ArtifactId,
    /// Whether `id` was generated
    pub generated_id: bool,
    /// Raw header attributes
    pub attributes: BTreeMap<String, String>,
    /// Body between the tags, trimmed
    pub content: String,
}

impl ScannedSpan {
    /// Convert into a registry draft
    ///
    /// A completed span has seen its closing delimiter, so the draft is closed.
    /// The `closed` attribute is informational and only kept in `attributes`.
    #[must_use]
    pub fn to_draft(&self, default_title: &str) -> ArtifactDraft {
        let artifact_type = non_empty(&self.attributes, "type")
            .map(ArtifactType::from_media_type)
            .unwrap_or_default();
        let language = non_empty(&self.attributes, "language").map(str::to_string);
        let title = non_empty(&self.attributes, "title").unwrap_or(default_title);

        ArtifactDraft::new(
            self.id.clone(),
            ArtifactKind::from_wire(artifact_type, language),
            self.content.clone(),
        )
        .with_title(title)
        .with_attributes(self.attributes.clone())
        .closed()
    }
}

/// Result of scanning one snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Completed spans in document order
    pub spans: Vec<ScannedSpan>,
    /// Byte offset of a trailing unclosed (or still-streaming) opening tag
    pub trailing_open_at: Option<usize>,
}

impl ScanResult {
    /// An unclosed opening tag trails the buffer
    #[inline]
    #[must_use]
    pub fn has_trailing_open(&self) -> bool {
        self.trailing_open_at.is_some()
    }

    /// Number of completed spans
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// No completed spans
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

/// Streaming-tolerant artifact tag scanner
#[derive(Debug, Clone)]
pub struct TagScanner {
    config: ScannerConfig,
    opening: Option<Regex>,
}

impl Default for TagScanner {
    fn default() -> Self {
        Self::new(ScannerConfig::default())
    }
}

impl TagScanner {
    /// Build a scanner for the configured tag names
    ///
    /// Tag names that are empty or not plain identifiers are ignored; with no
    /// usable names the scanner reports nothing.
    #[must_use]
    pub fn new(config: ScannerConfig) -> Self {
        let names: Vec<String> = config
            .tag_names
            .iter()
            .filter(|n| is_tag_name(n))
            .map(|n| regex::escape(n))
            .collect();

        let opening = (!names.is_empty()).then(|| {
            let pattern = format!(r"<({})(\s[^<>]*)?>", names.join("|"));
            Regex::new(&pattern).expect("escaped tag names form a valid regex")
        });

        Self { config, opening }
    }

    /// Scanner configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Scan the full cumulative text of a turn
    #[must_use]
    pub fn scan(&self, text: &str) -> ScanResult {
        let mut result = ScanResult::default();
        let Some(opening) = &self.opening else {
            return result;
        };
        let mut pos = 0;

        while let Some(caps) = opening.captures_at(text, pos) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let header = caps.get(2).map_or("", |m| m.as_str());

            // Self-closing `<artifact ... />` carries no body; leave it as prose.
            if header.trim_end().ends_with('/') {
                pos = whole.end();
                continue;
            }

            let closing = format!("</{}>", name.as_str());
            let Some(close_rel) = text[whole.end()..].find(&closing) else {
                result.trailing_open_at = Some(whole.start());
                break;
            };
            let close_start = whole.end() + close_rel;
            let close_end = close_start + closing.len();

            let attributes = parse_attributes(header);
            let ordinal = result.spans.len();
            let (id, generated_id) = resolve_id(&attributes, whole.start(), ordinal);

            result.spans.push(ScannedSpan {
                range: whole.start()..close_end,
                tag: name.as_str().to_string(),
                id,
                generated_id,
                attributes,
                content: text[whole.end()..close_start].trim().to_string(),
            });
            pos = close_end;
        }

        if result.trailing_open_at.is_none() {
            result.trailing_open_at = self.partial_header_at(text, pos);
        }

        log_duplicates(&result.spans);
        tracing::debug!(
            spans = result.spans.len(),
            trailing_open = result.has_trailing_open(),
            "scanned artifact tags"
        );
        result
    }

    /// Convert every span of a scan into drafts, in document order
    #[must_use]
    pub fn drafts(&self, scan: &ScanResult) -> Vec<ArtifactDraft> {
        scan.spans
            .iter()
            .map(|span| span.to_draft(&self.config.default_title))
            .collect()
    }

    /// Detect an opening tag whose header is still streaming at the buffer end
    fn partial_header_at(&self, text: &str, from: usize) -> Option<usize> {
        let tail = &text[from..];
        let lt = tail.rfind('<')?;
        let candidate = &tail[lt + 1..];
        if candidate.contains('>') {
            return None;
        }

        let streaming = self.config.tag_names.iter().filter(|n| is_tag_name(n)).any(|name| {
            candidate.strip_prefix(name.as_str()).is_some_and(|rest| {
                rest.is_empty() || rest.starts_with(char::is_whitespace)
            })
        });
        streaming.then_some(from + lt)
    }
}

/// Pick the author-supplied id if usable, otherwise generate one
fn resolve_id(
    attributes: &BTreeMap<String, String>,
    offset: usize,
    ordinal: usize,
) -> (ArtifactId, bool) {
    let supplied = non_empty(attributes, "identifier")
        .or_else(|| non_empty(attributes, "id"))
        .and_then(|raw| ArtifactId::new(raw).ok());

    match supplied {
        Some(id) => (id, false),
        None => (ArtifactId::generated(offset, ordinal), true),
    }
}

fn is_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == ':')
}

fn log_duplicates(spans: &[ScannedSpan]) {
    let mut seen = HashSet::new();
    for span in spans {
        if !seen.insert(&span.id) {
            tracing::debug!(id = %span.id, "duplicate artifact id in one pass; later span wins");
        }
    }
}
