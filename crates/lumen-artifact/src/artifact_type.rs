//! Artifact kinds
//!
//! [`ArtifactType`] is the field-less discriminant that appears on the wire as
//! a media type. [`ArtifactKind`] is the closed tagged union the rest of the
//! system matches on; each variant carries only the fields that make sense for
//! it (a language only exists on code).

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Wire-level artifact type
///
/// Parsing never fails: anything unrecognized is treated as code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    /// Source code shown with a highlighter
    #[default]
    Code,
    /// Untrusted HTML executed in a sandbox
    Html,
    /// Markdown document
    Markdown,
    /// Inline SVG image
    Svg,
    /// Diagram source (mermaid)
    Diagram,
}

impl ArtifactType {
    /// All variants, in wire-table order
    pub const ALL: [ArtifactType; 5] = [
        ArtifactType::Code,
        ArtifactType::Html,
        ArtifactType::Markdown,
        ArtifactType::Svg,
        ArtifactType::Diagram,
    ];

    /// Media type used in the `type` tag attribute
    #[must_use]
    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Code => "application/vnd.ant.code",
            Self::Html => "text/html",
            Self::Markdown => "text/markdown",
            Self::Svg => "image/svg+xml",
            Self::Diagram => "application/vnd.ant.mermaid",
        }
    }

    /// Resolve a `type` attribute value (case-insensitive, unknown → code)
    #[must_use]
    pub fn from_media_type(value: &str) -> Self {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.media_type().eq_ignore_ascii_case(value))
            .unwrap_or_default()
    }
}

impl Display for ArtifactType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

/// Closed union of artifact kinds with their type-specific fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Source code
    Code {
        /// Highlighting language hint from the `language` attribute
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
    /// HTML document or fragment
    Html,
    /// Markdown text
    Markdown,
    /// SVG markup
    Svg,
    /// Diagram source
    Diagram,
}

impl ArtifactKind {
    /// Build a kind from a wire type; `language` is kept only for code
    #[must_use]
    pub fn from_wire(artifact_type: ArtifactType, language: Option<String>) -> Self {
        match artifact_type {
            ArtifactType::Code => Self::Code { language },
            ArtifactType::Html => Self::Html,
            ArtifactType::Markdown => Self::Markdown,
            ArtifactType::Svg => Self::Svg,
            ArtifactType::Diagram => Self::Diagram,
        }
    }

    /// Wire discriminant
    #[must_use]
    pub const fn artifact_type(&self) -> ArtifactType {
        match self {
            Self::Code { .. } => ArtifactType::Code,
            Self::Html => ArtifactType::Html,
            Self::Markdown => ArtifactType::Markdown,
            Self::Svg => ArtifactType::Svg,
            Self::Diagram => ArtifactType::Diagram,
        }
    }

    /// Language hint (code only)
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Code { language } => language.as_deref(),
            _ => None,
        }
    }

    /// Short label for preview toolbars and reference cards
    #[must_use]
    pub fn display_label(&self) -> &str {
        match self {
            Self::Code { language: Some(lang) } => lang,
            Self::Code { language: None } => "Text",
            Self::Html => "HTML",
            Self::Markdown => "Markdown",
            Self::Svg => "SVG",
            Self::Diagram => "Mermaid",
        }
    }

    /// Whether a rendered preview exists besides the source view
    #[must_use]
    pub const fn can_preview(&self) -> bool {
        !matches!(self, Self::Code { .. })
    }
}

impl Default for ArtifactKind {
    fn default() -> Self {
        Self::Code { language: None }
    }
}
