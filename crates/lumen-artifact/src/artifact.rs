//! Artifact entity and its identity
//!
//! An [`Artifact`] is created from an [`ArtifactDraft`] the first time an id
//! is seen and then merged in place as the stream grows. The merge rules that
//! keep the entity consistent live here, next to the fields they protect:
//!
//! - `hash` is always the hash of the current `content`
//! - `closed` only ever moves from `false` to `true`
//! - `created_at` is written once

use crate::artifact_type::{ArtifactKind, ArtifactType};
use crate::hash::ContentHash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Title used when the tag carries none
pub const DEFAULT_TITLE: &str = "Untitled";

/// Errors related to artifact construction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArtifactError {
    /// Identifier cannot be embedded in a placeholder
    #[error("invalid artifact id {0:?}: must be non-empty without whitespace or brackets")]
    InvalidId(String),

    /// Stored hash does not match content (integrity check failed)
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Hash recomputed from content
        expected: ContentHash,
        /// Hash carried by the entity
        actual: ContentHash,
    },
}

/// Stable artifact identifier
///
/// Either author-supplied through the tag's `identifier` attribute or
/// generated by the scanner from the span position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Validate and wrap an identifier
    ///
    /// # Errors
    /// Returns [`ArtifactError::InvalidId`] for empty ids or ids containing
    /// whitespace, control characters, `[` or `]`.
    pub fn new(id: impl Into<String>) -> Result<Self, ArtifactError> {
        let id = id.into();
        if Self::is_valid(&id) {
            Ok(Self(id))
        } else {
            Err(ArtifactError::InvalidId(id))
        }
    }

    /// Check whether a string is usable as an id
    #[must_use]
    pub fn is_valid(id: &str) -> bool {
        !id.is_empty()
            && !id
                .chars()
                .any(|c| c.is_whitespace() || c.is_control() || c == '[' || c == ']')
    }

    /// Id for a span that carried no usable identifier
    ///
    /// `offset` is the byte offset of the opening tag, `ordinal` the span's
    /// index within the scan. Offsets do not move while a buffer grows, so the
    /// same span keeps its id across snapshots.
    #[must_use]
    pub fn generated(offset: usize, ordinal: usize) -> Self {
        Self(format!("artifact-{offset}-{ordinal}"))
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ArtifactId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Borrow<str> for ArtifactId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = ArtifactError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.0
    }
}

/// Untimestamped artifact as read from one tag occurrence
///
/// The registry turns drafts into [`Artifact`]s and owns the timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDraft {
    /// Identifier
    pub id: ArtifactId,
    /// Kind with type-specific fields
    pub kind: ArtifactKind,
    /// Display title
    pub title: String,
    /// Body text (already trimmed by the scanner)
    pub content: String,
    /// Whether the closing delimiter was observed
    pub closed: bool,
    /// Raw tag attributes
    pub attributes: BTreeMap<String, String>,
}

impl ArtifactDraft {
    /// Open draft with default title and no attributes
    #[must_use]
    pub fn new(id: ArtifactId, kind: ArtifactKind, content: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            title: DEFAULT_TITLE.to_string(),
            content: content.into(),
            closed: false,
            attributes: BTreeMap::new(),
        }
    }

    /// Set title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Mark closed
    #[must_use]
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    /// Attach raw attributes
    #[must_use]
    pub fn with_attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// What a merge did to an existing artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeEffect {
    /// Body hash differs from before
    pub content_changed: bool,
    /// Any other field differs (kind, title, closed, attributes)
    pub metadata_changed: bool,
}

impl MergeEffect {
    /// Nothing observable changed
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        !self.content_changed && !self.metadata_changed
    }
}

/// Registry-owned artifact entity
///
/// # Invariants
/// - `hash == ContentHash::of_text(&content)`
/// - `closed` is monotonic
/// - `created_at` never changes after construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    id: ArtifactId,
    hash: ContentHash,
    kind: ArtifactKind,
    title: String,
    content: String,
    closed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    attributes: BTreeMap<String, String>,
}

impl Artifact {
    /// Create an entity from its first draft
    ///
    /// # Performance
    /// O(n) in content size (hash computation)
    #[must_use]
    pub fn from_draft(draft: ArtifactDraft, now: DateTime<Utc>) -> Self {
        Self {
            hash: ContentHash::of_text(&draft.content),
            id: draft.id,
            kind: draft.kind,
            title: draft.title,
            content: draft.content,
            closed: draft.closed,
            created_at: now,
            updated_at: now,
            attributes: draft.attributes,
        }
    }

    /// Merge a later draft of the same id (last write wins)
    ///
    /// Replaces content, kind, title and attributes; keeps `created_at`;
    /// `closed` becomes `old || new`. `updated_at` is bumped on every merge.
    /// The draft's id is not consulted; callers route by id.
    pub fn merge(&mut self, draft: ArtifactDraft, now: DateTime<Utc>) -> MergeEffect {
        let hash = ContentHash::of_text(&draft.content);
        let closed = self.closed || draft.closed;

        let effect = MergeEffect {
            content_changed: hash != self.hash,
            metadata_changed: draft.kind != self.kind
                || draft.title != self.title
                || closed != self.closed
                || draft.attributes != self.attributes,
        };

        self.hash = hash;
        self.content = draft.content;
        self.kind = draft.kind;
        self.title = draft.title;
        self.closed = closed;
        self.attributes = draft.attributes;
        self.updated_at = now;

        effect
    }

    /// Identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    /// Content hash
    #[inline]
    #[must_use]
    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    /// Kind with type-specific fields
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ArtifactKind {
        &self.kind
    }

    /// Wire type
    #[inline]
    #[must_use]
    pub fn artifact_type(&self) -> ArtifactType {
        self.kind.artifact_type()
    }

    /// Display title
    #[inline]
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Body text
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Language hint (code only)
    #[inline]
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.kind.language()
    }

    /// Whether the closing delimiter has been observed
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// First time this id was seen
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last merge time
    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Raw tag attributes
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Recompute the hash and compare (useful after deserialization)
    ///
    /// # Errors
    /// Returns [`ArtifactError::HashMismatch`] if content and hash disagree
    pub fn verify(&self) -> Result<(), ArtifactError> {
        let expected = ContentHash::of_text(&self.content);
        if expected == self.hash {
            Ok(())
        } else {
            Err(ArtifactError::HashMismatch {
                expected,
                actual: self.hash,
            })
        }
    }
}
