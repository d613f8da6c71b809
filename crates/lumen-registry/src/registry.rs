//! Artifact registry
//!
//! Provides [`ArtifactRegistry`], the single owner of every artifact in a
//! conversation session. Entries keep insertion order; the active artifact is
//! held as an id, never as a second owner.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use lumen_artifact::{Artifact, ArtifactDraft, ArtifactId};
use serde::Serialize;

/// Result of a single upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum UpsertOutcome {
    /// First time this id was seen
    Inserted,
    /// Existing entry merged and something observable changed
    Updated {
        /// Content hash differs from before
        content_changed: bool,
    },
    /// Existing entry merged with identical data
    Unchanged,
}

impl UpsertOutcome {
    /// Whether the rendered output may differ (new entry or new hash)
    #[inline]
    #[must_use]
    pub const fn content_changed(&self) -> bool {
        matches!(
            self,
            Self::Inserted
                | Self::Updated {
                    content_changed: true
                }
        )
    }

    /// Whether this upsert created the entry
    #[inline]
    #[must_use]
    pub const fn is_insert(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Identity-stable store of artifacts for one conversation
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    entries: IndexMap<ArtifactId, Artifact>,
    active: Option<ArtifactId>,
}

impl ArtifactRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a draft, stamping it with the wall clock
    pub fn upsert(&mut self, draft: ArtifactDraft) -> UpsertOutcome {
        self.upsert_at(draft, Utc::now())
    }

    /// Insert or merge a draft with an explicit timestamp
    ///
    /// A new id gets `created_at = updated_at = now`. A known id is merged:
    /// content, kind, title and attributes are replaced, `closed` only ever
    /// goes from false to true and `created_at` is kept.
    pub fn upsert_at(&mut self, draft: ArtifactDraft, now: DateTime<Utc>) -> UpsertOutcome {
        if let Some(existing) = self.entries.get_mut(&draft.id) {
            let effect = existing.merge(draft, now);
            if effect.content_changed {
                tracing::debug!(
                    id = %existing.id(),
                    hash = %existing.hash().short(),
                    closed = existing.is_closed(),
                    "artifact content updated"
                );
            }
            return if effect.is_noop() {
                UpsertOutcome::Unchanged
            } else {
                UpsertOutcome::Updated {
                    content_changed: effect.content_changed,
                }
            };
        }

        let artifact = Artifact::from_draft(draft, now);
        tracing::info!(
            id = %artifact.id(),
            kind = %artifact.artifact_type(),
            hash = %artifact.hash().short(),
            "artifact created"
        );
        self.entries.insert(artifact.id().clone(), artifact);
        UpsertOutcome::Inserted
    }

    /// Apply one scan pass in document order
    ///
    /// Later drafts of a repeated id overwrite earlier ones within the batch.
    pub fn upsert_all<I>(&mut self, drafts: I) -> Vec<(ArtifactId, UpsertOutcome)>
    where
        I: IntoIterator<Item = ArtifactDraft>,
    {
        let now = Utc::now();
        drafts
            .into_iter()
            .map(|draft| {
                let id = draft.id.clone();
                (id, self.upsert_at(draft, now))
            })
            .collect()
    }

    /// Get artifact by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Artifact> {
        self.entries.get(id)
    }

    /// Check if an id is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// All artifacts in insertion order
    pub fn list(&self) -> impl Iterator<Item = &Artifact> {
        self.entries.values()
    }

    /// Closed artifacts only; the ones eligible for durable storage
    pub fn persistable(&self) -> impl Iterator<Item = &Artifact> {
        self.entries.values().filter(|a| a.is_closed())
    }

    /// Remove an artifact, clearing the active pointer if it referenced it
    pub fn remove(&mut self, id: &str) -> Option<Artifact> {
        let removed = self.entries.shift_remove(id)?;
        if self.active.as_ref().is_some_and(|a| a.as_str() == id) {
            self.active = None;
        }
        tracing::debug!(id = %removed.id(), "artifact removed");
        Some(removed)
    }

    /// Drop every entry and the active pointer
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.active = None;
        tracing::debug!(dropped, "registry cleared");
    }

    /// Set or clear the active artifact
    ///
    /// Unknown ids are ignored. Returns whether the pointer now matches the
    /// request.
    pub fn set_active(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.active = None;
                true
            }
            Some(id) => match self.entries.get_key_value(id) {
                Some((key, _)) => {
                    self.active = Some(key.clone());
                    true
                }
                None => {
                    tracing::debug!(id, "ignoring activation of unknown artifact");
                    false
                }
            },
        }
    }

    /// Currently active artifact
    #[inline]
    #[must_use]
    pub fn active(&self) -> Option<&Artifact> {
        self.active.as_ref().and_then(|id| self.entries.get(id))
    }

    /// Id of the currently active artifact
    #[inline]
    #[must_use]
    pub fn active_id(&self) -> Option<&ArtifactId> {
        self.active.as_ref()
    }

    /// Number of artifacts
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
