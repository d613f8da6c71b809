//! Conversation session
//!
//! Owns the whole synchronous pipeline for one conversation: scan the
//! cumulative turn text, rewrite it, upsert the drafts and apply the
//! activation policy. Observers get [`SessionEvent`]s on a broadcast channel
//! and the active artifact on a watch channel.

use crate::config::LumenConfig;
use crate::error::LumenError;
use lumen_artifact::{Artifact, ArtifactId, ContentHash};
use lumen_parser::{ContentRewriter, RewrittenText, TagScanner};
use lumen_registry::{ActivationPolicy, ActivationState, ArtifactRegistry, UpsertOutcome};
use serde::Serialize;
use tokio::sync::{broadcast, watch};

/// Change notification for observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// First completed parse of an id
    Created {
        /// Artifact id
        id: ArtifactId,
    },
    /// Content hash changed on a later parse
    Updated {
        /// Artifact id
        id: ArtifactId,
        /// New content hash
        hash: ContentHash,
    },
    /// Active artifact changed to `id`
    Activated {
        /// Artifact id
        id: ArtifactId,
    },
    /// No artifact is active any more
    Deactivated,
    /// Registry cleared at a turn boundary
    Cleared,
}

/// Compact reference card for a placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactCard {
    /// Artifact id
    pub id: ArtifactId,
    /// Title
    pub title: String,
    /// Kind label (language, `HTML`, `Markdown`, ...)
    pub label: String,
    /// Closing tag seen (check mark rather than spinner)
    pub closed: bool,
    /// Currently shown in the preview
    pub active: bool,
}

/// What one ingest did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnUpdate {
    /// Prose with placeholders
    pub rewritten: RewrittenText,
    /// Upsert outcome per completed span, in document order
    pub changes: Vec<(ArtifactId, UpsertOutcome)>,
    /// An artifact block is still streaming at the end of the text
    pub trailing_open: bool,
}

impl TurnUpdate {
    /// Ids whose rendered output may differ after this ingest
    pub fn changed_ids(&self) -> impl Iterator<Item = &ArtifactId> {
        self.changes
            .iter()
            .filter(|(_, outcome)| outcome.content_changed())
            .map(|(id, _)| id)
    }
}

/// Pipeline state for one conversation
#[derive(Debug)]
pub struct ConversationSession {
    scanner: TagScanner,
    rewriter: ContentRewriter,
    registry: ArtifactRegistry,
    policy: ActivationPolicy,
    placeholders: Vec<ArtifactId>,
    events: broadcast::Sender<SessionEvent>,
    active_tx: watch::Sender<Option<Artifact>>,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self::new(&LumenConfig::default())
    }
}

impl ConversationSession {
    /// Create session from configuration
    #[must_use]
    pub fn new(config: &LumenConfig) -> Self {
        let (events, _) = broadcast::channel(config.render.event_capacity.max(1));
        let (active_tx, _) = watch::channel(None);
        Self {
            scanner: TagScanner::new(config.scanner.clone()),
            rewriter: ContentRewriter::new(),
            registry: ArtifactRegistry::new(),
            policy: ActivationPolicy::new(),
            placeholders: Vec::new(),
            events,
            active_tx,
        }
    }

    /// Process the full text of the current turn so far
    ///
    /// Call with every new snapshot; the text must grow monotonically within
    /// a turn.
    pub fn ingest(&mut self, text: &str) -> TurnUpdate {
        let scan = self.scanner.scan(text);
        let rewritten = self.rewriter.rewrite(text, &scan);
        let before = self.registry.active_id().cloned();

        let changes = self.registry.upsert_all(self.scanner.drafts(&scan));
        for (id, outcome) in &changes {
            match outcome {
                UpsertOutcome::Inserted => {
                    self.emit(SessionEvent::Created { id: id.clone() });
                    self.policy.on_created(&mut self.registry, id);
                }
                UpsertOutcome::Updated {
                    content_changed: true,
                } => {
                    if let Some(artifact) = self.registry.get(id.as_str()) {
                        self.emit(SessionEvent::Updated {
                            id: id.clone(),
                            hash: *artifact.hash(),
                        });
                    }
                }
                UpsertOutcome::Updated { .. } | UpsertOutcome::Unchanged => {}
            }
        }

        self.placeholders = rewritten.ids().cloned().collect();
        self.publish_active(before);

        tracing::debug!(
            bytes = text.len(),
            spans = scan.len(),
            changed = changes.iter().filter(|(_, o)| o.content_changed()).count(),
            trailing_open = scan.has_trailing_open(),
            "ingested turn snapshot"
        );

        TurnUpdate {
            rewritten,
            changes,
            trailing_open: scan.has_trailing_open(),
        }
    }

    /// Start a new turn: drop all artifacts and re-enable auto-activation
    pub fn begin_turn(&mut self) {
        let dropped = self.registry.len();
        self.registry.clear();
        self.policy.reset();
        self.placeholders.clear();
        self.emit(SessionEvent::Cleared);
        self.active_tx.send_replace(None);
        tracing::info!(dropped, "new turn");
    }

    /// User selects an artifact; unknown ids are ignored
    ///
    /// # Errors
    /// [`LumenError::Artifact`] if `id` is not a valid artifact id,
    /// [`LumenError::Activation`] if the policy rejects the transition.
    pub fn select(&mut self, id: &str) -> Result<bool, LumenError> {
        let id = ArtifactId::new(id)?;
        let before = self.registry.active_id().cloned();
        let selected = self.policy.select(&mut self.registry, id.as_str())?;
        self.publish_active(before);
        Ok(selected)
    }

    /// User closes the preview
    ///
    /// # Errors
    /// [`LumenError::Activation`] if the policy rejects the transition.
    pub fn dismiss(&mut self) -> Result<(), LumenError> {
        let before = self.registry.active_id().cloned();
        self.policy.dismiss(&mut self.registry)?;
        self.publish_active(before);
        Ok(())
    }

    /// Card click: dismiss if active, select otherwise
    ///
    /// # Errors
    /// [`LumenError::Artifact`] if `id` is not a valid artifact id,
    /// [`LumenError::Activation`] if the policy rejects the transition.
    pub fn toggle(&mut self, id: &str) -> Result<Option<ArtifactId>, LumenError> {
        let id = ArtifactId::new(id)?;
        let before = self.registry.active_id().cloned();
        let active = self.policy.toggle(&mut self.registry, id.as_str())?;
        self.publish_active(before);
        Ok(active)
    }

    /// Remove one artifact
    pub fn remove(&mut self, id: &str) -> Option<Artifact> {
        let before = self.registry.active_id().cloned();
        let removed = self.registry.remove(id);
        self.publish_active(before);
        removed
    }

    /// Cards for the placeholders of the last ingest, in order
    #[must_use]
    pub fn cards(&self) -> Vec<ArtifactCard> {
        let active = self.registry.active_id();
        self.placeholders
            .iter()
            .filter_map(|id| self.registry.get(id.as_str()))
            .map(|artifact| ArtifactCard {
                id: artifact.id().clone(),
                title: artifact.title().to_string(),
                label: artifact.kind().display_label().to_string(),
                closed: artifact.is_closed(),
                active: active == Some(artifact.id()),
            })
            .collect()
    }

    /// Artifact registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    /// Closed artifacts, ready for the persistence collaborator
    pub fn persistable(&self) -> impl Iterator<Item = &Artifact> {
        self.registry.persistable()
    }

    /// Active artifact
    #[inline]
    #[must_use]
    pub fn active(&self) -> Option<&Artifact> {
        self.registry.active()
    }

    /// Activation policy state
    #[inline]
    #[must_use]
    pub fn activation_state(&self) -> ActivationState {
        self.policy.state()
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Event sender, for handles that subscribe later
    #[must_use]
    pub fn event_sender(&self) -> broadcast::Sender<SessionEvent> {
        self.events.clone()
    }

    /// Watch the active artifact
    #[must_use]
    pub fn watch_active(&self) -> watch::Receiver<Option<Artifact>> {
        self.active_tx.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Emit activation events and push the active artifact to watchers
    fn publish_active(&self, before: Option<ArtifactId>) {
        let after = self.registry.active_id();
        if after != before.as_ref() {
            match after {
                Some(id) => self.emit(SessionEvent::Activated { id: id.clone() }),
                None => self.emit(SessionEvent::Deactivated),
            }
        }

        let current = self.registry.active();
        self.active_tx.send_if_modified(|shown| {
            let same = match (shown.as_ref(), current) {
                (Some(a), Some(b)) => {
                    a.id() == b.id() && a.hash() == b.hash() && a.kind() == b.kind()
                }
                (None, None) => true,
                _ => false,
            };
            if !same {
                *shown = current.cloned();
            }
            !same
        });
    }
}
