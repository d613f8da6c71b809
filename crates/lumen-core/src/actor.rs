//! Single-writer session actor
//!
//! A tokio task owns the [`ConversationSession`]; every mutation goes
//! through its command queue, so the registry never has two writers.

use crate::error::LumenError;
use crate::session::{ArtifactCard, ConversationSession, SessionEvent, TurnUpdate};
use lumen_artifact::{Artifact, ArtifactId};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

/// Default command queue depth
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Commands processed by the session task
#[derive(Debug)]
enum SessionCommand {
    Ingest {
        text: String,
        reply: oneshot::Sender<TurnUpdate>,
    },
    BeginTurn {
        reply: oneshot::Sender<()>,
    },
    Select {
        id: String,
        reply: oneshot::Sender<Result<bool, LumenError>>,
    },
    Dismiss {
        reply: oneshot::Sender<Result<(), LumenError>>,
    },
    Toggle {
        id: String,
        reply: oneshot::Sender<Result<Option<ArtifactId>, LumenError>>,
    },
    Cards {
        reply: oneshot::Sender<Vec<ArtifactCard>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Artifact>>,
    },
    Persistable {
        reply: oneshot::Sender<Vec<Artifact>>,
    },
    Shutdown,
}

/// Cloneable handle to a running session task
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    events: broadcast::Sender<SessionEvent>,
    active: watch::Receiver<Option<Artifact>>,
}

impl SessionHandle {
    /// Spawn a task owning `session`
    #[must_use]
    pub fn spawn(session: ConversationSession) -> Self {
        Self::spawn_with_depth(session, DEFAULT_QUEUE_DEPTH)
    }

    /// Spawn with a custom command queue depth
    #[must_use]
    pub fn spawn_with_depth(session: ConversationSession, depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let events = session.event_sender();
        let active = session.watch_active();
        tokio::spawn(session_task(session, rx));
        Self {
            commands: tx,
            events,
            active,
        }
    }

    /// Feed the cumulative text of the current turn
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`] if the task has stopped.
    pub async fn ingest(&self, text: impl Into<String>) -> Result<TurnUpdate, LumenError> {
        let text = text.into();
        self.request(|reply| SessionCommand::Ingest { text, reply })
            .await
    }

    /// Start a new turn
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`] if the task has stopped.
    pub async fn begin_turn(&self) -> Result<(), LumenError> {
        self.request(|reply| SessionCommand::BeginTurn { reply }).await
    }

    /// User selects an artifact
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`], or the session's own error.
    pub async fn select(&self, id: impl Into<String>) -> Result<bool, LumenError> {
        let id = id.into();
        self.request(|reply| SessionCommand::Select { id, reply })
            .await?
    }

    /// User closes the preview
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`], or the session's own error.
    pub async fn dismiss(&self) -> Result<(), LumenError> {
        self.request(|reply| SessionCommand::Dismiss { reply })
            .await?
    }

    /// Card click
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`], or the session's own error.
    pub async fn toggle(&self, id: impl Into<String>) -> Result<Option<ArtifactId>, LumenError> {
        let id = id.into();
        self.request(|reply| SessionCommand::Toggle { id, reply })
            .await?
    }

    /// Cards for the last ingest
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`] if the task has stopped.
    pub async fn cards(&self) -> Result<Vec<ArtifactCard>, LumenError> {
        self.request(|reply| SessionCommand::Cards { reply }).await
    }

    /// Copy of every artifact in insertion order
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`] if the task has stopped.
    pub async fn snapshot(&self) -> Result<Vec<Artifact>, LumenError> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Copy of every closed artifact
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`] if the task has stopped.
    pub async fn persistable(&self) -> Result<Vec<Artifact>, LumenError> {
        self.request(|reply| SessionCommand::Persistable { reply })
            .await
    }

    /// Subscribe to session events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Watch the active artifact
    #[must_use]
    pub fn watch_active(&self) -> watch::Receiver<Option<Artifact>> {
        self.active.clone()
    }

    /// Stop the session task once the commands queued before this one have run
    pub async fn shutdown(&self) {
        let _ = self.commands.send(SessionCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, LumenError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| LumenError::SessionClosed)?;
        rx.await.map_err(|_| LumenError::SessionClosed)
    }
}

/// Session task (runs in separate tokio task)
async fn session_task(mut session: ConversationSession, mut rx: mpsc::Receiver<SessionCommand>) {
    while let Some(command) = rx.recv().await {
        // A dropped reply receiver just means the caller stopped waiting.
        match command {
            SessionCommand::Ingest { text, reply } => {
                let _ = reply.send(session.ingest(&text));
            }
            SessionCommand::BeginTurn { reply } => {
                session.begin_turn();
                let _ = reply.send(());
            }
            SessionCommand::Select { id, reply } => {
                let _ = reply.send(session.select(&id));
            }
            SessionCommand::Dismiss { reply } => {
                let _ = reply.send(session.dismiss());
            }
            SessionCommand::Toggle { id, reply } => {
                let _ = reply.send(session.toggle(&id));
            }
            SessionCommand::Cards { reply } => {
                let _ = reply.send(session.cards());
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(session.registry().list().cloned().collect());
            }
            SessionCommand::Persistable { reply } => {
                let _ = reply.send(session.persistable().cloned().collect());
            }
            SessionCommand::Shutdown => break,
        }
    }
    tracing::debug!("session task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commands_are_applied_in_order() {
        let handle = SessionHandle::spawn(ConversationSession::default());

        let first = handle.ingest(r#"<artifact id="a">1</artifact>"#).await.unwrap();
        assert_eq!(first.changes.len(), 1);

        handle
            .ingest(r#"<artifact id="a">1</artifact><artifact id="b">2</artifact>"#)
            .await
            .unwrap();
        assert!(handle.select("b").await.unwrap());

        let snapshot = handle.snapshot().await.unwrap();
        let ids: Vec<_> = snapshot.iter().map(|a| a.id().as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(
            handle.watch_active().borrow().as_ref().map(|a| a.id().as_str().to_string()),
            Some("b".to_string())
        );
    }

    #[tokio::test]
    async fn closed_session_reports_error() {
        let handle = SessionHandle::spawn(ConversationSession::default());
        handle.shutdown().await;

        let err = handle.ingest("x").await.unwrap_err();
        assert!(matches!(err, LumenError::SessionClosed));
    }

    #[tokio::test]
    async fn clones_share_one_session() {
        let handle = SessionHandle::spawn(ConversationSession::default());
        let other = handle.clone();

        handle.ingest(r#"<artifact id="a">1</artifact>"#).await.unwrap();
        assert_eq!(other.persistable().await.unwrap().len(), 1);

        other.begin_turn().await.unwrap();
        assert!(handle.snapshot().await.unwrap().is_empty());
        assert!(handle.cards().await.unwrap().is_empty());
    }
}
