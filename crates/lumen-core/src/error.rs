//! Error types for Lumen Core
//!
//! Parsing and rendering never fail outward; what is left is configuration,
//! I/O, a session actor that has gone away, and invalid artifact input.

use lumen_artifact::ArtifactError;
use lumen_registry::ActivationError;

/// Main Lumen error type
#[derive(Debug, thiserror::Error)]
pub enum LumenError {
    /// Invalid or unreadable configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem or stream error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Session actor stopped before answering
    #[error("session closed")]
    SessionClosed,

    /// Invalid artifact input
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    /// Activation state machine rejected a transition
    #[error("activation error: {0}")]
    Activation(#[from] ActivationError),
}

impl LumenError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            Self::Config(_) | Self::SessionClosed | Self::Artifact(_) | Self::Activation(_) => {
                false
            }
        }
    }

    /// Create configuration error
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
