//! Lumen Core
//!
//! Wires scanning, rewriting, the registry, activation and rendering into a
//! per-conversation pipeline.
//!
//! # Architecture
//!
//! ```text
//! text snapshot ─▶ TagScanner ─▶ ContentRewriter ─▶ rewritten prose
//!                      │
//!                      └─▶ ArtifactRegistry.upsert ─▶ ActivationPolicy
//!                                                         │ (watch)
//!                                                         ▼
//!                                        PreviewController ─▶ RendererDispatch
//! ```
//!
//! # Example
//!
//! ```rust
//! use lumen_core::{ConversationSession, LumenConfig};
//!
//! let mut session = ConversationSession::new(&LumenConfig::default());
//! let update = session.ingest(r#"Intro <artifact id="a" type="text/html"><b>hi</b></artifact> outro"#);
//!
//! assert_eq!(update.rewritten.as_str(), "Intro [[artifact:a]] outro");
//! assert_eq!(session.active().map(|a| a.content()), Some("<b>hi</b>"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod actor;
mod config;
mod error;
mod preview;
mod session;

pub use actor::{SessionHandle, DEFAULT_QUEUE_DEPTH};
pub use config::{LumenConfig, RenderConfig, SandboxConfig};
pub use error::LumenError;
pub use preview::{PreviewController, PreviewHandle, PreviewState};
pub use session::{ArtifactCard, ConversationSession, SessionEvent, TurnUpdate};

// Re-export the pipeline crates
pub use lumen_artifact::{Artifact, ArtifactId, ArtifactKind, ArtifactType, ContentHash};
pub use lumen_parser::{RewrittenText, Segment};
pub use lumen_registry::{ActivationState, ArtifactRegistry, UpsertOutcome};
pub use lumen_render::{
    AllowList, RenderOutcome, RenderSurface, RendererDispatch, RetryPolicy, SurfaceError,
    ViewMode, WriteOutcome,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_flows_into_session() {
        let config = LumenConfig::default().with_tag_names(["widget"]);
        let mut session = ConversationSession::new(&config);

        let update = session.ingest(r#"<artifact id="a">x</artifact><widget id="w">y</widget>"#);
        assert_eq!(update.changes.len(), 1);
        assert!(session.registry().get("w").is_some());
        assert!(session.registry().get("a").is_none());
    }
}
