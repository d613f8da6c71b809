//! Lumen Registry
//!
//! Identity-stable artifact storage for one conversation, plus the policy
//! that decides which artifact the preview shows.
//!
//! # Core Concepts
//!
//! - [`ArtifactRegistry`]: insertion-ordered store with merge-on-upsert
//! - [`UpsertOutcome`]: whether an upsert inserted, changed or did nothing
//! - [`ActivationPolicy`]: `none` / `auto` / `user` state machine
//!
//! # Example
//!
//! ```rust
//! use lumen_artifact::{ArtifactDraft, ArtifactId, ArtifactKind};
//! use lumen_registry::{ActivationPolicy, ArtifactRegistry};
//!
//! let mut registry = ArtifactRegistry::new();
//! let mut policy = ActivationPolicy::new();
//!
//! let id = ArtifactId::new("notes").unwrap();
//! let outcome = registry.upsert(ArtifactDraft::new(id.clone(), ArtifactKind::Markdown, "# Notes"));
//! if outcome.is_insert() {
//!     policy.on_created(&mut registry, &id);
//! }
//!
//! assert_eq!(registry.active_id(), Some(&id));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod activation;
mod registry;

pub use activation::{
    allowed_transitions, validate_transition, ActivationError, ActivationPolicy, ActivationState,
};
pub use registry::{ArtifactRegistry, UpsertOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
