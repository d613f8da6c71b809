//! Lumen Artifact Model
//!
//! Typed, content-hashed artifacts extracted from streamed model output.
//!
//! # Core Concepts
//!
//! - [`Artifact`]: registry-owned entity with stable identity and merge rules
//! - [`ArtifactDraft`]: one tag occurrence, before the registry stamps it
//! - [`ArtifactKind`]: closed union of code, HTML, markdown, SVG and diagram
//! - [`ContentHash`]: 32-byte Blake3 hash used for change detection
//!
//! # Example
//!
//! ```rust
//! use lumen_artifact::{Artifact, ArtifactDraft, ArtifactId, ArtifactKind};
//!
//! let id = ArtifactId::new("greeting").unwrap();
//! let draft = ArtifactDraft::new(id, ArtifactKind::Html, "<b>hi</b>").closed();
//! let artifact = Artifact::from_draft(draft, chrono::Utc::now());
//!
//! assert!(artifact.is_closed());
//! assert!(artifact.verify().is_ok());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod artifact_type;
mod hash;

pub use artifact::{
    Artifact, ArtifactDraft, ArtifactError, ArtifactId, MergeEffect, DEFAULT_TITLE,
};
pub use artifact_type::{ArtifactKind, ArtifactType};
pub use hash::{ContentHash, HashError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
