//! Lumen Render
//!
//! Type-dispatched, failure-isolated rendering of artifacts.
//!
//! # Core Concepts
//!
//! - [`RendererDispatch`]: exhaustive kind → strategy table
//! - [`CodeHighlighter`], [`MarkdownRenderer`], [`SvgRenderer`],
//!   [`DiagramEngine`]: pluggable renderer contracts
//! - [`AllowList`] / [`prepare_document`]: HTML sandbox preparation
//! - [`SurfaceWriter`]: idempotent bounded-retry writes to a [`RenderSurface`]
//!
//! # Example
//!
//! ```rust
//! use lumen_render::{prepare_document, AllowList};
//!
//! let doc = prepare_document(r#"<img src="https://ads.example/x.gif">"#, &AllowList::default());
//! assert!(doc.html.contains(r#"src="about:blank""#));
//! assert_eq!(doc.blocked.len(), 1);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod dispatch;
mod error;
mod html;
mod renderer;
mod surface;

pub use dispatch::{RenderOutcome, RendererDispatch, ViewMode, DEFAULT_DIAGRAM_TIMEOUT};
pub use error::{RenderError, SurfaceError};
pub use html::{
    is_standalone_document, prepare_document, sanitize, AllowList, PreparedDocument,
    SanitizedHtml, BLOCKED_REFERENCE, SANDBOX_ATTRIBUTES,
};
pub use renderer::{
    escape_html, CmarkRenderer, CodeHighlighter, DiagramEngine, InlineSvg, MarkdownRenderer,
    PlainCodeHighlighter, SvgRenderer, UnavailableDiagramEngine,
};
pub use surface::{RenderSurface, RetryPolicy, SurfaceWriter, WriteOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
