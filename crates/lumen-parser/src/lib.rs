//! Lumen Parser
//!
//! Finds artifact blocks in streamed assistant text and swaps them for
//! placeholders.
//!
//! # Core Concepts
//!
//! - [`TagScanner`]: pure scan of a cumulative buffer into closed spans
//! - [`ContentRewriter`]: replaces spans with `[[artifact:{id}]]` tokens
//! - [`RewrittenText`]: rewritten prose plus the placeholder positions
//!
//! # Example
//!
//! ```rust
//! use lumen_parser::{ContentRewriter, TagScanner};
//!
//! let text = r#"See <artifact identifier="demo" type="text/html"><p>hi</p></artifact> above"#;
//! let scan = TagScanner::default().scan(text);
//! let rewritten = ContentRewriter::new().rewrite(text, &scan);
//!
//! assert_eq!(rewritten.as_str(), "See [[artifact:demo]] above");
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod attributes;
mod rewriter;
mod scanner;

pub use attributes::parse_attributes;
pub use rewriter::{
    extract_placeholder_ids, placeholder, ContentRewriter, Placeholder, RewrittenText, Segment,
    PLACEHOLDER_PREFIX, PLACEHOLDER_SUFFIX,
};
pub use scanner::{ScanResult, ScannedSpan, ScannerConfig, TagScanner};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
