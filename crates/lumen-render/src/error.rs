//! Error types for rendering
//!
//! None of these cross [`RendererDispatch::render`](crate::RendererDispatch::render);
//! they are folded into a [`RenderOutcome`](crate::RenderOutcome) there.

/// Failure of one renderer strategy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// Code highlighter failed
    #[error("highlight failed: {0}")]
    Highlight(String),

    /// Markdown renderer failed
    #[error("markdown render failed: {0}")]
    Markdown(String),

    /// SVG content rejected or unrenderable
    #[error("svg render failed: {0}")]
    Svg(String),

    /// Diagram engine failed
    #[error("diagram render failed: {0}")]
    Diagram(String),

    /// Diagram engine did not answer in time
    #[error("diagram render timed out after {timeout_ms}ms")]
    DiagramTimeout {
        /// Configured bound
        timeout_ms: u64,
    },

    /// Sandbox surface could not be written
    #[error("sandbox failed: {0}")]
    Surface(#[from] SurfaceError),
}

/// Failure of a render surface
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    /// Surface accepted the call but the write failed
    #[error("write failed: {0}")]
    Write(String),

    /// Tear-down and recreation failed
    #[error("recreate failed: {0}")]
    Recreate(String),

    /// Every attempt found the surface unready or failing
    #[error("surface unavailable after {attempts} attempts (recreated: {recreated})")]
    Exhausted {
        /// Attempts in the final sequence
        attempts: u32,
        /// Whether a recreation was already tried
        recreated: bool,
    },
}

impl SurfaceError {
    /// Worth retrying on the same surface
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}
