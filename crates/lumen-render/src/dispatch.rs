//! Renderer dispatch
//!
//! Picks a strategy by artifact kind and keeps each strategy's failure local
//! to the artifact being rendered.

use crate::error::RenderError;
use crate::html::{prepare_document, AllowList};
use crate::renderer::{
    CmarkRenderer, CodeHighlighter, DiagramEngine, InlineSvg, MarkdownRenderer,
    PlainCodeHighlighter, SvgRenderer, UnavailableDiagramEngine,
};
use crate::surface::{RenderSurface, RetryPolicy, SurfaceWriter, WriteOutcome};
use lumen_artifact::{Artifact, ArtifactKind};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default bound on diagram rendering
pub const DEFAULT_DIAGRAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Preview pane mode
///
/// A pane opens on the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    /// Show the artifact's source through the code strategy
    #[default]
    Source,
    /// Render by kind
    Preview,
}

/// Result of rendering one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RenderOutcome {
    /// Markup for the host to display inline
    Markup {
        /// Rendered HTML
        html: String,
    },
    /// HTML went to the sandbox surface
    Sandboxed(WriteOutcome),
    /// Renderer failed; show the source as plain text
    RawFallback {
        /// Artifact source
        source: String,
        /// Failure description
        reason: String,
    },
    /// Nothing could be shown for this artifact
    Failed {
        /// Failure description
        reason: String,
    },
}

impl RenderOutcome {
    /// Whether a renderer failure was involved
    #[inline]
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::RawFallback { .. } | Self::Failed { .. })
    }
}

/// Strategy table plus the sandbox writer for HTML
pub struct RendererDispatch<S> {
    code: Arc<dyn CodeHighlighter>,
    markdown: Arc<dyn MarkdownRenderer>,
    svg: Arc<dyn SvgRenderer>,
    diagram: Arc<dyn DiagramEngine>,
    allow_list: AllowList,
    diagram_timeout: Duration,
    sandbox: SurfaceWriter<S>,
}

impl<S: RenderSurface> RendererDispatch<S> {
    /// Create dispatch with default adapters around a sandbox surface
    #[must_use]
    pub fn new(surface: S) -> Self {
        Self {
            code: Arc::new(PlainCodeHighlighter),
            markdown: Arc::new(CmarkRenderer),
            svg: Arc::new(InlineSvg),
            diagram: Arc::new(UnavailableDiagramEngine),
            allow_list: AllowList::default(),
            diagram_timeout: DEFAULT_DIAGRAM_TIMEOUT,
            sandbox: SurfaceWriter::new(surface),
        }
    }

    /// Set code highlighter
    #[must_use]
    pub fn with_code_highlighter(mut self, code: Arc<dyn CodeHighlighter>) -> Self {
        self.code = code;
        self
    }

    /// Set markdown renderer
    #[must_use]
    pub fn with_markdown_renderer(mut self, markdown: Arc<dyn MarkdownRenderer>) -> Self {
        self.markdown = markdown;
        self
    }

    /// Set SVG renderer
    #[must_use]
    pub fn with_svg_renderer(mut self, svg: Arc<dyn SvgRenderer>) -> Self {
        self.svg = svg;
        self
    }

    /// Set diagram engine
    #[must_use]
    pub fn with_diagram_engine(mut self, diagram: Arc<dyn DiagramEngine>) -> Self {
        self.diagram = diagram;
        self
    }

    /// Set sandbox allow-list
    #[must_use]
    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// Set sandbox retry policy
    #[must_use]
    pub fn with_retry_policy(self, policy: RetryPolicy) -> Self {
        let Self {
            code,
            markdown,
            svg,
            diagram,
            allow_list,
            diagram_timeout,
            sandbox,
        } = self;
        let surface = sandbox.into_surface();
        Self {
            code,
            markdown,
            svg,
            diagram,
            allow_list,
            diagram_timeout,
            sandbox: SurfaceWriter::with_policy(surface, policy),
        }
    }

    /// Set diagram timeout
    #[must_use]
    pub fn with_diagram_timeout(mut self, timeout: Duration) -> Self {
        self.diagram_timeout = timeout;
        self
    }

    /// Sandbox allow-list
    #[inline]
    #[must_use]
    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Sandbox writer
    #[inline]
    #[must_use]
    pub fn sandbox(&self) -> &SurfaceWriter<S> {
        &self.sandbox
    }

    /// Forget the sandbox's last written content
    pub fn reset(&mut self) {
        self.sandbox.reset();
    }

    /// Render one artifact
    ///
    /// Never fails; renderer errors are logged and turned into a fallback
    /// outcome.
    pub async fn render(&mut self, artifact: &Artifact, mode: ViewMode) -> RenderOutcome {
        let kind = artifact.kind();
        let result = match (mode, kind) {
            (ViewMode::Source, _) | (ViewMode::Preview, ArtifactKind::Code { .. }) => self
                .code
                .highlight(artifact.content(), source_language(kind))
                .map(|html| RenderOutcome::Markup { html }),
            (ViewMode::Preview, ArtifactKind::Markdown) => self
                .markdown
                .render(artifact.content())
                .map(|html| RenderOutcome::Markup { html }),
            (ViewMode::Preview, ArtifactKind::Svg) => self
                .svg
                .render(artifact.content(), &self.allow_list)
                .map(|html| RenderOutcome::Markup { html }),
            (ViewMode::Preview, ArtifactKind::Diagram) => self
                .render_diagram(artifact.content())
                .await
                .map(|html| RenderOutcome::Markup { html }),
            (ViewMode::Preview, ArtifactKind::Html) => {
                return self.render_html(artifact).await;
            }
        };

        result.unwrap_or_else(|err| {
            tracing::warn!(id = %artifact.id(), error = %err, "renderer failed; showing source");
            RenderOutcome::RawFallback {
                source: artifact.content().to_string(),
                reason: err.to_string(),
            }
        })
    }

    async fn render_diagram(&self, source: &str) -> Result<String, RenderError> {
        match tokio::time::timeout(self.diagram_timeout, self.diagram.render(source)).await {
            Ok(result) => result,
            Err(_) => Err(RenderError::DiagramTimeout {
                timeout_ms: u64::try_from(self.diagram_timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    async fn render_html(&mut self, artifact: &Artifact) -> RenderOutcome {
        let document = prepare_document(artifact.content(), &self.allow_list);
        match self.sandbox.write(*artifact.hash(), &document.html).await {
            Ok(outcome) => {
                if let WriteOutcome::Written { attempts, recreated } = outcome {
                    tracing::debug!(
                        id = %artifact.id(),
                        attempts,
                        recreated,
                        blocked = document.blocked.len(),
                        "sandbox document written"
                    );
                }
                RenderOutcome::Sandboxed(outcome)
            }
            Err(err) => {
                let err = RenderError::from(err);
                tracing::warn!(id = %artifact.id(), error = %err, "sandbox render failed");
                RenderOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

/// Language hint when showing any kind as source
fn source_language(kind: &ArtifactKind) -> Option<&str> {
    match kind {
        ArtifactKind::Code { language } => language.as_deref(),
        ArtifactKind::Html => Some("html"),
        ArtifactKind::Markdown => Some("markdown"),
        ArtifactKind::Svg => Some("xml"),
        ArtifactKind::Diagram => Some("mermaid"),
    }
}

impl<S> std::fmt::Debug for RendererDispatch<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererDispatch")
            .field("allow_list", &self.allow_list)
            .field("diagram_timeout", &self.diagram_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurfaceError;
    use chrono::Utc;
    use lumen_artifact::{ArtifactDraft, ArtifactId};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recording {
        ready: bool,
        writes: Vec<String>,
    }

    #[async_trait::async_trait]
    impl RenderSurface for Recording {
        async fn is_ready(&self) -> bool {
            self.ready
        }

        async fn write(&mut self, document: &str) -> Result<(), SurfaceError> {
            self.writes.push(document.to_string());
            Ok(())
        }

        async fn recreate(&mut self) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    struct SlowEngine;

    #[async_trait::async_trait]
    impl DiagramEngine for SlowEngine {
        async fn render(&self, _source: &str) -> Result<String, RenderError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("<svg/>".to_string())
        }
    }

    struct EchoEngine(Mutex<Vec<String>>);

    #[async_trait::async_trait]
    impl DiagramEngine for EchoEngine {
        async fn render(&self, source: &str) -> Result<String, RenderError> {
            self.0.lock().unwrap().push(source.to_string());
            Ok(format!("<svg>{source}</svg>"))
        }
    }

    fn artifact(kind: ArtifactKind, content: &str) -> Artifact {
        let id = ArtifactId::new("t").unwrap();
        Artifact::from_draft(ArtifactDraft::new(id, kind, content).closed(), Utc::now())
    }

    fn ready_dispatch() -> RendererDispatch<Recording> {
        RendererDispatch::new(Recording {
            ready: true,
            ..Recording::default()
        })
    }

    #[tokio::test]
    async fn markdown_preview_and_source() {
        let mut dispatch = ready_dispatch();
        let md = artifact(ArtifactKind::Markdown, "# Hi");

        let preview = dispatch.render(&md, ViewMode::Preview).await;
        assert!(matches!(preview, RenderOutcome::Markup { ref html } if html.contains("<h1>Hi</h1>")));

        let source = dispatch.render(&md, ViewMode::Source).await;
        assert_eq!(
            source,
            RenderOutcome::Markup {
                html: r##"<pre><code class="language-markdown"># Hi</code></pre>"##.to_string()
            }
        );
    }

    #[tokio::test]
    async fn code_has_no_preview() {
        let mut dispatch = ready_dispatch();
        let code = artifact(
            ArtifactKind::Code {
                language: Some("python".into()),
            },
            "print(1)",
        );
        let a = dispatch.render(&code, ViewMode::Preview).await;
        let b = dispatch.render(&code, ViewMode::Source).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn bad_svg_falls_back_to_source() {
        let mut dispatch = ready_dispatch();
        let svg = artifact(ArtifactKind::Svg, "<div>not svg</div>");
        let outcome = dispatch.render(&svg, ViewMode::Preview).await;
        assert!(matches!(outcome, RenderOutcome::RawFallback { ref source, .. } if source == "<div>not svg</div>"));
        assert!(outcome.is_degraded());
    }

    #[tokio::test]
    async fn active_svg_content_falls_back_to_source() {
        let mut dispatch = ready_dispatch();
        let source = r#"<svg onload="alert(1)"><a href="javascript:alert(2)"><image href="https://evil.example/a.png"/></a></svg>"#;
        let outcome = dispatch
            .render(&artifact(ArtifactKind::Svg, source), ViewMode::Preview)
            .await;
        assert!(matches!(outcome, RenderOutcome::RawFallback { ref reason, .. } if reason.contains("event handler")));
    }

    #[tokio::test]
    async fn svg_uses_the_dispatch_allow_list() {
        let mut dispatch = ready_dispatch().with_allow_list(AllowList::deny_all().with_host("img.example"));
        let source = r#"<svg><image href="https://img.example/a.png"/><image href="https://cdnjs.cloudflare.com/b.png"/></svg>"#;
        let outcome = dispatch
            .render(&artifact(ArtifactKind::Svg, source), ViewMode::Preview)
            .await;
        assert_eq!(
            outcome,
            RenderOutcome::Markup {
                html: r#"<svg><image href="https://img.example/a.png"/><image href="about:blank"/></svg>"#.to_string()
            }
        );
    }

    #[tokio::test]
    async fn diagram_without_engine_falls_back() {
        let mut dispatch = ready_dispatch();
        let outcome = dispatch
            .render(&artifact(ArtifactKind::Diagram, "graph TD; A-->B"), ViewMode::Preview)
            .await;
        assert!(matches!(outcome, RenderOutcome::RawFallback { .. }));
    }

    #[tokio::test]
    async fn diagram_engine_output_is_used() {
        let engine = Arc::new(EchoEngine(Mutex::new(Vec::new())));
        let mut dispatch = ready_dispatch().with_diagram_engine(engine.clone());
        let outcome = dispatch
            .render(&artifact(ArtifactKind::Diagram, "A-->B"), ViewMode::Preview)
            .await;
        assert_eq!(
            outcome,
            RenderOutcome::Markup {
                html: "<svg>A-->B</svg>".to_string()
            }
        );
        assert_eq!(engine.0.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_diagram_times_out() {
        let mut dispatch = ready_dispatch()
            .with_diagram_engine(Arc::new(SlowEngine))
            .with_diagram_timeout(Duration::from_millis(50));
        let outcome = dispatch
            .render(&artifact(ArtifactKind::Diagram, "A-->B"), ViewMode::Preview)
            .await;
        assert!(matches!(outcome, RenderOutcome::RawFallback { ref reason, .. } if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn html_goes_through_allow_list_to_sandbox() {
        let mut dispatch = ready_dispatch();
        let page = artifact(
            ArtifactKind::Html,
            r#"<img src="https://tracker.example/p.gif"><p>ok</p>"#,
        );

        let outcome = dispatch.render(&page, ViewMode::Preview).await;
        assert_eq!(
            outcome,
            RenderOutcome::Sandboxed(WriteOutcome::Written {
                attempts: 1,
                recreated: false
            })
        );
        let written = &dispatch.sandbox().surface().writes[0];
        assert!(written.contains(r#"<img src="about:blank">"#));
        assert!(!written.contains("tracker.example"));

        let again = dispatch.render(&page, ViewMode::Preview).await;
        assert_eq!(again, RenderOutcome::Sandboxed(WriteOutcome::Skipped));

        dispatch.reset();
        let after_reset = dispatch.render(&page, ViewMode::Preview).await;
        assert!(matches!(after_reset, RenderOutcome::Sandboxed(WriteOutcome::Written { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn unmounted_sandbox_fails_without_panicking() {
        let mut dispatch = RendererDispatch::new(Recording::default())
            .with_retry_policy(RetryPolicy::default().with_attempts(2));
        let page = artifact(ArtifactKind::Html, "<p>x</p>");

        let outcome = dispatch.render(&page, ViewMode::Preview).await;
        assert!(matches!(outcome, RenderOutcome::Failed { ref reason } if reason.contains("2 attempts")));
        assert!(dispatch.sandbox().surface().writes.is_empty());
    }

    #[tokio::test]
    async fn html_source_mode_never_touches_sandbox() {
        let mut dispatch = ready_dispatch();
        let page = artifact(ArtifactKind::Html, "<p>x</p>");
        let outcome = dispatch.render(&page, ViewMode::Source).await;
        assert!(matches!(outcome, RenderOutcome::Markup { .. }));
        assert!(dispatch.sandbox().surface().writes.is_empty());
    }
}
