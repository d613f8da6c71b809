//! Testing utilities for the Lumen workspace
//!
//! Tag builders, streaming helpers and render fakes shared by integration
//! tests and the CLI's dry runs.

#![allow(missing_docs)]

use chrono::Utc;
use lumen_artifact::{Artifact, ArtifactDraft, ArtifactId, ArtifactKind};
use lumen_render::{DiagramEngine, RenderError, RenderSurface, SurfaceError};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Builder for artifact tag text
#[derive(Debug, Clone)]
pub struct TagBuilder {
    name: String,
    attributes: Vec<(String, String)>,
    body: String,
}

/// Start an `<artifact identifier="{id}">` tag
pub fn tag(id: &str) -> TagBuilder {
    TagBuilder::new("artifact").attr("identifier", id)
}

impl TagBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attributes: Vec::new(),
            body: String::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: &str) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn media_type(self, media_type: &str) -> Self {
        self.attr("type", media_type)
    }

    pub fn title(self, title: &str) -> Self {
        self.attr("title", title)
    }

    pub fn language(self, language: &str) -> Self {
        self.attr("language", language)
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    /// Opening tag and body, no closing tag
    pub fn open(&self) -> String {
        let mut out = format!("<{}", self.name);
        for (key, value) in &self.attributes {
            out.push_str(&format!(r#" {key}="{value}""#));
        }
        out.push('>');
        out.push_str(&self.body);
        out
    }

    /// Complete block
    pub fn build(&self) -> String {
        format!("{}</{}>", self.open(), self.name)
    }
}

/// Every prefix of `text` in steps of roughly `step` bytes, ending with `text`
///
/// Cuts are moved forward to the next char boundary.
pub fn growing_prefixes(text: &str, step: usize) -> impl Iterator<Item = &str> {
    let step = step.max(1);
    let mut end = 0;
    std::iter::from_fn(move || {
        if end >= text.len() {
            return None;
        }
        end = (end + step).min(text.len());
        while !text.is_char_boundary(end) {
            end += 1;
        }
        Some(&text[..end])
    })
}

/// A turn with prose, two closed artifacts and a trailing open one
pub fn sample_turn() -> String {
    format!(
        "Here is the page:\n{}\nAnd a chart:\n{}\nFinally some notes:\n{}",
        tag("page")
            .media_type("text/html")
            .title("Landing")
            .body(r#"<h1>Hello</h1><img src="https://evil.example/x.png">"#)
            .build(),
        tag("chart")
            .media_type("application/vnd.ant.mermaid")
            .body("graph TD; A-->B")
            .build(),
        tag("notes").media_type("text/markdown").body("# Notes").open(),
    )
}

/// Closed artifact with the given kind and content
pub fn artifact(id: &str, kind: ArtifactKind, content: &str) -> Artifact {
    let id = ArtifactId::new(id).unwrap();
    Artifact::from_draft(ArtifactDraft::new(id, kind, content).closed(), Utc::now())
}

/// Observable state of a [`FakeSurface`]
#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub polls: AtomicU32,
    pub recreations: AtomicU32,
    pub writes: Mutex<Vec<String>>,
}

impl SurfaceLog {
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn recreations(&self) -> u32 {
        self.recreations.load(Ordering::SeqCst)
    }
}

/// Scriptable [`RenderSurface`]
///
/// Reports not-ready for the first `ready_after` polls, and again after a
/// recreate for `ready_after_recreate` polls.
#[derive(Debug, Clone, Default)]
pub struct FakeSurface {
    ready_after: u32,
    ready_after_recreate: u32,
    failing_writes: Arc<AtomicU32>,
    since_mount: Arc<AtomicU32>,
    log: Arc<SurfaceLog>,
}

impl FakeSurface {
    /// Surface that is mounted immediately
    pub fn ready() -> Self {
        Self::default()
    }

    /// Surface that mounts after `polls` readiness checks
    pub fn mounting_after(polls: u32) -> Self {
        Self {
            ready_after: polls,
            ready_after_recreate: polls,
            ..Self::default()
        }
    }

    /// Surface that never mounts, even after recreation
    pub fn never_ready() -> Self {
        Self::mounting_after(u32::MAX)
    }

    /// Surface that only mounts after it has been recreated
    pub fn ready_after_recreate() -> Self {
        Self {
            ready_after: u32::MAX,
            ready_after_recreate: 0,
            ..Self::default()
        }
    }

    /// Fail the next `count` writes
    pub fn failing_writes(self, count: u32) -> Self {
        self.failing_writes.store(count, Ordering::SeqCst);
        self
    }

    /// Shared log, readable after the surface has been moved
    pub fn log(&self) -> Arc<SurfaceLog> {
        Arc::clone(&self.log)
    }
}

#[async_trait::async_trait]
impl RenderSurface for FakeSurface {
    async fn is_ready(&self) -> bool {
        self.log.polls.fetch_add(1, Ordering::SeqCst);
        let seen = self.since_mount.fetch_add(1, Ordering::SeqCst);
        seen >= self.ready_after
    }

    async fn write(&mut self, document: &str) -> Result<(), SurfaceError> {
        let pending = self.failing_writes.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_writes.store(pending - 1, Ordering::SeqCst);
            return Err(SurfaceError::Write("scripted failure".to_string()));
        }
        self.log.writes.lock().unwrap().push(document.to_string());
        Ok(())
    }

    async fn recreate(&mut self) -> Result<(), SurfaceError> {
        self.log.recreations.fetch_add(1, Ordering::SeqCst);
        self.since_mount.store(0, Ordering::SeqCst);
        self.ready_after = self.ready_after_recreate;
        Ok(())
    }
}

/// Behaviour of a [`FakeDiagramEngine`]
#[derive(Debug, Clone)]
pub enum DiagramBehaviour {
    /// Wrap the source in `<svg>`
    Succeed,
    /// Return this error message
    Fail(String),
    /// Sleep before succeeding
    Delay(Duration),
}

/// Scriptable [`DiagramEngine`] that counts calls
#[derive(Debug)]
pub struct FakeDiagramEngine {
    behaviour: DiagramBehaviour,
    calls: AtomicU32,
}

impl FakeDiagramEngine {
    pub fn new(behaviour: DiagramBehaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DiagramEngine for FakeDiagramEngine {
    async fn render(&self, source: &str) -> Result<String, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            DiagramBehaviour::Succeed => Ok(format!("<svg>{source}</svg>")),
            DiagramBehaviour::Fail(message) => Err(RenderError::Diagram(message.clone())),
            DiagramBehaviour::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(format!("<svg>{source}</svg>"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_output() {
        let text = tag("a").media_type("text/html").body("<b>hi</b>").build();
        assert_eq!(text, r#"<artifact identifier="a" type="text/html"><b>hi</b></artifact>"#);
    }

    #[test]
    fn prefixes_respect_char_boundaries() {
        let text = "aé€b";
        let prefixes: Vec<_> = growing_prefixes(text, 1).collect();
        assert_eq!(prefixes, vec!["a", "aé", "aé€", "aé€b"]);
    }

    #[test]
    fn last_prefix_is_whole_text() {
        let text = sample_turn();
        assert_eq!(growing_prefixes(&text, 7).last(), Some(text.as_str()));
    }
}
