//! Subcommand implementations
//!
//! Each command writes its primary output to `out`; diagnostics go through
//! tracing.

use crate::surface::FileSurface;
use anyhow::{bail, Context};
use lumen_core::{
    Artifact, ArtifactCard, ConversationSession, LumenConfig, RenderOutcome, SessionEvent,
    SessionHandle, ViewMode,
};
use lumen_render::prepare_document;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Read a transcript or HTML file
pub(crate) fn read_input(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    rewritten: &'a str,
    trailing_open: bool,
    artifacts: Vec<&'a Artifact>,
    cards: Vec<ArtifactCard>,
}

/// One-shot extraction of a complete transcript
pub(crate) fn scan(
    config: &LumenConfig,
    text: &str,
    json: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let mut session = ConversationSession::new(config);
    let update = session.ingest(text);

    if json {
        let report = ScanReport {
            rewritten: update.rewritten.as_str(),
            trailing_open: update.trailing_open,
            artifacts: session.registry().list().collect(),
            cards: session.cards(),
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "{}", update.rewritten.as_str())?;
    writeln!(out)?;
    for card in session.cards() {
        let marker = if card.active { '*' } else { ' ' };
        writeln!(out, "{marker} {:<24} {:<10} {}", card.id, card.label, card.title)?;
    }
    if update.trailing_open {
        writeln!(out, "  (artifact still streaming)")?;
    }
    Ok(())
}

/// Replay totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) struct ReplaySummary {
    pub(crate) snapshots: usize,
    pub(crate) persisted: usize,
}

/// Feed growing prefixes through a session task
///
/// Prints every session event as a JSON line, then the totals.
pub(crate) async fn replay(
    config: &LumenConfig,
    text: &str,
    chunk: usize,
    out: &mut impl Write,
) -> anyhow::Result<ReplaySummary> {
    let handle = SessionHandle::spawn(ConversationSession::new(config));
    let mut events = handle.subscribe();

    let mut snapshots = 0;
    for prefix in snapshots_of(text, chunk) {
        handle.ingest(prefix).await?;
        snapshots += 1;
        write_events(&mut events, out)?;
    }

    let persisted = handle.persistable().await?.len();
    handle.shutdown().await;

    let summary = ReplaySummary {
        snapshots,
        persisted,
    };
    serde_json::to_writer(&mut *out, &summary)?;
    writeln!(out)?;
    Ok(summary)
}

fn write_events(
    events: &mut broadcast::Receiver<SessionEvent>,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => {
                serde_json::to_writer(&mut *out, &event)?;
                writeln!(out)?;
            }
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event stream lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
        }
    }
}

/// Growing prefixes of `text`, `chunk` bytes apart, cut on char boundaries
fn snapshots_of(text: &str, chunk: usize) -> impl Iterator<Item = &str> {
    let chunk = chunk.max(1);
    let mut end = 0;
    std::iter::from_fn(move || {
        if end >= text.len() {
            return None;
        }
        end = (end + chunk).min(text.len());
        while !text.is_char_boundary(end) {
            end += 1;
        }
        Some(&text[..end])
    })
}

/// Prepare an HTML file for the sandbox; returns the blocked references
pub(crate) fn sanitize(
    config: &LumenConfig,
    html: &str,
    out: &mut impl Write,
) -> anyhow::Result<Vec<String>> {
    let document = prepare_document(html, &config.allow_list);
    for reference in &document.blocked {
        tracing::warn!(reference = %reference, "blocked reference");
    }
    out.write_all(document.html.as_bytes())?;
    Ok(document.blocked)
}

/// Render one artifact of a transcript
///
/// Markup goes to `out`; sandboxed HTML is written to `sandbox_path`.
pub(crate) async fn render(
    config: &LumenConfig,
    text: &str,
    id: Option<&str>,
    mode: ViewMode,
    sandbox_path: &Path,
    out: &mut impl Write,
) -> anyhow::Result<RenderOutcome> {
    let mut session = ConversationSession::new(config);
    session.ingest(text);
    if let Some(id) = id {
        if !session.select(id)? {
            bail!("no completed artifact with id `{id}`");
        }
    }
    let artifact = session
        .active()
        .cloned()
        .context("transcript contains no completed artifact")?;

    let mut dispatch = config.dispatch(FileSurface::new(sandbox_path));
    let outcome = dispatch.render(&artifact, mode).await;
    match &outcome {
        RenderOutcome::Markup { html } => writeln!(out, "{html}")?,
        RenderOutcome::Sandboxed(written) => {
            tracing::info!(outcome = ?written, "sandbox document ready");
            writeln!(out, "{}", sandbox_path.display())?;
        }
        RenderOutcome::RawFallback { source, reason } => {
            tracing::warn!(reason = %reason, "showing raw source");
            writeln!(out, "{source}")?;
        }
        RenderOutcome::Failed { reason } => bail!("render failed: {reason}"),
    }
    Ok(outcome)
}
