//! Preview controller
//!
//! Renders whatever the session marks active. Rendering runs in its own task
//! and never blocks ingest; when the active artifact changes mid-render, the
//! in-flight render (including any pending sandbox retries) is dropped and
//! the latest value is rendered instead.

use crate::error::LumenError;
use lumen_artifact::{Artifact, ArtifactId, ContentHash};
use lumen_render::{RenderOutcome, RenderSurface, RendererDispatch, ViewMode};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Latest rendered state of the preview pane
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewState {
    /// Artifact shown, if any
    pub artifact: Option<ArtifactId>,
    /// Content hash that was rendered
    pub hash: Option<ContentHash>,
    /// Mode used for the render
    pub mode: ViewMode,
    /// Render result; `None` while nothing is active
    pub outcome: Option<RenderOutcome>,
}

#[derive(Debug, Clone, Copy)]
enum PreviewCommand {
    SetMode(ViewMode),
    Reset,
    Shutdown,
}

enum Step {
    Rendered(RenderOutcome),
    ActiveChanged,
    Command(Option<PreviewCommand>),
}

/// Handle to a running preview task
#[derive(Debug)]
pub struct PreviewHandle {
    commands: mpsc::Sender<PreviewCommand>,
    state: watch::Receiver<PreviewState>,
    task: JoinHandle<()>,
}

impl PreviewHandle {
    /// Switch between source and preview
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`] if the preview task has stopped.
    pub async fn set_mode(&self, mode: ViewMode) -> Result<(), LumenError> {
        self.send(PreviewCommand::SetMode(mode)).await
    }

    /// Abandon any in-flight render and clear the sandbox's last written hash
    ///
    /// # Errors
    /// [`LumenError::SessionClosed`] if the preview task has stopped.
    pub async fn reset(&self) -> Result<(), LumenError> {
        self.send(PreviewCommand::Reset).await
    }

    /// Receiver for rendered states
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<PreviewState> {
        self.state.clone()
    }

    /// Last published state
    #[must_use]
    pub fn current(&self) -> PreviewState {
        self.state.borrow().clone()
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.commands.send(PreviewCommand::Shutdown).await;
        if let Err(err) = self.task.await {
            tracing::error!(error = %err, "preview task panicked");
        }
    }

    async fn send(&self, command: PreviewCommand) -> Result<(), LumenError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| LumenError::SessionClosed)
    }
}

/// Render loop state
pub struct PreviewController<S> {
    dispatch: RendererDispatch<S>,
    active: watch::Receiver<Option<Artifact>>,
    commands: mpsc::Receiver<PreviewCommand>,
    state: watch::Sender<PreviewState>,
    mode: ViewMode,
}

impl<S: RenderSurface + 'static> PreviewController<S> {
    /// Spawn a preview task following `active`, starting on the source view
    #[must_use]
    pub fn spawn(
        dispatch: RendererDispatch<S>,
        active: watch::Receiver<Option<Artifact>>,
    ) -> PreviewHandle {
        Self::spawn_with_mode(dispatch, active, ViewMode::default())
    }

    /// Spawn a preview task in `mode`; the mode is kept across artifacts
    #[must_use]
    pub fn spawn_with_mode(
        dispatch: RendererDispatch<S>,
        active: watch::Receiver<Option<Artifact>>,
        mode: ViewMode,
    ) -> PreviewHandle {
        let (commands_tx, commands) = mpsc::channel(16);
        let (state, state_rx) = watch::channel(PreviewState {
            mode,
            ..PreviewState::default()
        });
        let controller = Self {
            dispatch,
            active,
            commands,
            state,
            mode,
        };
        let task = tokio::spawn(controller.run());
        PreviewHandle {
            commands: commands_tx,
            state: state_rx,
            task,
        }
    }

    async fn run(mut self) {
        let mut dirty = true;
        loop {
            let step = if dirty {
                dirty = false;
                let current = self.active.borrow_and_update().clone();
                match current {
                    Some(artifact) => match self.render_or_interrupt(&artifact).await {
                        Step::Rendered(outcome) => {
                            self.publish(Some(&artifact), Some(outcome));
                            continue;
                        }
                        interrupted => {
                            tracing::debug!(id = %artifact.id(), "abandoned in-flight render");
                            interrupted
                        }
                    },
                    None => {
                        self.publish(None, None);
                        continue;
                    }
                }
            } else {
                self.idle().await
            };

            match step {
                Step::Rendered(_) => {}
                Step::ActiveChanged => dirty = true,
                Step::Command(Some(PreviewCommand::SetMode(mode))) => {
                    self.mode = mode;
                    dirty = true;
                }
                Step::Command(Some(PreviewCommand::Reset)) => {
                    self.dispatch.reset();
                    dirty = true;
                }
                Step::Command(Some(PreviewCommand::Shutdown) | None) => break,
            }
        }
        tracing::debug!("preview task stopped");
    }

    /// Render `artifact` unless a newer value or a command arrives first
    async fn render_or_interrupt(&mut self, artifact: &Artifact) -> Step {
        let mode = self.mode;
        tokio::select! {
            biased;
            command = self.commands.recv() => Step::Command(command),
            changed = self.active.changed() => match changed {
                Ok(()) => Step::ActiveChanged,
                Err(_) => Step::Command(None),
            },
            outcome = self.dispatch.render(artifact, mode) => Step::Rendered(outcome),
        }
    }

    async fn idle(&mut self) -> Step {
        tokio::select! {
            command = self.commands.recv() => Step::Command(command),
            changed = self.active.changed() => match changed {
                Ok(()) => Step::ActiveChanged,
                Err(_) => Step::Command(None),
            },
        }
    }

    fn publish(&self, artifact: Option<&Artifact>, outcome: Option<RenderOutcome>) {
        self.state.send_replace(PreviewState {
            artifact: artifact.map(|a| a.id().clone()),
            hash: artifact.map(|a| *a.hash()),
            mode: self.mode,
            outcome,
        });
    }
}

impl<S> std::fmt::Debug for PreviewController<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewController")
            .field("dispatch", &self.dispatch)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
