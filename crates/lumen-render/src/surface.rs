//! Render surfaces and the bounded-retry writer
//!
//! A surface (an iframe, a webview, a test double) may not be mounted when
//! content first arrives. [`SurfaceWriter`] polls readiness a fixed number of
//! times with a fixed delay, then tears the surface down and rebuilds it once
//! before giving up.

use crate::error::SurfaceError;
use lumen_artifact::ContentHash;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Something a prepared document can be written into
#[async_trait::async_trait]
pub trait RenderSurface: Send + Sync {
    /// Whether the surface is mounted and can accept a write
    async fn is_ready(&self) -> bool;

    /// Replace the surface's document
    async fn write(&mut self, document: &str) -> Result<(), SurfaceError>;

    /// Tear down and build a fresh surface
    async fn recreate(&mut self) -> Result<(), SurfaceError>;
}

/// Retry bounds for [`SurfaceWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts per write sequence
    pub attempts: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
    /// Rebuild the surface once after the first sequence is exhausted
    pub recreate_once: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_millis(100),
            recreate_once: true,
        }
    }
}

impl RetryPolicy {
    /// Set attempts per sequence (at least one)
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Set delay between attempts
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Enable or disable the single recreation
    #[must_use]
    pub fn with_recreate_once(mut self, recreate_once: bool) -> Self {
        self.recreate_once = recreate_once;
        self
    }
}

/// What a write call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "write")]
pub enum WriteOutcome {
    /// Document written
    Written {
        /// Attempts used in the sequence that succeeded
        attempts: u32,
        /// Surface had to be recreated first
        recreated: bool,
    },
    /// Same content as the last successful write
    Skipped,
}

/// Idempotent, bounded-retry writer over a [`RenderSurface`]
#[derive(Debug)]
pub struct SurfaceWriter<S> {
    surface: S,
    policy: RetryPolicy,
    last_written: Option<ContentHash>,
}

impl<S: RenderSurface> SurfaceWriter<S> {
    /// Create writer with default policy
    #[must_use]
    pub fn new(surface: S) -> Self {
        Self::with_policy(surface, RetryPolicy::default())
    }

    /// Create writer with custom policy
    #[must_use]
    pub fn with_policy(surface: S, policy: RetryPolicy) -> Self {
        Self {
            surface,
            policy,
            last_written: None,
        }
    }

    /// Retry policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Hash of the last successfully written content
    #[inline]
    #[must_use]
    pub fn last_written(&self) -> Option<&ContentHash> {
        self.last_written.as_ref()
    }

    /// Underlying surface
    #[inline]
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Consume writer, returning the surface
    #[must_use]
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Forget the last written hash so the next write always goes through
    pub fn reset(&mut self) {
        self.last_written = None;
    }

    /// Write `document`, identified by `hash`
    ///
    /// Skips when `hash` was the last successful write. Otherwise runs one
    /// sequence of up to `attempts` tries `delay` apart; if that fails and
    /// `recreate_once` is set, rebuilds the surface and runs one more
    /// sequence from a clean state.
    ///
    /// # Errors
    /// [`SurfaceError::Exhausted`] when every sequence failed, or
    /// [`SurfaceError::Recreate`] when the rebuild itself failed.
    pub async fn write(
        &mut self,
        hash: ContentHash,
        document: &str,
    ) -> Result<WriteOutcome, SurfaceError> {
        if self.last_written == Some(hash) {
            tracing::debug!(hash = %hash.short(), "sandbox content unchanged; write skipped");
            return Ok(WriteOutcome::Skipped);
        }

        match self.run_sequence(document).await {
            Ok(attempts) => {
                self.last_written = Some(hash);
                return Ok(WriteOutcome::Written {
                    attempts,
                    recreated: false,
                });
            }
            Err(err) if !self.policy.recreate_once => {
                tracing::error!(error = %err, "sandbox write failed");
                return Err(err);
            }
            Err(err) => {
                tracing::warn!(error = %err, "sandbox retries exhausted; recreating surface");
            }
        }

        self.last_written = None;
        self.surface.recreate().await?;

        match self.run_sequence(document).await {
            Ok(attempts) => {
                self.last_written = Some(hash);
                tracing::info!(hash = %hash.short(), attempts, "sandbox written after recreate");
                Ok(WriteOutcome::Written {
                    attempts,
                    recreated: true,
                })
            }
            Err(_) => {
                let err = SurfaceError::Exhausted {
                    attempts: self.policy.attempts,
                    recreated: true,
                };
                tracing::error!(error = %err, "sandbox unavailable");
                Err(err)
            }
        }
    }

    /// One bounded sequence; returns the attempt number that succeeded
    async fn run_sequence(&mut self, document: &str) -> Result<u32, SurfaceError> {
        let attempts = self.policy.attempts.max(1);
        for attempt in 1..=attempts {
            if self.surface.is_ready().await {
                match self.surface.write(document).await {
                    Ok(()) => return Ok(attempt),
                    Err(err) => tracing::debug!(attempt, error = %err, "sandbox write attempt failed"),
                }
            } else {
                tracing::debug!(attempt, "sandbox surface not ready");
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.delay).await;
            }
        }
        Err(SurfaceError::Exhausted {
            attempts,
            recreated: false,
        })
    }
}
