//! Configuration
//!
//! [`LumenConfig`] is loaded from TOML; any missing section or key keeps its
//! default.

use crate::error::LumenError;
use lumen_parser::ScannerConfig;
use lumen_render::{AllowList, RenderSurface, RendererDispatch, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LumenConfig {
    /// Tag recognition
    pub scanner: ScannerConfig,
    /// Sandbox mount retries
    pub sandbox: SandboxConfig,
    /// Sandbox resource allow-list
    pub allow_list: AllowList,
    /// Rendering and event plumbing
    pub render: RenderConfig,
}

/// Sandbox mount retry settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Attempts per write sequence
    pub attempts: u32,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Recreate the surface once after exhaustion
    pub recreate_once: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            attempts: policy.attempts,
            retry_delay_ms: 100,
            recreate_once: policy.recreate_once,
        }
    }
}

/// Rendering settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Bound on diagram rendering in milliseconds
    pub diagram_timeout_ms: u64,
    /// Capacity of the session event channel
    pub event_capacity: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            diagram_timeout_ms: 5_000,
            event_capacity: 64,
        }
    }
}

impl LumenConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// [`LumenError::Config`] on malformed TOML or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self, LumenError> {
        let config: Self =
            toml::from_str(text).map_err(|e| LumenError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// [`LumenError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LumenError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    ///
    /// # Errors
    /// [`LumenError::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<(), LumenError> {
        if self.sandbox.attempts == 0 {
            return Err(LumenError::config("sandbox.attempts must be at least 1"));
        }
        if self.scanner.tag_names.is_empty() {
            return Err(LumenError::config("scanner.tag_names must not be empty"));
        }
        if self.render.event_capacity == 0 {
            return Err(LumenError::config("render.event_capacity must be at least 1"));
        }
        Ok(())
    }

    /// With scanner tag names
    #[inline]
    #[must_use]
    pub fn with_tag_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scanner.tag_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// With sandbox retry settings
    #[inline]
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: SandboxConfig) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// With sandbox allow-list
    #[inline]
    #[must_use]
    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    /// With diagram timeout
    #[inline]
    #[must_use]
    pub fn with_diagram_timeout(mut self, timeout: Duration) -> Self {
        self.render.diagram_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Sandbox retry policy
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_attempts(self.sandbox.attempts)
            .with_delay(Duration::from_millis(self.sandbox.retry_delay_ms))
            .with_recreate_once(self.sandbox.recreate_once)
    }

    /// Diagram timeout
    #[inline]
    #[must_use]
    pub fn diagram_timeout(&self) -> Duration {
        Duration::from_millis(self.render.diagram_timeout_ms)
    }

    /// Build a dispatch with default adapters and these settings
    #[must_use]
    pub fn dispatch<S: RenderSurface>(&self, surface: S) -> RendererDispatch<S> {
        RendererDispatch::new(surface)
            .with_allow_list(self.allow_list.clone())
            .with_retry_policy(self.retry_policy())
            .with_diagram_timeout(self.diagram_timeout())
    }
}
