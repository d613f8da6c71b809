//! Render surface backed by a file on disk

use lumen_render::{RenderSurface, SurfaceError};
use std::path::{Path, PathBuf};

/// Writes sandbox documents to `path`
///
/// The surface counts as mounted once the parent directory exists;
/// recreating it creates the directory.
#[derive(Debug, Clone)]
pub(crate) struct FileSurface {
    path: PathBuf,
}

impl FileSurface {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn directory(&self) -> Option<&Path> {
        self.path.parent().filter(|dir| !dir.as_os_str().is_empty())
    }
}

#[async_trait::async_trait]
impl RenderSurface for FileSurface {
    async fn is_ready(&self) -> bool {
        match self.directory() {
            Some(dir) => tokio::fs::metadata(dir).await.is_ok_and(|meta| meta.is_dir()),
            None => true,
        }
    }

    async fn write(&mut self, document: &str) -> Result<(), SurfaceError> {
        tokio::fs::write(&self.path, document)
            .await
            .map_err(|err| SurfaceError::Write(format!("{}: {err}", self.path.display())))
    }

    async fn recreate(&mut self) -> Result<(), SurfaceError> {
        if let Some(dir) = self.directory() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|err| SurfaceError::Recreate(format!("{}: {err}", dir.display())))?;
            tracing::info!(dir = %dir.display(), "created output directory");
        }
        Ok(())
    }
}
