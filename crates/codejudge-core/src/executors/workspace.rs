use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::errors::ExecutorError;

/// Request-exclusive directory holding one harness source file.
///
/// Every invocation gets a fresh temporary directory and a uuid-named file, so
/// concurrent requests never share a path. [`HarnessWorkspace::close`] removes
/// the directory and reports the removal error; on any other exit path
/// (early return, panic, dropped future) `Drop` removes it silently.
pub struct HarnessWorkspace {
    dir: TempDir,
    file_name: String,
}

impl HarnessWorkspace {
    pub async fn create(source: &str) -> Result<Self, ExecutorError> {
        let dir = Builder::new()
            .prefix("codejudge-")
            .tempdir()
            .map_err(|e| ExecutorError::TempFileError(e.to_string()))?;
        let file_name = format!("harness_{}.go", Uuid::new_v4().simple());

        let mut file = fs::File::create(dir.path().join(&file_name)).await?;
        file.write_all(source.as_bytes()).await?;
        file.flush().await?;

        Ok(Self { dir, file_name })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn source_path(&self) -> PathBuf {
        self.dir.path().join(&self.file_name)
    }

    /// Host path as a string, for bind mounts.
    pub fn dir_str(&self) -> Result<&str, ExecutorError> {
        self.dir
            .path()
            .to_str()
            .ok_or_else(|| ExecutorError::TempFileError("Invalid temp path".to_string()))
    }

    /// Removes the workspace, returning the removal error as text.
    pub fn close(self) -> Option<String> {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => None,
            Err(e) => {
                log::warn!("Failed to remove workspace {}: {}", path.display(), e);
                Some(e.to_string())
            }
        }
    }
}
