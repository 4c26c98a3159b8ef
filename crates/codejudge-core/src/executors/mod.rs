//! Sandboxed execution of generated harness programs.
//!
//! A [`CodeExecutor`] takes the harness source, persists it into a
//! request-exclusive [`HarnessWorkspace`], compiles and runs it under
//! resource limits and returns the captured transcript. A candidate's compile
//! or runtime failure is a normal [`ExecutionOutcome`]; only failures of the
//! sandbox itself surface as [`ExecutorError`].

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::ExecutorError;

pub mod docker;
pub mod process;
pub mod workspace;

pub use docker::DockerExecutor;
pub use process::ProcessExecutor;
pub use workspace::HarnessWorkspace;

/// Ceiling for building the standard library into a cold cache.
pub(crate) const WARM_UP_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything observed while running one harness.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionOutcome {
    /// Captured stdout followed by stderr.
    pub transcript: String,
    /// Exit status. `None` when the program was killed by a signal.
    pub exit_code: Option<i64>,
    /// The wall-clock limit was reached and the program was killed.
    pub timed_out: bool,
    /// Wall-clock time from start to exit or kill.
    pub elapsed: Duration,
    /// Output beyond the configured cap was discarded.
    pub truncated: bool,
    /// File name of the harness, as it appears in compiler diagnostics.
    pub source_file: String,
    /// Error raised while removing the workspace, if any.
    pub cleanup_error: Option<String>,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Resource ceilings applied to every execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionLimits {
    pub wall_time: Duration,
    pub cpu_seconds: u64,
    pub memory_bytes: Option<u64>,
    pub max_output_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            wall_time: Duration::from_secs(10),
            cpu_seconds: 10,
            memory_bytes: None,
            max_output_bytes: 256 * 1024,
        }
    }
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// One-time setup before the first submission, such as pulling an image
    /// or warming the build cache. Called once at service bootstrap.
    async fn prepare(&self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Compiles and runs `source` as a Go main package.
    async fn execute(&self, source: &str) -> Result<ExecutionOutcome, ExecutorError>;
}

/// Appends a bounded chunk of output to the transcript, marking truncation.
pub(crate) fn push_capped(out: &mut String, chunk: &str, cap: usize, truncated: &mut bool) {
    let room = cap.saturating_sub(out.len());
    if chunk.len() <= room {
        out.push_str(chunk);
        return;
    }
    let mut end = room;
    while end > 0 && !chunk.is_char_boundary(end) {
        end -= 1;
    }
    out.push_str(&chunk[..end]);
    *truncated = true;
}
