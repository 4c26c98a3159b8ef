//! Error types for the submission-to-verdict pipeline
//!
//! Each stage owns its error enum. `FormatError` covers bad fixtures,
//! `ExecutorError` covers the sandbox infrastructure (never the candidate's own
//! compile or runtime failures, which are ordinary verdicts), and `JudgeError`
//! ties either one to the pipeline stage it aborted.

use thiserror::Error;

use crate::pipeline::Stage;

/// Failure to turn an example into call arguments or an expected literal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("invalid JSON in {field}: {message}")]
    InvalidJson { field: &'static str, message: String },
    #[error("missing key: {0}")]
    MissingKey(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("expected output has no value")]
    EmptyExpectedOutput,
    #[error("expected output must have exactly one key, found {}", .0.join(", "))]
    AmbiguousExpectedOutput(Vec<String>),
}

impl FormatError {
    pub(crate) fn invalid_json(field: &'static str, err: serde_json::Error) -> Self {
        FormatError::InvalidJson {
            field,
            message: err.to_string(),
        }
    }
}

/// Failure of the sandbox itself.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Bollard (Docker client) error: {0}")]
    BollardError(#[from] bollard::errors::Error),
    #[error("I/O error during execution: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Could not create temporary file/directory: {0}")]
    TempFileError(String),
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Container wait stream ended unexpectedly")]
    ContainerLost,
    #[error("Toolchain warm-up failed: {0}")]
    WarmUp(String),
    #[error("Executor pool is shut down")]
    Closed,
}

/// A pipeline run that ended in the `Error` state.
#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("'{0}' is not a valid Go function name")]
    InvalidFunctionName(String),
    #[error("failed to prepare test call for example ID {example_id}: {source}")]
    Format {
        example_id: i64,
        #[source]
        source: FormatError,
    },
    #[error("failed to execute harness: {0}")]
    Execution(#[from] ExecutorError),
}

impl JudgeError {
    /// Stage that was being attempted when the run failed.
    pub fn stage(&self) -> Stage {
        match self {
            JudgeError::InvalidFunctionName(_) | JudgeError::Format { .. } => {
                Stage::HarnessGenerated
            }
            JudgeError::Execution(_) => Stage::Executed,
        }
    }
}

/// Invalid executor configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{var}={value:?} is invalid: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}
