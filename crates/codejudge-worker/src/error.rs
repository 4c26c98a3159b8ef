//! Error types for the execution worker.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use codejudge_core::JudgeError;
use codejudge_types::ErrorBody;
use thiserror::Error;

/// Result type alias for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Error, Debug)]
pub enum WorkerError {
    /// Malformed `POST /process-code` body
    #[error("Invalid request body: {0}")]
    RequestDecoding(String),

    /// The submission could not be judged
    #[error(transparent)]
    Judge(#[from] JudgeError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            WorkerError::RequestDecoding(_) => 400,
            WorkerError::Judge(JudgeError::Format { .. })
            | WorkerError::Judge(JudgeError::InvalidFunctionName(_)) => 422,
            WorkerError::Judge(JudgeError::Execution(_))
            | WorkerError::Io(_)
            | WorkerError::Config(_)
            | WorkerError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            WorkerError::RequestDecoding(_) => "request_decoding",
            WorkerError::Judge(JudgeError::Format { .. })
            | WorkerError::Judge(JudgeError::InvalidFunctionName(_)) => "argument_format",
            WorkerError::Judge(JudgeError::Execution(_)) => "execution",
            WorkerError::Io(_) => "io_error",
            WorkerError::Config(_) => "config_error",
            WorkerError::Internal(_) => "internal_error",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let body = ErrorBody::new(self.error_type(), self.to_string());
        match self {
            WorkerError::Judge(e) => body.with_details(format!("failed at stage {}", e.stage())),
            _ => body,
        }
    }
}

impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            log::error!("{}", self);
        } else {
            log::warn!("{}", self);
        }
        (status, Json(self.to_body())).into_response()
    }
}
