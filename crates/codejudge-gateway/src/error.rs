//! Error types for the submission gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use codejudge_types::ErrorBody;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::client::WorkerClientError;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed `POST /execute` body
    #[error("Invalid request body: {0}")]
    RequestDecoding(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Worker(#[from] WorkerClientError),

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

impl GatewayError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::RequestDecoding(_) => 400,
            GatewayError::Catalog(CatalogError::UnknownProblem(_)) => 404,
            GatewayError::Catalog(CatalogError::Unavailable(_)) => 503,
            GatewayError::Catalog(_) => 500,
            GatewayError::Worker(WorkerClientError::Timeout(_)) => 504,
            GatewayError::Worker(WorkerClientError::Rejected { .. }) => 422,
            GatewayError::Worker(WorkerClientError::Unavailable(_))
            | GatewayError::Worker(WorkerClientError::Failed(_)) => 502,
            GatewayError::Io(_) | GatewayError::Config(_) | GatewayError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::RequestDecoding(_) => "request_decoding",
            GatewayError::Catalog(CatalogError::UnknownProblem(_))
            | GatewayError::Catalog(CatalogError::Unavailable(_)) => "catalog_lookup",
            GatewayError::Catalog(_) => "catalog_error",
            GatewayError::Worker(WorkerClientError::Timeout(_)) => "worker_timeout",
            GatewayError::Worker(WorkerClientError::Unavailable(_)) => "worker_unavailable",
            GatewayError::Worker(WorkerClientError::Rejected { .. }) => "worker_rejected",
            GatewayError::Worker(WorkerClientError::Failed(_)) => "worker_failed",
            GatewayError::Io(_) => "io_error",
            GatewayError::Config(_) => "config_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let body = ErrorBody::new(self.error_type(), self.to_string());
        match self {
            GatewayError::Worker(WorkerClientError::Rejected {
                kind: Some(kind), ..
            }) => body.with_details(format!("worker error kind: {}", kind)),
            _ => body,
        }
    }
}

impl IntoResponse for GatewayError {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let unknown = GatewayError::from(CatalogError::UnknownProblem("9".to_string()));
        assert_eq!(unknown.status_code(), 404);
        assert_eq!(unknown.error_type(), "catalog_lookup");
        assert_eq!(unknown.to_body().error, "unknown problem 9");

        let timeout = GatewayError::from(WorkerClientError::Timeout("10s".to_string()));
        assert_eq!(timeout.status_code(), 504);
        assert_eq!(timeout.error_type(), "worker_timeout");

        let down = GatewayError::from(WorkerClientError::Unavailable("refused".to_string()));
        assert_eq!(down.status_code(), 502);

        let rejected = GatewayError::from(WorkerClientError::Rejected {
            status: 422,
            kind: Some("argument_format".to_string()),
            message: "missing key: b".to_string(),
        });
        assert_eq!(rejected.status_code(), 422);
        let body = rejected.to_body();
        assert_eq!(body.kind, "worker_rejected");
        assert!(body.error.contains("missing key: b"));
        assert_eq!(body.details.as_deref(), Some("worker error kind: argument_format"));

        assert_eq!(GatewayError::RequestDecoding("eof".into()).status_code(), 400);
    }
}
