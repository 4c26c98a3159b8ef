//! Execution worker HTTP service
//!
//! Accepts a submission together with its examples on `POST /process-code`,
//! runs it through the [`Judge`] and answers with the test counts, the raw
//! harness transcript and the detail of the first failure. The worker never
//! talks to the catalog; the gateway attaches the examples.

pub mod error;

pub use error::{Result, WorkerError};

pub use codejudge_http::{shutdown_signal, ServerConfig};

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use codejudge_core::Judge;
use codejudge_types::{HealthResponse, WorkerRequest, WorkerResponse};
use std::sync::Arc;
use tokio::net::TcpListener;

pub const DEFAULT_PORT: u16 = 8081;

#[derive(Clone)]
pub struct AppState {
    pub judge: Arc<Judge>,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handler for the /process-code POST endpoint.
async fn process_code_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WorkerResponse>> {
    let request: WorkerRequest = serde_json::from_slice(&body)
        .map_err(|e| WorkerError::RequestDecoding(e.to_string()))?;
    log::debug!(
        "Received submission for '{}' with {} example(s)",
        request.problem,
        request.problem_examples.len()
    );

    let report = state.judge.judge(&request).await?;
    Ok(Json(report.into_response()))
}

pub struct WorkerServer {
    judge: Arc<Judge>,
    config: ServerConfig,
}

impl WorkerServer {
    pub fn new(judge: Arc<Judge>) -> Self {
        Self {
            judge,
            config: ServerConfig::on_port(DEFAULT_PORT),
        }
    }

    pub fn with_config(judge: Arc<Judge>, config: ServerConfig) -> Self {
        Self { judge, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            judge: self.judge.clone(),
        };

        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/process-code", post(process_code_handler))
            .with_state(state);

        codejudge_http::apply_layers(router, &self.config)
    }

    async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            WorkerError::config_error(format!(
                "Failed to bind to {}: {}",
                self.config.bind_addr, e
            ))
        })
    }

    /// Start the server and listen for connections until it fails.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the server, shutting down gracefully when `shutdown_signal` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve_on_listener(listener, shutdown_signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on_listener<F>(self, listener: TcpListener, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let addr = listener.local_addr()?;
        log::info!("Process endpoint: http://{}/process-code", addr);
        log::info!("Health check: http://{}/health", addr);

        codejudge_http::serve(listener, router, shutdown_signal, "Execution worker")
            .await
            .map_err(|e| WorkerError::internal(format!("Server error: {}", e)))
    }
}
