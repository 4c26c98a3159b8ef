//! Submission gateway HTTP service
//!
//! Serves the problem catalog and accepts submissions on `POST /execute`. A
//! submission only names its problem; the gateway looks the examples up in
//! the [`CatalogStore`], forwards code and examples to the execution worker
//! through a [`WorkerClient`] and turns the worker's report into a
//! [`Verdict`].

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;

pub use catalog::{CatalogError, CatalogStore, InMemoryCatalog};
pub use client::{HttpWorkerClient, WorkerClient, WorkerClientError};
pub use config::WorkerEndpoint;
pub use error::{GatewayError, Result};

pub use codejudge_http::{shutdown_signal, ServerConfig};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use codejudge_core::Stage;
use codejudge_types::{
    HealthResponse, Problem, ProblemSummary, SubmissionRequest, Verdict, WorkerRequest,
};
use std::sync::Arc;
use tokio::net::TcpListener;

pub const DEFAULT_PORT: u16 = 8080;
/// Submissions carry code only; the examples come from the catalog.
pub const DEFAULT_MAX_BODY_SIZE: usize = 256 * 1024;

/// Gateway defaults: port 8080 and a smaller body limit than the worker's.
pub fn default_server_config() -> ServerConfig {
    ServerConfig::on_port(DEFAULT_PORT).with_max_body_size(DEFAULT_MAX_BODY_SIZE)
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub worker: Arc<dyn WorkerClient>,
}

/// Catalog ids are integers; anything else cannot name a problem.
fn parse_problem_id(raw: &str) -> Result<i64> {
    raw.trim()
        .parse()
        .map_err(|_| CatalogError::UnknownProblem(raw.to_string()).into())
}

/// Reports `degraded` while the worker is unreachable.
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.worker.health_check().await {
        Ok(()) => "healthy",
        Err(e) => {
            log::warn!("Worker health check failed: {}", e);
            "degraded"
        }
    };
    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_problems_handler(State(state): State<AppState>) -> Result<Json<Vec<Problem>>> {
    Ok(Json(state.catalog.problems().await?))
}

async fn problem_names_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProblemSummary>>> {
    Ok(Json(state.catalog.problem_names().await?))
}

async fn problem_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Problem>> {
    let id = parse_problem_id(&id)?;
    Ok(Json(state.catalog.problem(id).await?))
}

/// Handler for the /execute POST endpoint.
async fn execute_handler(State(state): State<AppState>, body: Bytes) -> Result<Json<Verdict>> {
    let submission_id = uuid::Uuid::new_v4();
    let request: SubmissionRequest = serde_json::from_slice(&body)
        .map_err(|e| GatewayError::RequestDecoding(e.to_string()))?;
    log::debug!("[{}] {}", submission_id, Stage::Received);

    let problem_id = parse_problem_id(&request.problem_id)?;
    let problem = state.catalog.problem(problem_id).await?;
    let examples = state.catalog.examples_for(problem_id).await?;
    log::debug!(
        "[{}] {} -> {} ({} example(s) for problem {})",
        submission_id,
        Stage::Received,
        Stage::ExamplesFetched,
        examples.len(),
        problem_id
    );

    let function = if request.problem.trim().is_empty() {
        problem.function_name
    } else {
        request.problem
    };

    let worker_request = WorkerRequest::new(request.code, function, examples);
    let response = state.worker.process(&worker_request).await?;
    log::info!(
        "[{}] problem {}: {} ({}/{})",
        submission_id,
        problem_id,
        response.result,
        response.test_passed,
        response.test_count
    );

    Ok(Json(Verdict::from(response)))
}

pub struct GatewayServer {
    catalog: Arc<dyn CatalogStore>,
    worker: Arc<dyn WorkerClient>,
    config: ServerConfig,
}

impl GatewayServer {
    pub fn new(catalog: Arc<dyn CatalogStore>, worker: Arc<dyn WorkerClient>) -> Self {
        Self::with_config(catalog, worker, default_server_config())
    }

    pub fn with_config(
        catalog: Arc<dyn CatalogStore>,
        worker: Arc<dyn WorkerClient>,
        config: ServerConfig,
    ) -> Self {
        Self {
            catalog,
            worker,
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            catalog: self.catalog.clone(),
            worker: self.worker.clone(),
        };

        let router = Router::new()
            .route("/health", get(health_handler))
            .route("/problems", get(list_problems_handler))
            .route("/problems/names", get(problem_names_handler))
            .route("/problems/{id}", get(problem_handler))
            .route("/execute", post(execute_handler))
            .with_state(state);

        codejudge_http::apply_layers(router, &self.config)
    }

    /// Start the server, shutting down gracefully when `shutdown_signal` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            GatewayError::config_error(format!(
                "Failed to bind to {}: {}",
                self.config.bind_addr, e
            ))
        })?;
        self.serve_on_listener(listener, shutdown_signal).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on_listener<F>(self, listener: TcpListener, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let addr = listener.local_addr()?;
        log::info!("Execute endpoint: http://{}/execute", addr);
        log::info!("Catalog: http://{}/problems", addr);

        codejudge_http::serve(listener, router, shutdown_signal, "Submission gateway")
            .await
            .map_err(|e| GatewayError::internal(format!("Server error: {}", e)))
    }
}
