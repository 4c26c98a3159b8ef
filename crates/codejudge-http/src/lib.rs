//! HTTP plumbing shared by the worker and the gateway
//!
//! Both services are axum routers behind the same stack: a body limit,
//! request-id logging, `TraceLayer` and optional CORS, served until a
//! shutdown signal arrives. Each service adds only its routes and state.

use axum::body::Body;
use axum::extract::DefaultBodyLimit;
use axum::http::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use std::net::{AddrParseError, SocketAddr};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Configuration common to both servers.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            enable_cors: true,
            cors_origins: None,
            max_body_size: 1024 * 1024,
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, listening on every interface at `port`.
    pub fn on_port(port: u16) -> Self {
        Self::default().with_bind_addr(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self, AddrParseError> {
        self.bind_addr = addr.parse()?;
        Ok(self)
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Logs each request and its response under a fresh request id. `/health`
/// requests are logged at debug level.
pub async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let method = request.method().clone();
    let uri = request.uri().clone();

    if uri.path() == "/health" {
        log::debug!("Request {} {} {}", request_id, method, uri);
    } else {
        log::info!("Request {} {} {}", request_id, method, uri);
    }

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    log::info!(
        "Response {} {} in {:?}",
        request_id,
        response.status(),
        start.elapsed()
    );
    response
}

/// Permissive unless origins are listed. Unparsable origins fall back to
/// permissive with a warning.
pub fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };
    match origins.iter().map(|s| s.parse()).collect::<Result<Vec<_>, _>>() {
        Ok(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            log::warn!("Invalid CORS origin ({}), allowing any origin", e);
            CorsLayer::permissive()
        }
    }
}

/// Wraps a service's routes in the shared middleware stack.
pub fn apply_layers(router: Router, config: &ServerConfig) -> Router {
    let mut router = router.layer(DefaultBodyLimit::max(config.max_body_size));

    if config.enable_logging {
        router = router.layer(middleware::from_fn(log_requests));
    }

    router = router.layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router = router.layer(cors_layer(config.cors_origins.as_deref()));
    }

    router
}

/// Serves `router` on `listener` until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    router: Router,
    shutdown: F,
    service: &str,
) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    log::info!("{} listening on {}", service, listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    log::info!("{} shut down gracefully", service);
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
