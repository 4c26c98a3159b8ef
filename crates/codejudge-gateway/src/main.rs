//! codejudge-gateway binary
//!
//! Serves the problem catalog and `POST /execute`. The worker address comes
//! from the `WORKER_*` environment variables.

use anyhow::Context;
use clap::Parser;
use codejudge_gateway::{
    default_server_config, shutdown_signal, GatewayServer, HttpWorkerClient, InMemoryCatalog,
    WorkerEndpoint,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Command line arguments for the submission gateway.
#[derive(Parser, Debug)]
#[command(name = "codejudge-gateway")]
#[command(about = "Serves coding problems and relays submissions to the execution worker")]
#[command(version)]
struct Args {
    /// Server bind address
    #[arg(short, long, env = "GATEWAY_BIND_ADDR", default_value = "0.0.0.0:8080")]
    bind_addr: SocketAddr,

    /// Problem catalog YAML file (defaults to the bundled catalog)
    #[arg(short, long, env = "GATEWAY_CATALOG")]
    catalog: Option<PathBuf>,

    /// Enable CORS
    #[arg(long, default_value = "true")]
    cors: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let catalog = match &args.catalog {
        Some(path) => InMemoryCatalog::from_path(path)
            .await
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => InMemoryCatalog::bundled().context("Bundled catalog is invalid")?,
    };
    let endpoint = WorkerEndpoint::from_env().context("Invalid worker endpoint")?;

    log::info!("Starting submission gateway...");
    log::info!("  Bind address: {}", args.bind_addr);
    log::info!("  Problems loaded: {}", catalog.len());
    log::info!("  Worker: {} (timeout {:?})", endpoint.url(), endpoint.timeout);

    let config = default_server_config()
        .with_bind_addr(args.bind_addr)
        .with_cors(args.cors);

    GatewayServer::with_config(
        Arc::new(catalog),
        Arc::new(HttpWorkerClient::new(endpoint)),
        config,
    )
    .serve_with_shutdown(shutdown_signal())
    .await?;

    Ok(())
}
