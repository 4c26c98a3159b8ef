//! codejudge-worker binary
//!
//! Serves `POST /process-code`. Executor choice and limits come from the
//! `JUDGE_*` environment variables.

use anyhow::Context;
use clap::Parser;
use codejudge_core::{ExecutorConfig, Judge};
use codejudge_worker::{shutdown_signal, ServerConfig, WorkerServer};
use std::net::SocketAddr;
use std::sync::Arc;

/// Command line arguments for the execution worker.
#[derive(Parser, Debug)]
#[command(name = "codejudge-worker")]
#[command(about = "Judges Go submissions against their examples")]
#[command(version)]
struct Args {
    /// Server bind address
    #[arg(short, long, env = "WORKER_BIND_ADDR", default_value = "0.0.0.0:8081")]
    bind_addr: SocketAddr,

    /// Enable CORS
    #[arg(long, default_value = "true")]
    cors: bool,

    /// Maximum request body size in bytes
    #[arg(long, default_value = "1048576")]
    max_body_size: usize,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    let executor_config =
        ExecutorConfig::from_env().context("Invalid executor configuration")?;
    let executor = executor_config
        .build_executor()
        .context("Failed to initialise the executor")?;
    log::info!("Preparing the Go toolchain...");
    executor
        .prepare()
        .await
        .context("Failed to prepare the executor")?;
    let judge = Arc::new(Judge::with_max_concurrent(
        executor,
        executor_config.max_concurrent,
    ));

    let config = ServerConfig::new()
        .with_bind_addr(args.bind_addr)
        .with_cors(args.cors)
        .with_max_body_size(args.max_body_size);

    log::info!("Starting execution worker...");
    log::info!("  Bind address: {}", args.bind_addr);
    log::info!("  Executor: {:?}", executor_config.kind);
    log::info!("  Wall-clock limit: {:?}", executor_config.limits.wall_time);
    log::info!("  Max concurrent runs: {}", executor_config.max_concurrent);

    WorkerServer::with_config(judge, config)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
