//! Where the execution worker lives.

use std::time::Duration;

use crate::error::{GatewayError, Result};

pub const DEFAULT_WORKER_HOST: &str = "http://localhost";
pub const DEFAULT_WORKER_PORT: u16 = 8081;
pub const DEFAULT_WORKER_PATH: &str = "/process-code";
/// Round-trip budget for one submission. The worker may spend its whole
/// `JUDGE_TIMEOUT_SECS` (10s by default) running the harness after compiling
/// it and waiting for a free slot, so this must stay well above that limit or
/// slow but valid runs surface as `worker_timeout`.
pub const DEFAULT_WORKER_TIMEOUT_SECS: u64 = 30;

/// Address and round-trip budget of the execution worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEndpoint {
    /// Scheme and host, e.g. `http://worker`.
    pub host: String,
    pub port: u16,
    /// Path of the processing route, always starting with `/`.
    pub path: String,
    pub timeout: Duration,
}

impl Default for WorkerEndpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_WORKER_HOST.to_string(),
            port: DEFAULT_WORKER_PORT,
            path: DEFAULT_WORKER_PATH.to_string(),
            timeout: Duration::from_secs(DEFAULT_WORKER_TIMEOUT_SECS),
        }
    }
}

impl WorkerEndpoint {
    /// Reads `WORKER_HOST`, `WORKER_PORT`, `WORKER_PATH` and `WORKER_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut endpoint = Self::default();

        if let Some(host) = non_empty(lookup("WORKER_HOST")) {
            endpoint.host = if host.contains("://") {
                host.trim_end_matches('/').to_string()
            } else {
                format!("http://{}", host.trim_end_matches('/'))
            };
        }
        if let Some(port) = non_empty(lookup("WORKER_PORT")) {
            endpoint.port = port.parse().map_err(|e| {
                GatewayError::config_error(format!("WORKER_PORT={:?} is invalid: {}", port, e))
            })?;
        }
        if let Some(path) = non_empty(lookup("WORKER_PATH")) {
            endpoint.path = if path.starts_with('/') {
                path
            } else {
                format!("/{}", path)
            };
        }
        if let Some(secs) = non_empty(lookup("WORKER_TIMEOUT_SECS")) {
            let secs: u64 = secs.parse().map_err(|e| {
                GatewayError::config_error(format!(
                    "WORKER_TIMEOUT_SECS={:?} is invalid: {}",
                    secs, e
                ))
            })?;
            if secs == 0 {
                return Err(GatewayError::config_error(
                    "WORKER_TIMEOUT_SECS must be greater than zero",
                ));
            }
            endpoint.timeout = Duration::from_secs(secs);
        }

        Ok(endpoint)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<host>:<port><path>`
    pub fn url(&self) -> String {
        format!("{}:{}{}", self.host, self.port, self.path)
    }

    pub fn health_url(&self) -> String {
        format!("{}:{}/health", self.host, self.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
