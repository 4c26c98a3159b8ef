//! Executor selection and limits, read from `JUDGE_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::{ConfigError, ExecutorError};
use crate::executors::docker::{DEFAULT_CACHE_VOLUME, DEFAULT_IMAGE};
use crate::executors::{CodeExecutor, DockerExecutor, ExecutionLimits, ProcessExecutor};

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CPU_SECS: u64 = 10;
const DEFAULT_DOCKER_MEMORY_MB: u64 = 512;
const DEFAULT_MAX_OUTPUT_KB: usize = 256;
const DEFAULT_DOCKER_CPUS: f64 = 1.0;
const DEFAULT_GOCACHE_DIR: &str = "codejudge-gocache";

/// Turns off the shared build cache when given as `JUDGE_GOCACHE` or
/// `JUDGE_DOCKER_CACHE_VOLUME`.
const DISABLED: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorKind {
    #[default]
    Process,
    Docker,
}

impl FromStr for ExecutorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "process" => Ok(ExecutorKind::Process),
            "docker" => Ok(ExecutorKind::Docker),
            other => Err(format!("expected 'process' or 'docker', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub kind: ExecutorKind,
    pub limits: ExecutionLimits,
    pub go_binary: String,
    pub docker_image: String,
    pub docker_cpus: f64,
    /// Named volume shared by all containers as their Go build cache.
    pub docker_cache_volume: Option<String>,
    /// Go build cache shared by all process runs.
    pub gocache: Option<PathBuf>,
    pub max_concurrent: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::Process,
            limits: ExecutionLimits {
                wall_time: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                cpu_seconds: DEFAULT_CPU_SECS,
                memory_bytes: None,
                max_output_bytes: DEFAULT_MAX_OUTPUT_KB * 1024,
            },
            go_binary: "go".to_string(),
            docker_image: DEFAULT_IMAGE.to_string(),
            docker_cpus: DEFAULT_DOCKER_CPUS,
            docker_cache_volume: Some(DEFAULT_CACHE_VOLUME.to_string()),
            gocache: Some(std::env::temp_dir().join(DEFAULT_GOCACHE_DIR)),
            max_concurrent: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                var,
                value,
                reason: e.to_string(),
            }),
    }
}

/// Reads an optional setting where `none` switches it off and unset keeps
/// the default.
fn optional_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: Option<T>,
) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(value) if value.trim().eq_ignore_ascii_case(DISABLED) => Ok(None),
        _ => Ok(parse_var::<T>(lookup, var)?.or(default)),
    }
}

fn megabytes(var: &'static str, mb: u64) -> Result<u64, ConfigError> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| ConfigError::InvalidValue {
            var,
            value: mb.to_string(),
            reason: "too large".to_string(),
        })
}

fn positive<T: PartialOrd + Default>(var: &'static str, value: Option<T>) -> Result<Option<T>, ConfigError>
where
    T: std::fmt::Display,
{
    match value {
        Some(v) if v <= T::default() => Err(ConfigError::InvalidValue {
            var,
            value: v.to_string(),
            reason: "must be greater than zero".to_string(),
        }),
        other => Ok(other),
    }
}

impl ExecutorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from any variable source; unset or blank
    /// variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(kind) = parse_var::<ExecutorKind>(&lookup, "JUDGE_EXECUTOR")? {
            config.kind = kind;
        }
        if let Some(secs) = positive("JUDGE_TIMEOUT_SECS", parse_var::<u64>(&lookup, "JUDGE_TIMEOUT_SECS")?)? {
            config.limits.wall_time = Duration::from_secs(secs);
        }
        if let Some(secs) = positive("JUDGE_CPU_SECS", parse_var::<u64>(&lookup, "JUDGE_CPU_SECS")?)? {
            config.limits.cpu_seconds = secs;
        }
        let memory_mb = positive("JUDGE_MEMORY_MB", parse_var::<u64>(&lookup, "JUDGE_MEMORY_MB")?)?;
        config.limits.memory_bytes = match (memory_mb, config.kind) {
            (Some(mb), _) => Some(megabytes("JUDGE_MEMORY_MB", mb)?),
            (None, ExecutorKind::Docker) => Some(DEFAULT_DOCKER_MEMORY_MB * 1024 * 1024),
            (None, ExecutorKind::Process) => None,
        };
        if let Some(kb) = positive(
            "JUDGE_MAX_OUTPUT_KB",
            parse_var::<usize>(&lookup, "JUDGE_MAX_OUTPUT_KB")?,
        )? {
            config.limits.max_output_bytes =
                kb.checked_mul(1024).ok_or_else(|| ConfigError::InvalidValue {
                    var: "JUDGE_MAX_OUTPUT_KB",
                    value: kb.to_string(),
                    reason: "too large".to_string(),
                })?;
        }
        if let Some(binary) = parse_var::<String>(&lookup, "JUDGE_GO_BINARY")? {
            config.go_binary = binary;
        }
        if let Some(image) = parse_var::<String>(&lookup, "JUDGE_DOCKER_IMAGE")? {
            config.docker_image = image;
        }
        if let Some(cpus) = positive("JUDGE_DOCKER_CPUS", parse_var::<f64>(&lookup, "JUDGE_DOCKER_CPUS")?)? {
            config.docker_cpus = cpus;
        }
        config.docker_cache_volume =
            optional_var(&lookup, "JUDGE_DOCKER_CACHE_VOLUME", config.docker_cache_volume)?;
        config.gocache = optional_var(&lookup, "JUDGE_GOCACHE", config.gocache)?;
        if let Some(n) = positive(
            "JUDGE_MAX_CONCURRENT",
            parse_var::<usize>(&lookup, "JUDGE_MAX_CONCURRENT")?,
        )? {
            config.max_concurrent = n;
        }

        Ok(config)
    }

    pub fn build_executor(&self) -> Result<Arc<dyn CodeExecutor>, ExecutorError> {
        match self.kind {
            ExecutorKind::Process => {
                let mut executor = ProcessExecutor::new(self.limits.clone())
                    .with_toolchain(self.go_binary.clone(), vec!["run".to_string()]);
                if let Some(dir) = &self.gocache {
                    executor = executor.with_gocache(dir.clone());
                }
                log::info!(
                    "Using process executor ({} run, timeout {:?}, build cache {})",
                    self.go_binary,
                    self.limits.wall_time,
                    self.gocache
                        .as_ref()
                        .map(|dir| dir.display().to_string())
                        .unwrap_or_else(|| "per run".to_string())
                );
                Ok(Arc::new(executor))
            }
            ExecutorKind::Docker => {
                let executor = DockerExecutor::new(self.docker_image.clone(), self.limits.clone())?
                    .with_cpus(self.docker_cpus)
                    .with_cache_volume(self.docker_cache_volume.clone());
                log::info!(
                    "Using docker executor ({}, timeout {:?}, {} CPU(s), build cache {})",
                    self.docker_image,
                    self.limits.wall_time,
                    self.docker_cpus,
                    self.docker_cache_volume.as_deref().unwrap_or("per container")
                );
                Ok(Arc::new(executor))
            }
        }
    }
}
