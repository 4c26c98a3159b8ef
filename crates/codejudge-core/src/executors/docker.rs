use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::models::{ContainerCreateBody, HostConfig, ResourcesUlimits};
use bollard::query_parameters::{
    CreateContainerOptions as BollardCreateContainerOptionsQuery,
    CreateImageOptions as BollardCreateImageOptionsQuery,
    LogsOptions as BollardLogsOptionsQuery,
    RemoveContainerOptions as BollardRemoveContainerOptionsQuery,
    StartContainerOptions as BollardStartContainerOptionsQuery,
    StopContainerOptions as BollardStopContainerOptionsQuery,
    WaitContainerOptions as BollardWaitContainerOptionsQuery,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::workspace::HarnessWorkspace;
use super::{push_capped, CodeExecutor, ExecutionLimits, ExecutionOutcome, WARM_UP_TIMEOUT};
use crate::errors::ExecutorError;

pub const DEFAULT_IMAGE: &str = "golang:1.22-alpine";
pub const DEFAULT_CACHE_VOLUME: &str = "codejudge-gocache";

const CONTAINER_WORK_DIR: &str = "/src";
const CONTAINER_CACHE_DIR: &str = "/gocache";
const PIDS_LIMIT: i64 = 128;

/// Runs the harness inside a throwaway container with no network, a
/// read-only root filesystem and memory, CPU and pid ceilings.
///
/// With a cache volume, every container of this executor shares one Go build
/// cache, warmed by [`CodeExecutor::prepare`]. A submission can write to that
/// cache; pass `None` to [`DockerExecutor::with_cache_volume`] to give each
/// container its own cold cache on tmpfs instead.
pub struct DockerExecutor {
    docker: Docker,
    image: String,
    limits: ExecutionLimits,
    nano_cpus: i64,
    cache_volume: Option<String>,
}

impl DockerExecutor {
    pub fn new(image: impl Into<String>, limits: ExecutionLimits) -> Result<Self, ExecutorError> {
        let docker = Docker::connect_with_local_defaults()?;
        Ok(Self {
            docker,
            image: image.into(),
            limits,
            nano_cpus: 1_000_000_000,
            cache_volume: Some(DEFAULT_CACHE_VOLUME.to_string()),
        })
    }

    /// CPUs available to each container, fractions allowed.
    pub fn with_cpus(mut self, cpus: f64) -> Self {
        self.nano_cpus = (cpus * 1e9).round().max(1.0) as i64;
        self
    }

    /// Named volume holding the shared Go build cache, or `None` for a
    /// per-container cache.
    pub fn with_cache_volume(mut self, volume: Option<String>) -> Self {
        self.cache_volume = volume;
        self
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Base container for both harness runs and the cache warm-up.
    fn container_body(&self, cmd: Vec<String>, mut binds: Vec<String>) -> ContainerCreateBody {
        // Temp files and a cache without a volume need an exec-able writable mount.
        let tmpfs = HashMap::from([("/tmp".to_string(), "rw,exec,size=512m".to_string())]);
        let memory = self
            .limits
            .memory_bytes
            .map(|bytes| bytes.min(i64::MAX as u64) as i64);
        let gocache = match &self.cache_volume {
            Some(volume) => {
                binds.push(format!("{}:{}", volume, CONTAINER_CACHE_DIR));
                CONTAINER_CACHE_DIR
            }
            None => "/tmp/gocache",
        };

        ContainerCreateBody {
            image: Some(self.image.clone()),
            cmd: Some(cmd),
            env: Some(vec![
                "HOME=/tmp".to_string(),
                format!("GOCACHE={}", gocache),
                "GOPATH=/tmp/gopath".to_string(),
                "GOTOOLCHAIN=local".to_string(),
            ]),
            network_disabled: Some(true),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(HostConfig {
                binds: Some(binds),
                network_mode: Some("none".to_string()),
                memory,
                memory_swap: memory,
                nano_cpus: Some(self.nano_cpus),
                pids_limit: Some(PIDS_LIMIT),
                readonly_rootfs: Some(true),
                tmpfs: Some(tmpfs),
                auto_remove: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn container_config(&self, workspace: &HarnessWorkspace) -> Result<ContainerCreateBody, ExecutorError> {
        let host_dir = workspace.dir_str()?;
        let mut body = self.container_body(
            vec![
                "go".to_string(),
                "run".to_string(),
                workspace.file_name().to_string(),
            ],
            vec![format!("{}:{}:ro", host_dir, CONTAINER_WORK_DIR)],
        );
        body.working_dir = Some(CONTAINER_WORK_DIR.to_string());
        if let Some(host) = body.host_config.as_mut() {
            // Soft limit raises SIGXCPU, the hard one a second later SIGKILL.
            let cpu = self.limits.cpu_seconds.max(1).min(i64::MAX as u64 - 1) as i64;
            host.ulimits = Some(vec![
                ResourcesUlimits {
                    name: Some("cpu".to_string()),
                    soft: Some(cpu),
                    hard: Some(cpu + 1),
                },
                ResourcesUlimits {
                    name: Some("core".to_string()),
                    soft: Some(0),
                    hard: Some(0),
                },
            ]);
        }
        Ok(body)
    }

    fn warm_up_config(&self) -> ContainerCreateBody {
        let mut body = self.container_body(
            vec!["go".to_string(), "build".to_string(), "std".to_string()],
            Vec::new(),
        );
        body.working_dir = Some("/tmp".to_string());
        body
    }

    /// Pulls the image unless the daemon already has it.
    async fn ensure_image(&self) -> Result<(), ExecutorError> {
        if self.docker.inspect_image(&self.image).await.is_ok() {
            log::debug!("Image {} is already present", self.image);
            return Ok(());
        }

        log::info!("Pulling image {}...", self.image);
        let options = Some(BollardCreateImageOptionsQuery {
            from_image: Some(self.image.clone()),
            ..Default::default()
        });
        let mut pull_stream = self.docker.create_image(options, None, None);
        while let Some(info) = pull_stream.next().await {
            if let Some(status) = info?.status {
                log::debug!("Pulling image {}: {}", self.image, status);
            }
        }
        log::info!("Pulled image {}", self.image);
        Ok(())
    }

    async fn create(&self, config: ContainerCreateBody) -> Result<String, ExecutorError> {
        let options = || {
            Some(BollardCreateContainerOptionsQuery {
                name: Some(format!("codejudge-{}", Uuid::new_v4())),
                ..Default::default()
            })
        };
        match self.docker.create_container(options(), config.clone()).await {
            Ok(container) => Ok(container.id),
            // The image was removed since startup, or prepare never ran.
            Err(bollard::errors::Error::DockerResponseServerError { status_code: 404, .. }) => {
                self.ensure_image().await?;
                Ok(self.docker.create_container(options(), config).await?.id)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Builds the standard library into the shared cache volume.
    async fn warm_cache(&self) -> Result<(), ExecutorError> {
        let id = self.create(self.warm_up_config()).await?;
        let mut guard = ContainerGuard {
            docker: self.docker.clone(),
            id: Some(id.clone()),
        };
        log::info!("Warming Go build cache in container {}...", id);

        let started = Instant::now();
        let run = self.run_container(&id, WARM_UP_TIMEOUT).await;
        let logs = match &run {
            Ok((code, false)) if *code != Some(0) => self.collect_logs(&id).await.ok(),
            _ => None,
        };
        self.remove(&id).await;
        guard.id = None;

        match run? {
            (_, true) => Err(ExecutorError::WarmUp(format!(
                "go build std timed out after {:?}",
                WARM_UP_TIMEOUT
            ))),
            (Some(0), false) => {
                log::info!("Go build cache warmed in {:?}", started.elapsed());
                Ok(())
            }
            (code, false) => Err(ExecutorError::WarmUp(format!(
                "go build std exited with {:?}: {}",
                code,
                logs.map(|(transcript, _)| transcript).unwrap_or_default().trim()
            ))),
        }
    }

    async fn collect_logs(&self, id: &str) -> Result<(String, bool), ExecutorError> {
        let cap = self.limits.max_output_bytes;
        let mut output_stream = self.docker.logs(
            id,
            Some(BollardLogsOptionsQuery {
                stdout: true,
                stderr: true,
                ..Default::default()
            }),
        );

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut truncated = false;
        while let Some(log_result) = output_stream.next().await {
            match log_result? {
                LogOutput::StdOut { message } => push_capped(
                    &mut stdout,
                    &String::from_utf8_lossy(&message),
                    cap,
                    &mut truncated,
                ),
                LogOutput::StdErr { message } => push_capped(
                    &mut stderr,
                    &String::from_utf8_lossy(&message),
                    cap,
                    &mut truncated,
                ),
                _ => {}
            }
        }

        let mut transcript = String::with_capacity(stdout.len() + stderr.len());
        push_capped(&mut transcript, &stdout, cap, &mut truncated);
        push_capped(&mut transcript, &stderr, cap, &mut truncated);
        Ok((transcript, truncated))
    }

    async fn run_container(&self, id: &str, timeout: Duration) -> Result<(Option<i64>, bool), ExecutorError> {
        self.docker
            .start_container(id, None::<BollardStartContainerOptionsQuery>)
            .await?;

        let mut wait_stream = self
            .docker
            .wait_container(id, None::<BollardWaitContainerOptionsQuery>);
        let timeout_future = tokio::time::sleep(timeout);

        let wait_outcome = tokio::select! {
            res = wait_stream.next() => res,
            _ = timeout_future => {
                log::warn!("Execution timed out for container {}", id);
                let _ = self
                    .docker
                    .stop_container(id, Some(BollardStopContainerOptionsQuery { t: Some(0), ..Default::default() }))
                    .await;
                return Ok((None, true));
            }
        };

        match wait_outcome {
            Some(Ok(response)) => Ok((Some(response.status_code), false)),
            // bollard reports a non-zero exit as an error carrying the code.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                Ok((Some(code), false))
            }
            Some(Err(e)) => Err(ExecutorError::BollardError(e)),
            None => Err(ExecutorError::ContainerLost),
        }
    }

    async fn remove(&self, id: &str) {
        let options = BollardRemoveContainerOptionsQuery {
            force: true,
            ..Default::default()
        };
        if let Err(e) = self.docker.remove_container(id, Some(options)).await {
            log::warn!("Failed to remove container {}: {}", id, e);
        }
    }
}

#[async_trait]
impl CodeExecutor for DockerExecutor {
    async fn prepare(&self) -> Result<(), ExecutorError> {
        self.ensure_image().await?;
        if self.cache_volume.is_some() {
            self.warm_cache().await?;
        }
        Ok(())
    }

    async fn execute(&self, source: &str) -> Result<ExecutionOutcome, ExecutorError> {
        let workspace = HarnessWorkspace::create(source).await?;
        let id = self.create(self.container_config(&workspace)?).await?;
        log::debug!("Created container {} for {}", id, workspace.file_name());
        let mut guard = ContainerGuard {
            docker: self.docker.clone(),
            id: Some(id.clone()),
        };

        let started = Instant::now();
        let run = self.run_container(&id, self.limits.wall_time).await;
        let elapsed = started.elapsed();
        let logs = match &run {
            Ok(_) => self.collect_logs(&id).await,
            Err(_) => Ok((String::new(), false)),
        };
        self.remove(&id).await;
        guard.id = None;

        let (exit_code, timed_out) = run?;
        let (transcript, truncated) = logs?;
        let source_file = workspace.file_name().to_string();
        let cleanup_error = workspace.close();

        Ok(ExecutionOutcome {
            transcript,
            exit_code,
            timed_out,
            elapsed,
            truncated,
            source_file,
            cleanup_error,
        })
    }
}

/// Force-removes the container if the execution future is dropped midway.
struct ContainerGuard {
    docker: Docker,
    id: Option<String>,
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else { return };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let docker = self.docker.clone();
        handle.spawn(async move {
            let options = BollardRemoveContainerOptionsQuery {
                force: true,
                ..Default::default()
            };
            if let Err(e) = docker.remove_container(&id, Some(options)).await {
                log::warn!("Failed to remove abandoned container {}: {}", id, e);
            }
        });
    }
}
