use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::workspace::HarnessWorkspace;
use super::{push_capped, CodeExecutor, ExecutionLimits, ExecutionOutcome, WARM_UP_TIMEOUT};
use crate::errors::ExecutorError;

/// How long to wait for the output pipes to close once the process group is gone.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Runs the harness with the local Go toolchain as a child process.
///
/// The child starts a new session, so the toolchain and the compiled program
/// share one process group that is killed as a unit on timeout and when the
/// execution future is dropped. It cannot deny network access; use
/// [`super::DockerExecutor`] where that matters.
pub struct ProcessExecutor {
    program: String,
    args: Vec<String>,
    limits: ExecutionLimits,
    gocache: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self {
            program: "go".to_string(),
            args: vec!["run".to_string()],
            limits,
            gocache: None,
        }
    }

    /// Replaces the toolchain invocation. The harness file name is appended
    /// after `args`.
    pub fn with_toolchain(mut self, program: impl Into<String>, args: Vec<String>) -> Self {
        self.program = program.into();
        self.args = args;
        self
    }

    /// Shares a Go build cache across runs instead of one per workspace.
    /// [`CodeExecutor::prepare`] warms it with the standard library.
    pub fn with_gocache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.gocache = Some(dir.into());
        self
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    pub fn gocache(&self) -> Option<&std::path::Path> {
        self.gocache.as_deref()
    }

    /// Builds the standard library into the shared cache, so the first
    /// submissions do not pay for it under their wall-clock limit.
    async fn warm_cache(&self, gocache: &std::path::Path) -> Result<(), ExecutorError> {
        tokio::fs::create_dir_all(gocache).await?;
        let home = tempfile::tempdir()
            .map_err(|e| ExecutorError::TempFileError(e.to_string()))?;

        log::info!("Warming Go build cache at {}...", gocache.display());
        let started = Instant::now();
        let child = Command::new(&self.program)
            .args(["build", "std"])
            .current_dir(home.path())
            .env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .env("HOME", home.path())
            .env("GOCACHE", gocache)
            .env("GOPATH", home.path().join("gopath"))
            .env("GOTOOLCHAIN", "local")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let output = tokio::time::timeout(WARM_UP_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                ExecutorError::WarmUp(format!("build std timed out after {:?}", WARM_UP_TIMEOUT))
            })??;
        if !output.status.success() {
            return Err(ExecutorError::WarmUp(format!(
                "build std exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        log::info!("Go build cache warmed in {:?}", started.elapsed());
        Ok(())
    }

    fn command(&self, workspace: &HarnessWorkspace) -> Command {
        let home = workspace.dir();
        let gocache = self
            .gocache
            .clone()
            .unwrap_or_else(|| home.join(".gocache"));

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(workspace.file_name())
            .current_dir(home)
            .env_clear()
            .env("PATH", std::env::var_os("PATH").unwrap_or_default())
            .env("HOME", home)
            .env("GOCACHE", gocache)
            .env("GOPATH", home.join(".gopath"))
            .env("GOTOOLCHAIN", "local")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        {
            let cpu_seconds = self.limits.cpu_seconds;
            let memory_bytes = self.limits.memory_bytes;
            // SAFETY: only async-signal-safe libc calls run between fork and exec.
            unsafe {
                cmd.pre_exec(move || sandbox::enter(cpu_seconds, memory_bytes));
            }
        }

        cmd
    }
}

#[async_trait]
impl CodeExecutor for ProcessExecutor {
    async fn prepare(&self) -> Result<(), ExecutorError> {
        match &self.gocache {
            Some(dir) => self.warm_cache(dir).await,
            None => Ok(()),
        }
    }

    async fn execute(&self, source: &str) -> Result<ExecutionOutcome, ExecutorError> {
        let workspace = HarnessWorkspace::create(source).await?;
        let cap = self.limits.max_output_bytes;

        let started = Instant::now();
        let mut child = self
            .command(&workspace)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let mut group = ProcessGroup::new(child.id());
        log::debug!(
            "Spawned '{}' for {} (pid {:?})",
            self.program,
            workspace.file_name(),
            child.id()
        );

        let stdout = child.stdout.take().map(|s| tokio::spawn(read_capped(s, cap)));
        let stderr = child.stderr.take().map(|s| tokio::spawn(read_capped(s, cap)));

        let (exit_code, timed_out) =
            match tokio::time::timeout(self.limits.wall_time, child.wait()).await {
                Ok(status) => (status?.code().map(i64::from), false),
                Err(_) => {
                    log::warn!(
                        "Execution of {} timed out after {:?}",
                        workspace.file_name(),
                        self.limits.wall_time
                    );
                    group.kill();
                    let _ = child.kill().await;
                    (None, true)
                }
            };
        let elapsed = started.elapsed();
        // Strays the program left behind would keep the pipes open.
        group.kill();

        let (out, out_truncated) = collect(stdout).await;
        let (err, err_truncated) = collect(stderr).await;

        let mut truncated = out_truncated || err_truncated;
        let mut transcript = String::new();
        push_capped(&mut transcript, &String::from_utf8_lossy(&out), cap, &mut truncated);
        push_capped(&mut transcript, &String::from_utf8_lossy(&err), cap, &mut truncated);

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

/// Reads a stream to its end, keeping at most `cap` bytes. The excess is
/// drained and dropped so the writer never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, cap: usize) -> (Vec<u8>, bool) {
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let room = cap.saturating_sub(kept.len());
                if n > room {
                    truncated = true;
                }
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
            Err(e) => {
                log::debug!("Stopped reading child output: {}", e);
                break;
            }
        }
    }
    (kept, truncated)
}

async fn collect(task: Option<tokio::task::JoinHandle<(Vec<u8>, bool)>>) -> (Vec<u8>, bool) {
    let Some(mut task) = task else {
        return (Vec::new(), false);
    };
    match tokio::time::timeout(PIPE_DRAIN_GRACE, &mut task).await {
        Ok(Ok(read)) => read,
        Ok(Err(e)) => {
            log::warn!("Output reader task failed: {}", e);
            (Vec::new(), false)
        }
        Err(_) => {
            task.abort();
            (Vec::new(), true)
        }
    }
}

/// Process group of a spawned child, killed when dropped unless already gone.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn new(pid: Option<u32>) -> Self {
        Self { pgid: pid }
    }

    fn kill(&mut self) {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid.take() {
            // ESRCH just means the group already exited.
            unsafe {
                libc::kill(-(pgid as libc::pid_t), libc::SIGKILL);
            }
        }
        #[cfg(not(unix))]
        {
            self.pgid = None;
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.pgid.is_some() {
            log::debug!("Killing process group {:?} of a cancelled execution", self.pgid);
            self.kill();
        }
    }
}

#[cfg(unix)]
mod sandbox {
    use std::io;

    #[cfg(all(target_os = "linux", target_env = "gnu"))]
    type Resource = libc::__rlimit_resource_t;
    #[cfg(not(all(target_os = "linux", target_env = "gnu")))]
    type Resource = libc::c_int;

    fn set_limit(resource: Resource, soft: u64, hard: u64) -> io::Result<()> {
        let limit = libc::rlimit {
            rlim_cur: soft as libc::rlim_t,
            rlim_max: hard as libc::rlim_t,
        };
        if unsafe { libc::setrlimit(resource, &limit) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    /// Runs in the child between fork and exec.
    pub(super) fn enter(cpu_seconds: u64, memory_bytes: Option<u64>) -> io::Result<()> {
        if unsafe { libc::setsid() } == -1 {
            return Err(io::Error::last_os_error());
        }
        // Soft limit raises SIGXCPU, the hard one a second later SIGKILL.
        let cpu = cpu_seconds.max(1);
        set_limit(libc::RLIMIT_CPU, cpu, cpu + 1)?;
        set_limit(libc::RLIMIT_CORE, 0, 0)?;
        if let Some(bytes) = memory_bytes {
            set_limit(libc::RLIMIT_AS, bytes, bytes)?;
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Runs the "harness" as a shell script, so no Go toolchain is needed.
    fn shell(limits: ExecutionLimits) -> ProcessExecutor {
        ProcessExecutor::new(limits).with_toolchain("sh", vec![])
    }

    #[tokio::test]
    async fn test_captures_stdout_then_stderr() {
        let outcome = shell(ExecutionLimits::default())
            .execute("echo hello\necho oops 1>&2\n")
            .await
            .unwrap();
        assert_eq!(outcome.transcript, "hello\noops\n");
        assert_eq!(outcome.exit_code, Some(0));
        assert!(!outcome.timed_out);
        assert!(!outcome.truncated);
        assert!(outcome.source_file.starts_with("harness_"));
        assert!(outcome.cleanup_error.is_none());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_an_outcome() {
        let outcome = shell(ExecutionLimits::default())
            .execute("echo before\nexit 3\n")
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.transcript, "before\n");
    }

    #[tokio::test]
    async fn test_runs_inside_the_workspace_and_removes_it() {
        let outcome = shell(ExecutionLimits::default())
            .execute("pwd\nls\n")
            .await
            .unwrap();
        let mut lines = outcome.transcript.lines();
        let dir = std::path::PathBuf::from(lines.next().unwrap());
        assert!(lines.any(|l| l == outcome.source_file));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_wall_clock_timeout_kills_the_group() {
        let limits = ExecutionLimits {
            wall_time: Duration::from_millis(300),
            ..Default::default()
        };
        let started = Instant::now();
        let outcome = shell(limits)
            .execute("echo started\nsleep 30\necho finished\n")
            .await
            .unwrap();
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.transcript.contains("started"));
        assert!(!outcome.transcript.contains("finished"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let limits = ExecutionLimits {
            max_output_bytes: 1024,
            ..Default::default()
        };
        let script = "i=0\nwhile [ $i -lt 2000 ]; do echo 0123456789; i=$((i+1)); done\n";
        let outcome = shell(limits).execute(script).await.unwrap();
        assert!(outcome.truncated);
        assert!(outcome.transcript.len() <= 1024);
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[tokio::test]
    #[serial]
    async fn test_environment_is_cleared() {
        std::env::set_var("CODEJUDGE_TEST_SECRET", "leaked");
        let outcome = shell(ExecutionLimits::default())
            .execute("echo \"${CODEJUDGE_TEST_SECRET:-unset}\"\necho \"$GOCACHE\"\n")
            .await;
        std::env::remove_var("CODEJUDGE_TEST_SECRET");

        let outcome = outcome.unwrap();
        let mut lines = outcome.transcript.lines();
        assert_eq!(lines.next(), Some("unset"));
        assert!(lines.next().unwrap().ends_with(".gocache"));
    }

    #[tokio::test]
    async fn test_missing_toolchain_is_an_executor_error() {
        let executor = ProcessExecutor::new(ExecutionLimits::default())
            .with_toolchain("/nonexistent/codejudge-toolchain", vec![]);
        let err = executor.execute("x").await.unwrap_err();
        assert!(matches!(err, ExecutorError::Spawn { ref program, .. } if program.contains("nonexistent")));
    }

    #[tokio::test]
    async fn test_dropping_the_future_kills_the_child() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("marker");
        let script = format!("sleep 1\ntouch '{}'\n", marker.display());

        let executor = shell(ExecutionLimits::default());
        let dropped =
            tokio::time::timeout(Duration::from_millis(200), executor.execute(&script)).await;
        assert!(dropped.is_err());

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_prepare_without_a_shared_cache_is_a_no_op() {
        let executor = shell(ExecutionLimits::default());
        assert!(executor.gocache().is_none());
        executor.prepare().await.unwrap();
    }

    #[tokio::test]
    async fn test_prepare_creates_the_cache_and_reports_a_failed_warm_up() {
        let dir = tempfile::tempdir().unwrap();
        let gocache = dir.path().join("cache");
        // `sh build std` fails: there is no script named "build".
        let executor = shell(ExecutionLimits::default()).with_gocache(&gocache);

        let err = executor.prepare().await.unwrap_err();
        assert!(matches!(err, ExecutorError::WarmUp(_)), "{}", err);
        assert!(gocache.is_dir());
    }

    #[tokio::test]
    async fn test_shared_cache_is_passed_to_runs() {
        let dir = tempfile::tempdir().unwrap();
        let executor = shell(ExecutionLimits::default()).with_gocache(dir.path());
        let outcome = executor.execute("echo \"$GOCACHE\"\n").await.unwrap();
        assert_eq!(outcome.transcript.trim(), dir.path().to_string_lossy());
    }

    #[tokio::test]
    async fn test_concurrent_runs_use_distinct_files() {
        let executor = shell(ExecutionLimits::default());
        let (a, b) = tokio::join!(executor.execute("echo a\n"), executor.execute("echo b\n"));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.source_file, b.source_file);
        assert_eq!(a.transcript, "a\n");
        assert_eq!(b.transcript, "b\n");
    }
}
