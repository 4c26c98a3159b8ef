//! The `Judge` facade: formatter, harness generator, executor and parser
//! composed into one submission-to-verdict run.

use codejudge_types::{WorkerRequest, WorkerResponse};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::errors::{ExecutorError, JudgeError};
use crate::executors::{CodeExecutor, ExecutionOutcome};
use crate::formatter::{prepare_call, PreparedCall};
use crate::harness::{generate_harness, render_check};
use crate::parser::{parse_transcript, ParsedTranscript};

static GO_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Lifecycle of one submission. Any stage may fall through to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    ExamplesFetched,
    HarnessGenerated,
    Executed,
    Parsed,
    Responded,
    Error,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "RECEIVED",
            Stage::ExamplesFetched => "EXAMPLES_FETCHED",
            Stage::HarnessGenerated => "HARNESS_GENERATED",
            Stage::Executed => "EXECUTED",
            Stage::Parsed => "PARSED",
            Stage::Responded => "RESPONDED",
            Stage::Error => "ERROR",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Responded | Stage::Error)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Records and logs the stages one request passes through.
#[derive(Debug, Clone)]
struct StageLog {
    request_id: Uuid,
    stages: Vec<Stage>,
}

impl StageLog {
    fn start(request_id: Uuid) -> Self {
        log::debug!("[{}] -> {}", request_id, Stage::Received);
        Self {
            request_id,
            stages: vec![Stage::Received],
        }
    }

    fn current(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::Received)
    }

    fn advance(&mut self, next: Stage) {
        log::debug!("[{}] {} -> {}", self.request_id, self.current(), next);
        self.stages.push(next);
    }

    fn fail(&mut self, err: JudgeError) -> JudgeError {
        log::debug!(
            "[{}] {} -> {} while reaching {}: {}",
            self.request_id,
            self.current(),
            Stage::Error,
            err.stage(),
            err
        );
        self.stages.push(Stage::Error);
        err
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct JudgeReport {
    pub request_id: Uuid,
    pub parsed: ParsedTranscript,
    pub execution: ExecutionOutcome,
    stages: StageLog,
}

impl JudgeReport {
    pub fn stages(&self) -> &[Stage] {
        &self.stages.stages
    }

    /// Builds the worker response, completing the run.
    pub fn into_response(mut self) -> WorkerResponse {
        self.stages.advance(Stage::Responded);
        WorkerResponse {
            test_count: self.parsed.test_count,
            test_passed: self.parsed.test_passed,
            output: self.execution.transcript,
            result: self.parsed.result,
            failure: self.parsed.failure,
        }
    }
}

/// Judges submissions with a shared executor, bounding concurrent runs.
pub struct Judge {
    executor: Arc<dyn CodeExecutor>,
    permits: Arc<Semaphore>,
}

impl Judge {
    pub fn new(executor: Arc<dyn CodeExecutor>) -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_max_concurrent(executor, parallelism)
    }

    pub fn with_max_concurrent(executor: Arc<dyn CodeExecutor>, max_concurrent: usize) -> Self {
        Self {
            executor,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub async fn judge(&self, request: &WorkerRequest) -> Result<JudgeReport, JudgeError> {
        let mut stages = StageLog::start(Uuid::new_v4());
        let request_id = stages.request_id;
        log::info!(
            "[{}] Judging '{}' against {} example(s)",
            request_id,
            request.problem,
            request.problem_examples.len()
        );
        stages.advance(Stage::ExamplesFetched);

        let function = request.problem.trim();
        if !GO_IDENTIFIER.is_match(function) {
            return Err(stages.fail(JudgeError::InvalidFunctionName(request.problem.clone())));
        }

        // Fail fast: one bad example aborts the whole submission.
        let mut calls: Vec<PreparedCall> = Vec::with_capacity(request.problem_examples.len());
        for example in &request.problem_examples {
            match prepare_call(example) {
                Ok(call) => calls.push(call),
                Err(source) => {
                    return Err(stages.fail(JudgeError::Format {
                        example_id: example.id,
                        source,
                    }))
                }
            }
        }
        let checks: Vec<String> = calls.iter().map(|c| render_check(function, c)).collect();
        let harness = generate_harness(&request.code, &checks);
        stages.advance(Stage::HarnessGenerated);

        let execution = {
            let _permit = match self.permits.acquire().await {
                Ok(permit) => permit,
                Err(_) => return Err(stages.fail(ExecutorError::Closed.into())),
            };
            match self.executor.execute(&harness).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(stages.fail(e.into())),
            }
        };
        if let Some(cleanup) = &execution.cleanup_error {
            log::warn!("[{}] Workspace cleanup failed: {}", request_id, cleanup);
        }
        stages.advance(Stage::Executed);

        let parsed = parse_transcript(&execution, &calls);
        stages.advance(Stage::Parsed);
        log::info!(
            "[{}] {} ({}/{} passed)",
            request_id,
            parsed.result,
            parsed.test_passed,
            parsed.test_count
        );

        Ok(JudgeReport {
            request_id,
            parsed,
            execution,
            stages,
        })
    }
}
