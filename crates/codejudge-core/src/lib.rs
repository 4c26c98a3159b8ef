//! Submission-to-verdict pipeline for Go coding exercises
//!
//! A submission is a Go function plus a list of JSON examples. The pipeline
//! formats each example into a call, wraps the submission in a generated
//! harness program, runs it in a sandbox and reads the harness transcript back
//! into a verdict.
//!
//! ## Example
//!
//! ```rust,no_run
//! use codejudge_core::{ExecutorConfig, Judge};
//! use codejudge_types::{ProblemExample, WorkerRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExecutorConfig::from_env()?;
//! let judge = Judge::with_max_concurrent(config.build_executor()?, config.max_concurrent);
//!
//! let request = WorkerRequest::new(
//!     "func Sum(a, b int) int { return a + b }",
//!     "Sum",
//!     vec![ProblemExample::new(1, r#"{"a":1,"b":2}"#, r#"["a","b"]"#, r#"{"sum":3}"#)],
//! );
//! let response = judge.judge(&request).await?.into_response();
//! println!("{}: {}/{}", response.result, response.test_passed, response.test_count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod executors;
pub mod formatter;
pub mod harness;
pub mod parser;
pub mod pipeline;
pub mod value;

pub use config::{ExecutorConfig, ExecutorKind};
pub use errors::{ConfigError, ExecutorError, FormatError, JudgeError};
pub use executors::{CodeExecutor, ExecutionLimits, ExecutionOutcome};
pub use formatter::{prepare_call, PreparedCall};
pub use parser::{parse_transcript, ParsedTranscript};
pub use pipeline::{Judge, JudgeReport, Stage};
pub use value::ArgValue;
