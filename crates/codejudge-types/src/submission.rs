//! Request bodies: what a user submits and what the gateway forwards to the worker.

use serde::{Deserialize, Serialize};

use crate::catalog::{deserialize_problem_id, ProblemExample};

/// Body of `POST /execute` on the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    /// Candidate source text.
    pub code: String,
    /// Catalog id of the problem; the front end sends it as a string.
    #[serde(deserialize_with = "deserialize_problem_id")]
    pub problem_id: String,
    /// Name of the function under test. Empty means "use the catalog's".
    #[serde(default)]
    pub problem: String,
}

/// Body of `POST /process-code` on the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub code: String,
    /// Name of the function under test.
    pub problem: String,
    pub problem_examples: Vec<ProblemExample>,
}

impl WorkerRequest {
    pub fn new(
        code: impl Into<String>,
        problem: impl Into<String>,
        problem_examples: Vec<ProblemExample>,
    ) -> Self {
        Self {
            code: code.into(),
            problem: problem.into(),
            problem_examples,
        }
    }
}
