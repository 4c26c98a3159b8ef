//! Response bodies: the worker's report and the verdict returned to the user.

use serde::{Deserialize, Serialize};

/// Overall result of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Passed,
    Failed,
}

impl Outcome {
    /// `Passed` iff every test passed.
    pub fn from_counts(passed: usize, total: usize) -> Self {
        if passed == total {
            Outcome::Passed
        } else {
            Outcome::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the first surfaced failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The harness did not compile.
    Compile,
    /// A test produced a value different from the expected one.
    WrongAnswer,
    /// The program crashed before reporting.
    Runtime,
    /// The program was killed at the wall-clock limit.
    Timeout,
}

/// Detail for the first failure found in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetail {
    pub kind: FailureKind,
    /// Example id, only for `WrongAnswer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_id: Option<i64>,
    /// Raw JSON input of the failing example.
    #[serde(default)]
    pub input: String,
    /// Rendered expected value of the failing example.
    #[serde(default)]
    pub expected: String,
    /// Actual value, compiler message, crash line or timeout notice.
    pub output: String,
}

/// Body returned by the worker's `POST /process-code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerResponse {
    pub test_count: usize,
    pub test_passed: usize,
    /// Raw transcript of the harness run.
    pub output: String,
    pub result: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
}

/// Body returned by the gateway's `POST /execute`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub test_count: usize,
    pub test_passed: usize,
    pub output: String,
    pub input: String,
    pub expected: String,
    pub result: Outcome,
}

impl Verdict {
    pub fn passed(test_count: usize) -> Self {
        Self {
            test_count,
            test_passed: test_count,
            output: String::new(),
            input: String::new(),
            expected: String::new(),
            result: Outcome::Passed,
        }
    }
}

impl From<WorkerResponse> for Verdict {
    fn from(response: WorkerResponse) -> Self {
        let (output, input, expected) = match response.failure {
            Some(failure) => (failure.output, failure.input, failure.expected),
            None => (String::new(), String::new(), String::new()),
        };
        Self {
            test_count: response.test_count,
            test_passed: response.test_passed,
            output,
            input,
            expected,
            result: response.result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_counts() {
        assert_eq!(Outcome::from_counts(3, 3), Outcome::Passed);
        assert_eq!(Outcome::from_counts(2, 3), Outcome::Failed);
        assert_eq!(serde_json::to_string(&Outcome::Failed).unwrap(), "\"FAILED\"");
    }

    #[test]
    fn test_verdict_from_failed_worker_response() {
        let response = WorkerResponse {
            test_count: 1,
            test_passed: 0,
            output: "Test 1: FAILED, Output: -1\n".to_string(),
            result: Outcome::Failed,
            failure: Some(FailureDetail {
                kind: FailureKind::WrongAnswer,
                test_id: Some(1),
                input: r#"{"a":1,"b":2}"#.to_string(),
                expected: "3".to_string(),
                output: "-1".to_string(),
            }),
        };

        let verdict = Verdict::from(response);
        assert_eq!(verdict.output, "-1");
        assert_eq!(verdict.input, r#"{"a":1,"b":2}"#);
        assert_eq!(verdict.expected, "3");
        assert_eq!(verdict.result, Outcome::Failed);

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["testCount"], 1);
        assert_eq!(json["testPassed"], 0);
        assert_eq!(json["result"], "FAILED");
    }

    #[test]
    fn test_worker_response_without_failure_field() {
        let response: WorkerResponse = serde_json::from_str(
            r#"{"testCount":2,"testPassed":2,"output":"","result":"PASSED"}"#,
        )
        .unwrap();
        assert!(response.failure.is_none());
        assert_eq!(Verdict::from(response), Verdict::passed(2));
    }
}
