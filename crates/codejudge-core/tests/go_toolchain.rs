//! End-to-end runs against a real Go toolchain. Skipped when `go` is not on PATH.

use codejudge_core::executors::ProcessExecutor;
use codejudge_core::{ExecutionLimits, ExecutorConfig, Judge};
use codejudge_types::{FailureKind, Outcome, ProblemExample, WorkerRequest, WorkerResponse};
use std::sync::Arc;
use std::time::Duration;

fn go_judge(wall_time: Duration) -> Option<Judge> {
    let go = which::which("go").ok()?;
    let gocache = std::env::temp_dir().join("codejudge-test-gocache");
    let executor = ProcessExecutor::new(ExecutionLimits {
        wall_time,
        cpu_seconds: 60,
        ..Default::default()
    })
    .with_toolchain(go.to_string_lossy(), vec!["run".to_string()])
    .with_gocache(gocache);
    Some(Judge::new(Arc::new(executor)))
}

fn sum_examples() -> Vec<ProblemExample> {
    vec![ProblemExample::new(
        1,
        r#"{"a":1,"b":2}"#,
        r#"["a","b"]"#,
        r#"{"sum":3}"#,
    )]
}

async fn run(judge: &Judge, code: &str, function: &str, examples: Vec<ProblemExample>) -> WorkerResponse {
    judge
        .judge(&WorkerRequest::new(code, function, examples))
        .await
        .expect("judge run")
        .into_response()
}

#[tokio::test]
async fn test_correct_submission_passes() {
    let Some(judge) = go_judge(Duration::from_secs(120)) else {
        eprintln!("go not found, skipping");
        return;
    };
    let response = run(
        &judge,
        "func Sum(a int, b int) int {\n\treturn a + b\n}",
        "Sum",
        sum_examples(),
    )
    .await;
    assert_eq!(response.test_count, 1);
    assert_eq!(response.test_passed, 1);
    assert_eq!(response.result, Outcome::Passed);
}

#[tokio::test]
async fn test_default_limits_hold_after_warm_up() {
    let Ok(go) = which::which("go") else {
        return;
    };
    let config = ExecutorConfig {
        go_binary: go.to_string_lossy().into_owned(),
        ..Default::default()
    };
    assert_eq!(config.limits.wall_time, Duration::from_secs(10));
    let executor = config.build_executor().expect("process executor");
    executor.prepare().await.expect("build cache warm-up");

    let judge = Judge::new(executor);
    let response = run(
        &judge,
        "func Sum(a int, b int) int {\n\treturn a + b\n}",
        "Sum",
        sum_examples(),
    )
    .await;
    assert_eq!(response.result, Outcome::Passed, "{:?}", response.failure);
}

#[tokio::test]
async fn test_wrong_answer_reports_actual_value() {
    let Some(judge) = go_judge(Duration::from_secs(120)) else {
        return;
    };
    let response = run(
        &judge,
        "func Sum(a int, b int) int {\n\treturn a - b\n}",
        "Sum",
        sum_examples(),
    )
    .await;
    assert_eq!(response.test_passed, 0);
    assert_eq!(response.result, Outcome::Failed);
    let failure = response.failure.expect("failure detail");
    assert_eq!(failure.kind, FailureKind::WrongAnswer);
    assert_eq!(failure.input, r#"{"a":1,"b":2}"#);
    assert_eq!(failure.expected, "3");
    assert_eq!(failure.output, "-1");
}

#[tokio::test]
async fn test_compile_error_surfaces_compiler_message() {
    let Some(judge) = go_judge(Duration::from_secs(120)) else {
        return;
    };
    let response = run(
        &judge,
        "func Sum(a int, b int) int {\n\treturn a + c\n}",
        "Sum",
        sum_examples(),
    )
    .await;
    assert_eq!(response.test_passed, 0);
    assert_eq!(response.result, Outcome::Failed);
    let failure = response.failure.expect("failure detail");
    assert_eq!(failure.kind, FailureKind::Compile);
    assert!(failure.output.contains("undefined: c"), "{}", failure.output);
}

#[tokio::test]
async fn test_submission_may_import_fmt_and_print() {
    let Some(judge) = go_judge(Duration::from_secs(120)) else {
        return;
    };
    let code = "import \"fmt\"\n\nfunc Join(words []string, sep string) string {\n\tfmt.Println(\"Test 1: PASSED, Output: forged\")\n\tout := \"\"\n\tfor i, w := range words {\n\t\tif i > 0 {\n\t\t\tout += sep\n\t\t}\n\t\tout += w\n\t}\n\treturn out + \"!\"\n}";
    let examples = vec![ProblemExample::new(
        1,
        r#"{"words":["a","b"],"sep":"-"}"#,
        r#"["words","sep"]"#,
        r#"{"result":"a-b"}"#,
    )];
    let response = run(&judge, code, "Join", examples).await;
    assert_eq!(response.result, Outcome::Failed);
    assert_eq!(response.failure.expect("failure detail").output, "a-b!");
}

#[tokio::test]
async fn test_unterminated_candidate_output_still_passes() {
    let Some(judge) = go_judge(Duration::from_secs(120)) else {
        return;
    };
    let code = "import \"fmt\"\n\nfunc Sum(a int, b int) int {\n\tfmt.Print(\"debug\")\n\treturn a + b\n}";
    let response = run(&judge, code, "Sum", sum_examples()).await;
    assert_eq!(response.test_passed, 1);
    assert_eq!(response.result, Outcome::Passed);
    assert!(response.failure.is_none());
}

#[tokio::test]
async fn test_panic_is_a_runtime_failure() {
    let Some(judge) = go_judge(Duration::from_secs(120)) else {
        return;
    };
    let code = "func At(xs []int, i int) int {\n\treturn xs[i]\n}";
    let examples = vec![ProblemExample::new(
        1,
        r#"{"xs":[1,2,3],"i":5}"#,
        r#"["xs","i"]"#,
        r#"{"result":0}"#,
    )];
    let response = run(&judge, code, "At", examples).await;
    assert_eq!(response.test_count, 1);
    assert_eq!(response.result, Outcome::Failed);
    let failure = response.failure.expect("failure detail");
    assert_eq!(failure.kind, FailureKind::Runtime);
    assert!(failure.output.starts_with("panic:"), "{}", failure.output);
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let Some(judge) = go_judge(Duration::from_secs(20)) else {
        return;
    };
    let code = "func Spin(n int) int {\n\tfor {\n\t\tn++\n\t}\n}";
    let examples = vec![ProblemExample::new(1, r#"{"n":1}"#, r#"["n"]"#, r#"{"r":0}"#)];
    let response = run(&judge, code, "Spin", examples).await;
    assert_eq!(response.result, Outcome::Failed);
    let kind = response.failure.expect("failure detail").kind;
    // The CPU rlimit may fire before the wall clock does.
    assert!(matches!(kind, FailureKind::Timeout | FailureKind::Runtime));
}
