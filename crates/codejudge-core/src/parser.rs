//! Result Parser
//!
//! Reads a harness transcript back into counts and the detail of the first
//! failure. Only report lines for submitted example ids count, and for each id
//! the last report wins.

use codejudge_types::{FailureDetail, FailureKind, Outcome};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::executors::ExecutionOutcome;
use crate::formatter::PreparedCall;

static TEST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Test (-?\d+): (PASSED|FAILED), Output: (.*)$").expect("valid test line regex")
});

// Greedy prefix, so the capture starts after the last `:<line>:<col>: `.
static COMPILE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*:\d+:\d+: (.*)").expect("valid compile line regex"));

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTranscript {
    pub test_count: usize,
    pub test_passed: usize,
    pub result: Outcome,
    pub failure: Option<FailureDetail>,
}

struct Report<'a> {
    passed: bool,
    output: &'a str,
    /// Transcript position of the report that won.
    position: usize,
}

pub fn parse_transcript(outcome: &ExecutionOutcome, calls: &[PreparedCall]) -> ParsedTranscript {
    let lines: Vec<&str> = outcome
        .transcript
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .collect();

    let mut reports: HashMap<i64, Report<'_>> = HashMap::new();
    for (position, line) in lines.iter().enumerate() {
        let Some(caps) = TEST_LINE.captures(line) else {
            continue;
        };
        let Ok(id) = caps[1].parse::<i64>() else {
            continue;
        };
        if !calls.iter().any(|c| c.example_id == id) {
            continue;
        }
        let output = caps.get(3).map_or("", |m| m.as_str());
        reports.insert(
            id,
            Report {
                passed: &caps[2] == "PASSED",
                output,
                position,
            },
        );
    }

    let test_count = calls.len();
    let test_passed = calls
        .iter()
        .filter(|c| reports.get(&c.example_id).is_some_and(|r| r.passed))
        .count();

    let failure = compile_failure(&lines, &outcome.source_file)
        .or_else(|| timeout_failure(outcome))
        .or_else(|| wrong_answer(&reports, calls))
        .or_else(|| runtime_failure(&lines, outcome, &reports, calls));

    let result = if failure.is_some() {
        Outcome::Failed
    } else {
        Outcome::from_counts(test_passed, test_count)
    };

    ParsedTranscript {
        test_count,
        test_passed,
        result,
        failure,
    }
}

fn example_agnostic(kind: FailureKind, output: String) -> FailureDetail {
    FailureDetail {
        kind,
        test_id: None,
        input: String::new(),
        expected: String::new(),
        output,
    }
}

fn compile_failure(lines: &[&str], source_file: &str) -> Option<FailureDetail> {
    if source_file.is_empty() {
        return None;
    }
    lines
        .iter()
        .filter(|line| line.contains(source_file))
        .find_map(|line| COMPILE_LINE.captures(line))
        .map(|caps| example_agnostic(FailureKind::Compile, caps[1].trim().to_string()))
}

fn timeout_failure(outcome: &ExecutionOutcome) -> Option<FailureDetail> {
    outcome.timed_out.then(|| {
        example_agnostic(
            FailureKind::Timeout,
            format!("execution timed out after {}s", outcome.elapsed.as_secs()),
        )
    })
}

fn wrong_answer(reports: &HashMap<i64, Report<'_>>, calls: &[PreparedCall]) -> Option<FailureDetail> {
    let (id, report) = reports
        .iter()
        .filter(|(_, r)| !r.passed)
        .min_by_key(|(_, r)| r.position)?;
    let call = calls.iter().find(|c| c.example_id == *id)?;
    Some(FailureDetail {
        kind: FailureKind::WrongAnswer,
        test_id: Some(*id),
        input: call.input.clone(),
        expected: call.expected.clone(),
        output: report.output.to_string(),
    })
}

fn runtime_failure(
    lines: &[&str],
    outcome: &ExecutionOutcome,
    reports: &HashMap<i64, Report<'_>>,
    calls: &[PreparedCall],
) -> Option<FailureDetail> {
    if calls.iter().all(|c| reports.contains_key(&c.example_id)) {
        return None;
    }

    let message = lines
        .iter()
        .find(|l| l.starts_with("panic:") || l.starts_with("fatal error:"))
        .or_else(|| lines.iter().rev().find(|l| !l.trim().is_empty()))
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| match outcome.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "program was killed".to_string(),
        });
    Some(example_agnostic(FailureKind::Runtime, message))
}
