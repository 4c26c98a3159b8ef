//! Catalog records: problems and the examples used to check submissions.

use serde::{Deserialize, Deserializer, Serialize};

/// How hard a problem is rated in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A coding problem as served by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: i64,
    pub name: String,
    pub short_description: String,
    pub long_description: String,
    /// Starter code shown to the user.
    pub problem_seed: String,
    /// Human readable example text, for display only.
    #[serde(default)]
    pub examples: String,
    /// Name of the function a submission must define.
    pub function_name: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub attempts: u64,
    #[serde(default)]
    pub solves: u64,
}

/// Id and name of a problem, used for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSummary {
    pub id: i64,
    pub name: String,
}

impl From<&Problem> for ProblemSummary {
    fn from(problem: &Problem) -> Self {
        Self {
            id: problem.id,
            name: problem.name.clone(),
        }
    }
}

/// One input/expected-output fixture of a problem.
///
/// The three payload fields hold JSON text, which is the persisted shape:
/// `input` is an object of named arguments, `input_order` an array of those
/// names giving the positional call order, and `expected_output` a
/// single-key object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemExample {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_id: Option<i64>,
    pub input: String,
    pub input_order: String,
    pub expected_output: String,
}

impl ProblemExample {
    pub fn new(
        id: i64,
        input: impl Into<String>,
        input_order: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            id,
            problem_id: None,
            input: input.into(),
            input_order: input_order.into(),
            expected_output: expected_output.into(),
        }
    }
}

/// Accepts a problem id written either as a JSON integer or as a string of digits.
pub fn deserialize_problem_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Int(i64),
        Text(String),
    }

    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Int(id) => id.to_string(),
        IdRepr::Text(id) => id,
    })
}
