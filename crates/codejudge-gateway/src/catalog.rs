//! Problem catalog
//!
//! The catalog is read-only metadata: problems and the examples a submission
//! is checked against. It is loaded once at startup from YAML and every
//! example is run through the argument formatter before the gateway accepts
//! traffic, so a bad fixture fails the boot instead of a user's submission.

use async_trait::async_trait;
use codejudge_core::{prepare_call, FormatError};
use codejudge_types::{Problem, ProblemExample, ProblemSummary};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;

/// Seed shipped with the gateway binary.
const BUNDLED_CATALOG: &str = include_str!("../../../catalog/problems.yaml");

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("unknown problem {0}")]
    UnknownProblem(String),

    #[error("catalog is unavailable: {0}")]
    Unavailable(String),

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("problem {problem_id}, example {example_id}: {source}")]
    InvalidExample {
        problem_id: i64,
        example_id: i64,
        #[source]
        source: FormatError,
    },

    #[error("invalid catalog: {0}")]
    Invalid(String),
}

/// Read access to problems and their examples.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn problems(&self) -> Result<Vec<Problem>, CatalogError>;

    async fn problem(&self, id: i64) -> Result<Problem, CatalogError>;

    async fn problem_names(&self) -> Result<Vec<ProblemSummary>, CatalogError>;

    /// Examples of a problem in their stored order.
    async fn examples_for(&self, problem_id: i64) -> Result<Vec<ProblemExample>, CatalogError>;
}

#[derive(Deserialize)]
struct ProblemSeed {
    #[serde(flatten)]
    problem: Problem,
    #[serde(default)]
    test_cases: Vec<SeedExample>,
}

#[derive(Deserialize)]
struct SeedExample {
    id: i64,
    input: String,
    input_order: String,
    expected_output: String,
}

struct CatalogEntry {
    problem: Problem,
    examples: Vec<ProblemExample>,
}

/// Catalog held in memory, keyed by problem id.
pub struct InMemoryCatalog {
    entries: BTreeMap<i64, CatalogEntry>,
}

impl std::fmt::Debug for InMemoryCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCatalog")
            .field("problems", &self.entries.len())
            .finish()
    }
}

impl InMemoryCatalog {
    /// The catalog bundled with the binary.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_yaml_str(BUNDLED_CATALOG)
    }

    pub async fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Read {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        let seeds: Vec<ProblemSeed> = serde_yaml::from_str(content)?;
        let mut entries = BTreeMap::new();
        let mut example_ids = HashSet::new();

        for seed in seeds {
            let problem = seed.problem;
            if problem.function_name.trim().is_empty() {
                return Err(CatalogError::Invalid(format!(
                    "problem {} has no function_name",
                    problem.id
                )));
            }

            let mut examples = Vec::with_capacity(seed.test_cases.len());
            for case in seed.test_cases {
                if !example_ids.insert(case.id) {
                    return Err(CatalogError::Invalid(format!(
                        "example id {} is used more than once",
                        case.id
                    )));
                }
                let example = ProblemExample {
                    id: case.id,
                    problem_id: Some(problem.id),
                    input: case.input,
                    input_order: case.input_order,
                    expected_output: case.expected_output,
                };
                prepare_call(&example).map_err(|source| CatalogError::InvalidExample {
                    problem_id: problem.id,
                    example_id: example.id,
                    source,
                })?;
                examples.push(example);
            }

            let id = problem.id;
            if entries
                .insert(id, CatalogEntry { problem, examples })
                .is_some()
            {
                return Err(CatalogError::Invalid(format!(
                    "problem id {} is used more than once",
                    id
                )));
            }
        }

        log::debug!(
            "Loaded catalog with {} problem(s) and {} example(s)",
            entries.len(),
            example_ids.len()
        );
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: i64) -> Result<&CatalogEntry, CatalogError> {
        self.entries
            .get(&id)
            .ok_or_else(|| CatalogError::UnknownProblem(id.to_string()))
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn problems(&self) -> Result<Vec<Problem>, CatalogError> {
        Ok(self.entries.values().map(|e| e.problem.clone()).collect())
    }

    async fn problem(&self, id: i64) -> Result<Problem, CatalogError> {
        Ok(self.entry(id)?.problem.clone())
    }

    async fn problem_names(&self) -> Result<Vec<ProblemSummary>, CatalogError> {
        Ok(self
            .entries
            .values()
            .map(|e| ProblemSummary::from(&e.problem))
            .collect())
    }

    async fn examples_for(&self, problem_id: i64) -> Result<Vec<ProblemExample>, CatalogError> {
        Ok(self.entry(problem_id)?.examples.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_PROBLEMS: &str = r#"
- id: 7
  name: Sum
  short_description: Add two integers
  long_description: Return a + b.
  problem_seed: "func Sum(a int, b int) int {\n}"
  function_name: Sum
  difficulty: Easy
  test_cases:
    - id: 1
      input: '{"a": 1, "b": 2}'
      input_order: '["a", "b"]'
      expected_output: '{"sum": 3}'
    - id: 2
      input: '{"a": 0, "b": 0}'
      input_order: '["a", "b"]'
      expected_output: '{"sum": 0}'
- id: 3
  name: Echo
  short_description: Return the input
  long_description: Return s.
  problem_seed: "func Echo(s string) string {\n}"
  function_name: Echo
  difficulty: Hard
"#;

    #[tokio::test]
    async fn test_loads_problems_in_id_order() {
        let catalog = InMemoryCatalog::from_yaml_str(TWO_PROBLEMS).unwrap();
        assert_eq!(catalog.len(), 2);

        let names = catalog.problem_names().await.unwrap();
        assert_eq!(
            names,
            vec![
                ProblemSummary { id: 3, name: "Echo".to_string() },
                ProblemSummary { id: 7, name: "Sum".to_string() },
            ]
        );

        let examples = catalog.examples_for(7).await.unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].id, 1);
        assert_eq!(examples[0].problem_id, Some(7));
        assert!(catalog.examples_for(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_problem() {
        let catalog = InMemoryCatalog::from_yaml_str(TWO_PROBLEMS).unwrap();
        assert!(matches!(
            catalog.problem(42).await,
            Err(CatalogError::UnknownProblem(id)) if id == "42"
        ));
        assert!(matches!(
            catalog.examples_for(42).await,
            Err(CatalogError::UnknownProblem(_))
        ));
    }

    #[test]
    fn test_rejects_example_that_cannot_be_formatted() {
        let yaml = TWO_PROBLEMS.replace(r#"'["a", "b"]'"#, r#"'["a", "c"]'"#);
        let err = InMemoryCatalog::from_yaml_str(&yaml).unwrap_err();
        match err {
            CatalogError::InvalidExample {
                problem_id,
                example_id,
                source,
            } => {
                assert_eq!(problem_id, 7);
                assert_eq!(example_id, 1);
                assert_eq!(source, FormatError::MissingKey("c".to_string()));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let yaml = TWO_PROBLEMS.replace("- id: 3\n", "- id: 7\n");
        assert!(matches!(
            InMemoryCatalog::from_yaml_str(&yaml),
            Err(CatalogError::Invalid(msg)) if msg.contains("problem id 7")
        ));

        let yaml = TWO_PROBLEMS.replace("    - id: 2\n", "    - id: 1\n");
        assert!(matches!(
            InMemoryCatalog::from_yaml_str(&yaml),
            Err(CatalogError::Invalid(msg)) if msg.contains("example id 1")
        ));
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        assert!(matches!(
            InMemoryCatalog::from_yaml_str("- id: [unclosed"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_bundled_catalog_is_valid() {
        let catalog = InMemoryCatalog::bundled().unwrap();
        assert!(!catalog.is_empty());
        for problem in catalog.problems().await.unwrap() {
            let examples = catalog.examples_for(problem.id).await.unwrap();
            assert!(!examples.is_empty(), "problem {} has no examples", problem.id);
        }
    }

    #[tokio::test]
    async fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("problems.yaml");
        std::fs::write(&path, TWO_PROBLEMS).unwrap();

        let catalog = InMemoryCatalog::from_path(&path).await.unwrap();
        assert_eq!(catalog.problem(7).await.unwrap().function_name, "Sum");

        let missing = InMemoryCatalog::from_path(dir.path().join("nope.yaml")).await;
        assert!(matches!(missing, Err(CatalogError::Read { .. })));
    }
}
