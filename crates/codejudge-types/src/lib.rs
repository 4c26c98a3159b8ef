//! Shared contract between the submission gateway and the execution worker
//!
//! Both services speak JSON over HTTP. Keeping the catalog records, the
//! gateway/worker request and response bodies, and the error envelope in one
//! crate stops the two sides from drifting apart.
//!
//! ## Example
//!
//! ```rust
//! use codejudge_types::{Outcome, Verdict};
//!
//! let verdict = Verdict::passed(2);
//! assert_eq!(verdict.result, Outcome::Passed);
//! assert_eq!(serde_json::to_value(&verdict).unwrap()["testCount"], 2);
//! ```

pub mod catalog;
pub mod submission;
pub mod verdict;

pub use catalog::*;
pub use submission::*;
pub use verdict::*;

use serde::{Deserialize, Serialize};

/// JSON body returned with every non-2xx response from either service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human readable message.
    pub error: String,
    /// Stable machine readable error category (`catalog_lookup`, `argument_format`, ...).
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorBody {
    pub fn new(kind: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
            details: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Health check response served by both services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}
