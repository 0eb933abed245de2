//! Error taxonomy shared by the validator and the diff engine.
//!
//! Problems inside a workflow are never raised as Rust errors; they are
//! collected as coded issues in a report. [`RequestError`] is reserved for
//! requests that cannot be processed at all.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which family of check produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Structural,
    Schema,
    Pattern,
    Expression,
    Version,
    Batch,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Structural => write!(f, "Structural"),
            Category::Schema => write!(f, "Schema"),
            Category::Pattern => write!(f, "Pattern"),
            Category::Expression => write!(f, "Expression"),
            Category::Version => write!(f, "Version"),
            Category::Batch => write!(f, "Batch"),
        }
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;

/// A request that is rejected before any business logic runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Failed to parse {what} JSON: {message}")]
    MalformedJson { what: &'static str, message: String },

    #[error("Too many operations: {count} submitted, at most {max} allowed per request")]
    TooManyOperations { count: usize, max: usize },

    #[error("Operation {index} is malformed: {message}")]
    MalformedOperation { index: usize, message: String },

    #[error("Unknown validation profile '{0}' (expected minimal, runtime, ai-friendly or strict)")]
    UnknownProfile(String),

    #[error("Unknown validation mode '{0}' (expected minimal, operation or full)")]
    UnknownMode(String),
}

impl RequestError {
    pub fn json(what: &'static str, err: serde_json::Error) -> Self {
        RequestError::MalformedJson {
            what,
            message: err.to_string(),
        }
    }

    /// Stable code for programmatic handling.
    pub fn code(&self) -> &'static str {
        match self {
            RequestError::MalformedJson { .. } => "P001",
            RequestError::TooManyOperations { .. } => "B001",
            RequestError::MalformedOperation { .. } => "B002",
            RequestError::UnknownProfile(_) => "P002",
            RequestError::UnknownMode(_) => "P003",
        }
    }
}
