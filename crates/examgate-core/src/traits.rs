//! Collaborator traits consumed by the gate and the grader.
//!
//! Implemented by `examgate-store` (attempt history) and `examgate-runner`
//! (code execution and the embedded SQL engine).

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, QueryError, StorageError};
use crate::model::{AttemptRecord, Language};

// ---------------------------------------------------------------------------
// Attempt history
// ---------------------------------------------------------------------------

/// Read/append access to the timed-test attempt history.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Up to `limit` most recent attempt timestamps for `user_id`, newest first.
    async fn fetch_recent_attempts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, StorageError>;

    /// Append a record. Called by the exam flow after scoring, never by the gate.
    async fn record_attempt(&self, record: &AttemptRecord) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// Code execution
// ---------------------------------------------------------------------------

/// Executes user programs for coding questions.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Human-readable executor name (e.g. "judge").
    fn name(&self) -> &str;

    /// Run `request.source` once with `request.stdin`.
    async fn run_code(&self, request: &RunRequest) -> Result<RunOutput, ExecutionError>;
}

/// One program execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub source: String,
    pub language: Language,
    #[serde(default)]
    pub stdin: String,
}

/// Captured output of a finished execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
}

// ---------------------------------------------------------------------------
// SQL engine
// ---------------------------------------------------------------------------

/// Runs read queries against the exam session's seeded dataset.
pub trait QueryEngine: Send + Sync {
    fn run_query(&self, sql: &str) -> Result<QueryOutput, QueryError>;
}

/// A single cell of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Integer(i) => write!(f, "{i}"),
            SqlValue::Real(r) => write!(f, "{r}"),
            SqlValue::Text(s) => write!(f, "{s}"),
            SqlValue::Blob(bytes) => {
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

/// Tabular result of a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl QueryOutput {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sql_value_display() {
        assert_eq!(SqlValue::Integer(42).to_string(), "42");
        assert_eq!(SqlValue::Real(1.5).to_string(), "1.5");
        assert_eq!(SqlValue::from("abc").to_string(), "abc");
        assert_eq!(SqlValue::Blob(vec![0x0a, 0xff]).to_string(), "0aff");
    }
}
