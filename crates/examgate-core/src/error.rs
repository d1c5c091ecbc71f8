//! Error taxonomy for the gate, the grader and question loading.
//!
//! Runtime errors (`StorageError`, `ExecutionError`, `QueryError`) are
//! recoverable: the gate fails open and the grader turns them into zero-credit
//! results. `ConfigurationError` is raised while loading a question set and
//! must stop an exam from starting.

use thiserror::Error;

/// Attempt-history storage failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store could not be reached.
    #[error("attempt store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be decoded.
    #[error("corrupt attempt record at line {line}: {message}")]
    Corrupt { line: usize, message: String },

    /// An I/O error occurred while reading or writing the store.
    #[error("attempt store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while executing a user's program for one test case.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The execution service could not be reached or returned garbage.
    #[error("execution transport error: {0}")]
    Transport(String),

    /// The execution service rejected the request.
    #[error("execution service error (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// No terminal status was observed before the deadline.
    #[error("execution timed out after {0}ms")]
    TimedOut(u64),
}

impl ExecutionError {
    /// Returns `true` when the same request may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutionError::Transport(_) | ExecutionError::Rejected { status: 500..=599, .. }
        )
    }
}

/// Failures while running a SQL query against the exam session's engine.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query is malformed or failed while executing.
    #[error("query failed: {0}")]
    Execution(String),

    /// The engine itself could not be opened or seeded.
    #[error("query engine error: {0}")]
    Engine(String),
}

/// Malformed question definitions, detected before an exam starts.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The question-set file could not be parsed.
    #[error("invalid question set {source_name}: {message}")]
    Parse { source_name: String, message: String },

    /// A question is missing a field its kind requires.
    #[error("question '{question_id}' is missing required field '{field}'")]
    MissingField { question_id: String, field: &'static str },

    /// A field is present but holds an unusable value.
    #[error("question '{question_id}' has invalid {field}: {message}")]
    InvalidField {
        question_id: String,
        field: &'static str,
        message: String,
    },

    /// Two questions share the same id.
    #[error("duplicate question id: {0}")]
    DuplicateQuestion(String),

    /// Gate or grader settings are out of range.
    #[error("invalid setting {name}: {message}")]
    InvalidSetting { name: &'static str, message: String },
}
