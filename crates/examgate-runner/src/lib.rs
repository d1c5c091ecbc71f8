//! Collaborators that run user answers.
//!
//! A Judge0-style remote code-execution client, the per-session embedded SQL
//! engine and a scripted executor for tests and offline grading.

pub mod config;
pub mod judge;
pub mod mock;
pub mod poll;
pub mod sql;

pub use config::{create_executor, ExecutorConfig};
pub use judge::{ExecutionOutcome, JudgeClient};
pub use mock::MockExecutor;
pub use poll::PollPolicy;
pub use sql::SqlSession;
