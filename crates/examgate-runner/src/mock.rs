//! Mock executor for testing and offline grading.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use examgate_core::error::ExecutionError;
use examgate_core::traits::{CodeExecutor, RunOutput, RunRequest};

/// A scripted executor that never runs code.
///
/// Returns the stdout registered for the request's stdin, regardless of the
/// submitted source. Unscripted inputs print nothing.
pub struct MockExecutor {
    /// Map of stdin → stdout.
    outputs: HashMap<String, String>,
    /// Inputs that fail with a transport error.
    failures: HashSet<String>,
    /// Number of calls made.
    call_count: AtomicU32,
    /// Last request received.
    last_request: Mutex<Option<RunRequest>>,
}

impl MockExecutor {
    /// Create a new mock executor with the given stdin→stdout mappings.
    pub fn new(outputs: HashMap<String, String>) -> Self {
        Self {
            outputs,
            failures: HashSet::new(),
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Make every run with this stdin fail.
    pub fn fail_on(mut self, stdin: impl Into<String>) -> Self {
        self.failures.insert(stdin.into());
        self
    }

    /// Get the number of calls made to this executor.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Get the last request made to this executor.
    pub fn last_request(&self) -> Option<RunRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl CodeExecutor for MockExecutor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run_code(&self, request: &RunRequest) -> Result<RunOutput, ExecutionError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        if self.failures.contains(&request.stdin) {
            return Err(ExecutionError::Transport(format!(
                "scripted failure for stdin {:?}",
                request.stdin
            )));
        }

        Ok(RunOutput {
            stdout: self.outputs.get(&request.stdin).cloned().unwrap_or_default(),
            stderr: String::new(),
        })
    }
}
