//! Judge0-style remote code execution client.
//!
//! A program is submitted once and then polled by token until the service
//! reports a terminal status. The whole exchange runs under the poll policy's
//! hard timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use examgate_core::error::ExecutionError;
use examgate_core::model::Language;
use examgate_core::traits::{CodeExecutor, RunOutput, RunRequest};

use crate::poll::PollPolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:2358";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const AUTH_HEADER: &str = "X-Auth-Token";

const STATUS_IN_QUEUE: u32 = 1;
const STATUS_PROCESSING: u32 = 2;
const STATUS_ACCEPTED: u32 = 3;

/// Judge0 language id for each supported language.
pub fn language_id(language: Language) -> u32 {
    match language {
        Language::Python => 71,
        Language::JavaScript => 63,
        Language::Java => 62,
        Language::Cpp => 54,
        Language::C => 50,
        Language::Rust => 73,
    }
}

/// Typed result of one remote execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// A terminal status was reached. Compile and runtime errors land here
    /// with their diagnostics in `stderr`.
    Completed { stdout: String, stderr: String },
    /// No terminal status before the poll budget or the hard timeout ran out.
    TimedOut,
    /// The service answered with an error status.
    Rejected { status: u16, message: String },
    /// The service could not be reached or sent an unreadable response.
    TransportError(String),
}

impl ExecutionOutcome {
    /// Convert into the executor result, reporting timeouts as `timeout`.
    pub fn into_result(self, timeout: Duration) -> Result<RunOutput, ExecutionError> {
        match self {
            ExecutionOutcome::Completed { stdout, stderr } => Ok(RunOutput { stdout, stderr }),
            ExecutionOutcome::TimedOut => Err(ExecutionError::TimedOut(timeout.as_millis() as u64)),
            ExecutionOutcome::Rejected { status, message } => {
                Err(ExecutionError::Rejected { status, message })
            }
            ExecutionOutcome::TransportError(message) => Err(ExecutionError::Transport(message)),
        }
    }
}

/// Client for a Judge0-compatible execution service.
pub struct JudgeClient {
    base_url: String,
    api_key: Option<String>,
    policy: PollPolicy,
    max_retries: u32,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct SubmissionRequest<'a> {
    source_code: &'a str,
    language_id: u32,
    stdin: &'a str,
}

#[derive(Deserialize)]
struct SubmissionCreated {
    token: String,
}

#[derive(Deserialize)]
struct SubmissionResult {
    status: JudgeStatus,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
}

#[derive(Deserialize)]
struct JudgeStatus {
    id: u32,
    #[serde(default)]
    description: String,
}

impl SubmissionResult {
    fn is_pending(&self) -> bool {
        matches!(self.status.id, STATUS_IN_QUEUE | STATUS_PROCESSING)
    }

    fn into_outcome(self) -> ExecutionOutcome {
        let mut stderr = self.stderr.unwrap_or_default();
        if let Some(compile) = self.compile_output.filter(|c| !c.is_empty()) {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str(&compile);
        }
        if self.status.id != STATUS_ACCEPTED && stderr.is_empty() {
            stderr = self.status.description;
        }
        ExecutionOutcome::Completed {
            stdout: self.stdout.unwrap_or_default(),
            stderr,
        }
    }
}

impl JudgeClient {
    pub fn new(base_url: &str, api_key: Option<String>, policy: PollPolicy) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ExecutionError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            policy,
            max_retries: 0,
            client,
        })
    }

    /// Resend retryable failures (transport errors, 5xx) up to `max_retries` times.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Submit once and poll until a terminal status, the poll budget or the
    /// hard timeout, whichever comes first.
    #[instrument(skip(self, request), fields(language = %request.language))]
    pub async fn execute(&self, request: &RunRequest) -> ExecutionOutcome {
        match tokio::time::timeout(self.policy.timeout, self.submit_and_poll(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!("no result within {:?}", self.policy.timeout);
                ExecutionOutcome::TimedOut
            }
        }
    }

    async fn submit_and_poll(&self, request: &RunRequest) -> ExecutionOutcome {
        let token = match self.submit(request).await {
            Ok(token) => token,
            Err(outcome) => return outcome,
        };

        for poll in 0..self.policy.max_polls {
            tokio::time::sleep(self.policy.delay_before(poll)).await;
            match self.fetch(&token).await {
                Ok(result) if result.is_pending() => {
                    tracing::debug!(poll, token = %token, "submission still pending");
                }
                Ok(result) => return result.into_outcome(),
                Err(outcome) => return outcome,
            }
        }

        tracing::warn!(token = %token, "poll budget of {} exhausted", self.policy.max_polls);
        ExecutionOutcome::TimedOut
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header(AUTH_HEADER, key),
            None => req,
        }
    }

    async fn submit(&self, request: &RunRequest) -> Result<String, ExecutionOutcome> {
        let body = SubmissionRequest {
            source_code: &request.source,
            language_id: language_id(request.language),
            stdin: &request.stdin,
        };

        let response = self
            .authorize(self.client.post(format!(
                "{}/submissions?base64_encoded=false&wait=false",
                self.base_url
            )))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let created: SubmissionCreated = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| {
                ExecutionOutcome::TransportError(format!("failed to parse submission response: {e}"))
            })?;
        Ok(created.token)
    }

    async fn fetch(&self, token: &str) -> Result<SubmissionResult, ExecutionOutcome> {
        let response = self
            .authorize(self.client.get(format!(
                "{}/submissions/{token}?base64_encoded=false",
                self.base_url
            )))
            .send()
            .await
            .map_err(transport_error)?;

        check_status(response).await?.json().await.map_err(|e| {
            ExecutionOutcome::TransportError(format!("failed to parse submission status: {e}"))
        })
    }
}

fn transport_error(e: reqwest::Error) -> ExecutionOutcome {
    ExecutionOutcome::TransportError(e.to_string())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ExecutionOutcome> {
    let status = response.status().as_u16();
    if status >= 400 {
        let message = response.text().await.unwrap_or_default();
        return Err(ExecutionOutcome::Rejected { status, message });
    }
    Ok(response)
}

#[async_trait]
impl CodeExecutor for JudgeClient {
    fn name(&self) -> &str {
        "judge"
    }

    async fn run_code(&self, request: &RunRequest) -> Result<RunOutput, ExecutionError> {
        let mut retries = 0;
        loop {
            match self.execute(request).await.into_result(self.policy.timeout) {
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    tracing::warn!(retry = retries, "retrying execution: {e}");
                }
                result => return result,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_policy() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(10), 5, Duration::from_secs(5)).unwrap()
    }

    fn request(stdin: &str) -> RunRequest {
        RunRequest {
            source: "print(sum(map(int, input().split())))".into(),
            language: Language::Python,
            stdin: stdin.into(),
        }
    }

    async fn mount_submit(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/submissions"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"token": "tok-1"})))
            .mount(server)
            .await;
    }

    fn status(id: u32, description: &str, stdout: Option<&str>) -> serde_json::Value {
        serde_json::json!({
            "status": {"id": id, "description": description},
            "stdout": stdout,
            "stderr": null,
            "compile_output": null
        })
    }

    #[tokio::test]
    async fn completed_submission() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submissions"))
            .and(header("X-Auth-Token", "secret"))
            .and(body_partial_json(serde_json::json!({"language_id": 71, "stdin": "1 2"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"token": "tok-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/submissions/tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(status(3, "Accepted", Some("3\n"))))
            .mount(&server)
            .await;

        let client = JudgeClient::new(&server.uri(), Some("secret".into()), fast_policy()).unwrap();
        let outcome = client.execute(&request("1 2")).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::Completed {
                stdout: "3\n".into(),
                stderr: String::new()
            }
        );
    }

    #[tokio::test]
    async fn pending_then_completed() {
        let server = MockServer::start().await;
        mount_submit(&server).await;

        Mock::given(method("GET"))
            .and(path("/submissions/tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(status(2, "Processing", None)))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/submissions/tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(status(3, "Accepted", Some("42"))))
            .mount(&server)
            .await;

        let client = JudgeClient::new(&server.uri(), None, fast_policy()).unwrap();
        let output = client.run_code(&request("")).await.unwrap();
        assert_eq!(output.stdout, "42");
    }

    #[tokio::test]
    async fn poll_budget_exhausted() {
        let server = MockServer::start().await;
        mount_submit(&server).await;

        Mock::given(method("GET"))
            .and(path("/submissions/tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(status(1, "In Queue", None)))
            .expect(5)
            .mount(&server)
            .await;

        let client = JudgeClient::new(&server.uri(), None, fast_policy()).unwrap();
        assert_eq!(client.execute(&request("")).await, ExecutionOutcome::TimedOut);
    }

    #[tokio::test]
    async fn hard_timeout_cuts_slow_service() {
        let server = MockServer::start().await;
        mount_submit(&server).await;

        Mock::given(method("GET"))
            .and(path("/submissions/tok-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(status(3, "Accepted", Some("late")))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let policy = PollPolicy::new(Duration::from_millis(10), 5, Duration::from_millis(100)).unwrap();
        let client = JudgeClient::new(&server.uri(), None, policy).unwrap();
        let err = client.run_code(&request("")).await.unwrap_err();
        assert!(matches!(err, ExecutionError::TimedOut(100)));
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        let client = JudgeClient::new("http://127.0.0.1:1", None, fast_policy()).unwrap();
        let outcome = client.execute(&request("")).await;
        assert!(matches!(outcome, ExecutionOutcome::TransportError(_)));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submissions"))
            .respond_with(ResponseTemplate::new(422).set_body_string("language_id is invalid"))
            .expect(1)
            .mount(&server)
            .await;

        let client = JudgeClient::new(&server.uri(), None, fast_policy())
            .unwrap()
            .with_retries(3);
        let err = client.run_code(&request("")).await.unwrap_err();
        assert!(matches!(err, ExecutionError::Rejected { status: 422, .. }));
        assert!(err.to_string().contains("language_id is invalid"));
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submissions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_submit(&server).await;
        Mock::given(method("GET"))
            .and(path("/submissions/tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(status(3, "Accepted", Some("ok"))))
            .mount(&server)
            .await;

        let client = JudgeClient::new(&server.uri(), None, fast_policy())
            .unwrap()
            .with_retries(1);
        let output = client.run_code(&request("")).await.unwrap();
        assert_eq!(output.stdout, "ok");
    }

    #[tokio::test]
    async fn compile_error_is_a_completed_run() {
        let server = MockServer::start().await;
        mount_submit(&server).await;

        Mock::given(method("GET"))
            .and(path("/submissions/tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": {"id": 6, "description": "Compilation Error"},
                "stdout": null,
                "stderr": null,
                "compile_output": "SyntaxError: invalid syntax"
            })))
            .mount(&server)
            .await;

        let client = JudgeClient::new(&server.uri(), None, fast_policy()).unwrap();
        let output = client.run_code(&request("")).await.unwrap();
        assert_eq!(output.stdout, "");
        assert!(output.stderr.contains("SyntaxError"));
    }

    #[test]
    fn language_ids() {
        assert_eq!(language_id(Language::Python), 71);
        assert_eq!(language_id(Language::Cpp), 54);
        assert_eq!(language_id(Language::Rust), 73);
    }
}
