//! Executor configuration and factory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examgate_core::traits::CodeExecutor;

use crate::judge::{JudgeClient, DEFAULT_BASE_URL};
use crate::mock::MockExecutor;
use crate::poll::PollPolicy;

/// Which code executor to grade coding answers with.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExecutorConfig {
    Judge {
        #[serde(default = "default_base_url")]
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_poll_interval_ms")]
        poll_interval_ms: u64,
        #[serde(default = "default_max_polls")]
        max_polls: u32,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
        #[serde(default)]
        max_retries: u32,
    },
    /// Offline fixtures only: the submitted source is ignored and stdout is
    /// looked up by stdin.
    Mock {
        /// stdin → stdout.
        #[serde(default)]
        outputs: HashMap<String, String>,
    },
}

impl std::fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorConfig::Judge {
                base_url,
                api_key,
                poll_interval_ms,
                max_polls,
                timeout_secs,
                max_retries,
            } => f
                .debug_struct("Judge")
                .field("base_url", base_url)
                .field("api_key", &api_key.as_ref().map(|_| "***"))
                .field("poll_interval_ms", poll_interval_ms)
                .field("max_polls", max_polls)
                .field("timeout_secs", timeout_secs)
                .field("max_retries", max_retries)
                .finish(),
            ExecutorConfig::Mock { outputs } => f
                .debug_struct("Mock")
                .field("outputs", &outputs.len())
                .finish(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_max_polls() -> u32 {
    20
}
fn default_timeout_secs() -> u64 {
    15
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig::Judge {
            base_url: default_base_url(),
            api_key: None,
            poll_interval_ms: default_poll_interval_ms(),
            max_polls: default_max_polls(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}

impl ExecutorConfig {
    /// Resolve `${VAR}` references in the judge URL and API key.
    pub fn resolved(&self) -> ExecutorConfig {
        match self {
            ExecutorConfig::Judge {
                base_url,
                api_key,
                poll_interval_ms,
                max_polls,
                timeout_secs,
                max_retries,
            } => ExecutorConfig::Judge {
                base_url: resolve_env_vars(base_url),
                api_key: api_key
                    .as_ref()
                    .map(|k| resolve_env_vars(k))
                    .filter(|k| !k.is_empty()),
                poll_interval_ms: *poll_interval_ms,
                max_polls: *max_polls,
                timeout_secs: *timeout_secs,
                max_retries: *max_retries,
            },
            ExecutorConfig::Mock { outputs } => ExecutorConfig::Mock {
                outputs: outputs.clone(),
            },
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are copied as-is and never rescanned.
pub fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Create an executor instance from its configuration.
pub fn create_executor(config: &ExecutorConfig) -> Result<Arc<dyn CodeExecutor>> {
    match config.resolved() {
        ExecutorConfig::Judge {
            base_url,
            api_key,
            poll_interval_ms,
            max_polls,
            timeout_secs,
            max_retries,
        } => {
            let policy = PollPolicy::new(
                Duration::from_millis(poll_interval_ms),
                max_polls,
                Duration::from_secs(timeout_secs),
            )
            .context("invalid judge poll settings")?;
            let client = JudgeClient::new(&base_url, api_key, policy)
                .context("failed to create judge client")?
                .with_retries(max_retries);
            tracing::debug!(%base_url, "using judge executor");
            Ok(Arc::new(client))
        }
        ExecutorConfig::Mock { outputs } => {
            tracing::warn!(
                scripted = outputs.len(),
                "using mock executor: submitted code is not run, outputs are scripted by stdin"
            );
            Ok(Arc::new(MockExecutor::new(outputs)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_EXAMGATE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_EXAMGATE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_EXAMGATE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_EXAMGATE_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_rescan_values() {
        std::env::set_var("_EXAMGATE_SELF_REF", "${_EXAMGATE_SELF_REF}");
        assert_eq!(
            resolve_env_vars("a-${_EXAMGATE_SELF_REF}-b"),
            "a-${_EXAMGATE_SELF_REF}-b"
        );
        std::env::remove_var("_EXAMGATE_SELF_REF");

        assert_eq!(resolve_env_vars("${_EXAMGATE_UNSET_X}${"), "${");
        assert_eq!(resolve_env_vars("no vars"), "no vars");
    }

    #[test]
    fn parse_judge_config() {
        let config: ExecutorConfig = toml::from_str(
            r#"
type = "judge"
base_url = "https://judge.example.com"
api_key = "${_EXAMGATE_UNSET_KEY}"
max_polls = 3
"#,
        )
        .unwrap();

        match config.resolved() {
            ExecutorConfig::Judge {
                base_url,
                api_key,
                max_polls,
                timeout_secs,
                ..
            } => {
                assert_eq!(base_url, "https://judge.example.com");
                assert_eq!(api_key, None);
                assert_eq!(max_polls, 3);
                assert_eq!(timeout_secs, 15);
            }
            other => panic!("expected judge config, got {other:?}"),
        }
    }

    #[test]
    fn debug_masks_api_key() {
        let config = ExecutorConfig::Judge {
            base_url: default_base_url(),
            api_key: Some("super-secret".into()),
            poll_interval_ms: 10,
            max_polls: 1,
            timeout_secs: 1,
            max_retries: 0,
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }

    #[tokio::test]
    async fn mock_executor_from_config() {
        let config: ExecutorConfig = toml::from_str(
            r#"
type = "mock"
[outputs]
"1 2" = "3"
"#,
        )
        .unwrap();
        let executor = create_executor(&config).unwrap();
        assert_eq!(executor.name(), "mock");

        let out = executor
            .run_code(&examgate_core::traits::RunRequest {
                source: String::new(),
                language: examgate_core::model::Language::Python,
                stdin: "1 2".into(),
            })
            .await
            .unwrap();
        assert_eq!(out.stdout, "3");
    }

    #[test]
    fn zero_polls_rejected() {
        let config = ExecutorConfig::Judge {
            base_url: default_base_url(),
            api_key: None,
            poll_interval_ms: 10,
            max_polls: 0,
            timeout_secs: 1,
            max_retries: 0,
        };
        let err = create_executor(&config).err().unwrap();
        assert!(format!("{err:#}").contains("max_polls"));
    }
}
