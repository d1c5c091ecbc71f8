//! `examgate.toml` loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examgate_core::error::ConfigurationError;
use examgate_core::gate::{GateConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW_HOURS};
use examgate_core::grader::GraderConfig;
use examgate_runner::ExecutorConfig;
use examgate_store::StoreConfig;

/// Top-level examgate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamgateConfig {
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gate: GateSettings,
    #[serde(default)]
    pub grading: GradingSettings,
    /// Where exam reports are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExamgateConfig {
    fn default() -> Self {
        Self {
            executor: ExecutorConfig::default(),
            store: StoreConfig::default(),
            gate: GateSettings::default(),
            grading: GradingSettings::default(),
            output_dir: default_output_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_hours: default_window_hours(),
        }
    }
}

impl GateSettings {
    pub fn to_gate_config(&self) -> Result<GateConfig, ConfigurationError> {
        let window = chrono::Duration::try_hours(self.window_hours).ok_or_else(|| {
            ConfigurationError::InvalidSetting {
                name: "window_hours",
                message: format!("{} hours is out of range", self.window_hours),
            }
        })?;
        GateConfig::new(self.max_attempts, window)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingSettings {
    /// Overrides each question set's `visible_test_cases`.
    #[serde(default)]
    pub visible_test_cases: Option<usize>,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            visible_test_cases: None,
            parallelism: default_parallelism(),
        }
    }
}

impl GradingSettings {
    pub fn to_grader_config(&self) -> GraderConfig {
        GraderConfig {
            visible_test_cases: self.visible_test_cases,
            parallelism: self.parallelism,
        }
    }
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}
fn default_window_hours() -> i64 {
    DEFAULT_WINDOW_HOURS
}
fn default_parallelism() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./examgate-results")
}

/// Load config from an explicit path, or search the default locations.
///
/// Search order:
/// 1. `examgate.toml` in the current directory
/// 2. `~/.config/examgate/config.toml`
///
/// Environment variable override: `EXAMGATE_JUDGE_API_KEY`.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamgateConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examgate.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamgateConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamgateConfig::default(),
    };

    if let Ok(key) = std::env::var("EXAMGATE_JUDGE_API_KEY") {
        if let ExecutorConfig::Judge { api_key, .. } = &mut config.executor {
            *api_key = Some(key);
        }
    }

    anyhow::ensure!(
        config.grading.parallelism >= 1,
        "grading.parallelism must be at least 1"
    );

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examgate"))
}
