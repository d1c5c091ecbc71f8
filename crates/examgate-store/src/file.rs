//! Append-only JSON-lines attempt store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use examgate_core::error::StorageError;
use examgate_core::model::AttemptRecord;
use examgate_core::traits::AttemptStore;

/// Stores one [`AttemptRecord`] per line as JSON.
///
/// A missing file is an empty history. Any line that fails to decode makes
/// the whole history unreadable.
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<AttemptRecord>, StorageError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| StorageError::Corrupt {
                    line: i + 1,
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl AttemptStore for FileStore {
    async fn fetch_recent_attempts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, StorageError> {
        let mut recent: Vec<DateTime<Utc>> = self
            .read_all()
            .await?
            .into_iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.timestamp)
            .collect();
        recent.sort_unstable_by(|a, b| b.cmp(a));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn record_attempt(&self, record: &AttemptRecord) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| StorageError::Unavailable(format!("failed to encode attempt: {e}")))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!(user_id = %record.user_id, path = %self.path.display(), "recorded attempt");
        Ok(())
    }
}
