//! In-process attempt store.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use examgate_core::error::StorageError;
use examgate_core::model::AttemptRecord;
use examgate_core::traits::AttemptStore;

/// Keeps attempt history in memory. Lost when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    attempts: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts recorded for `user_id`.
    pub fn attempt_count(&self, user_id: &str) -> usize {
        self.attempts
            .lock()
            .map(|map| map.get(user_id).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Unavailable("memory store lock poisoned".into())
}

#[async_trait]
impl AttemptStore for MemoryStore {
    async fn fetch_recent_attempts(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<DateTime<Utc>>, StorageError> {
        let map = self.attempts.lock().map_err(poisoned)?;
        let mut recent = map.get(user_id).cloned().unwrap_or_default();
        recent.sort_unstable_by(|a, b| b.cmp(a));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn record_attempt(&self, record: &AttemptRecord) -> Result<(), StorageError> {
        let mut map = self.attempts.lock().map_err(poisoned)?;
        map.entry(record.user_id.clone())
            .or_default()
            .push(record.timestamp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn newest_first_and_truncated() {
        let store = MemoryStore::new();
        for hour in [3, 9, 1, 7, 5] {
            store
                .record_attempt(&AttemptRecord::new("u1", t(hour)))
                .await
                .unwrap();
        }

        let recent = store.fetch_recent_attempts("u1", 3).await.unwrap();
        assert_eq!(recent, vec![t(9), t(7), t(5)]);
        assert_eq!(store.attempt_count("u1"), 5);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let store = MemoryStore::new();
        store
            .record_attempt(&AttemptRecord::new("u1", t(1)))
            .await
            .unwrap();

        assert!(store.fetch_recent_attempts("u2", 5).await.unwrap().is_empty());
        assert_eq!(store.attempt_count("u2"), 0);
    }

    #[tokio::test]
    async fn duplicate_timestamps_are_kept() {
        let store = MemoryStore::new();
        let at = t(4);
        store.record_attempt(&AttemptRecord::new("u1", at)).await.unwrap();
        store.record_attempt(&AttemptRecord::new("u1", at)).await.unwrap();
        store
            .record_attempt(&AttemptRecord::new("u1", at - Duration::hours(1)))
            .await
            .unwrap();

        let recent = store.fetch_recent_attempts("u1", 5).await.unwrap();
        assert_eq!(recent, vec![at, at, at - Duration::hours(1)]);
    }
}
