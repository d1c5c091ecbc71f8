//! Store configuration and factory.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use examgate_core::traits::AttemptStore;

use crate::file::FileStore;
use crate::memory::MemoryStore;

/// Where attempt history is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    File {
        #[serde(default = "default_path")]
        path: PathBuf,
    },
}

fn default_path() -> PathBuf {
    PathBuf::from("./examgate-data/attempts.jsonl")
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: default_path(),
        }
    }
}

/// Create a store instance from its configuration.
pub fn create_store(config: &StoreConfig) -> Arc<dyn AttemptStore> {
    match config {
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
        StoreConfig::File { path } => {
            tracing::debug!(path = %path.display(), "using file attempt store");
            Arc::new(FileStore::new(path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use examgate_core::model::AttemptRecord;

    #[test]
    fn parse_store_configs() {
        let memory: StoreConfig = toml::from_str(r#"type = "memory""#).unwrap();
        assert_eq!(memory, StoreConfig::Memory);

        let file: StoreConfig = toml::from_str("type = \"file\"\npath = \"/tmp/a.jsonl\"").unwrap();
        assert_eq!(
            file,
            StoreConfig::File {
                path: PathBuf::from("/tmp/a.jsonl")
            }
        );

        let defaulted: StoreConfig = toml::from_str(r#"type = "file""#).unwrap();
        assert_eq!(defaulted, StoreConfig::default());
    }

    #[tokio::test]
    async fn factory_builds_working_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_store(&StoreConfig::File {
            path: dir.path().join("a.jsonl"),
        });
        let now = Utc::now();
        store.record_attempt(&AttemptRecord::new("u1", now)).await.unwrap();
        assert_eq!(store.fetch_recent_attempts("u1", 5).await.unwrap(), vec![now]);
    }
}
