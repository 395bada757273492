// src/store/mod.rs
// =============================================================================
// Storage for visited records.
//
// Two backends exist, database and file. The choice is made once, at
// startup, and is then fixed: StoreTarget is a closed enum, so the relay
// never has to ask "what kind of store is this?" at runtime.
//
// Submodules:
// - database: SQLite through sqlx
// - file: one JSON object per line
// =============================================================================

mod database;
mod file;

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::chain::VisitedRecord;
use crate::error::{ConfigError, StoreError};

pub use database::DatabaseStore;
pub use file::FileStore;

/// The contract the store relay drives.
///
/// Only the relay loop calls these, one at a time, hence `&mut self`.
#[async_trait]
pub trait RecordSink: Send {
    async fn store(&mut self, record: &VisitedRecord) -> Result<(), StoreError>;

    /// Flushes and releases the backend. Safe to call more than once.
    async fn close(&mut self);
}

/// Where startup decided records should go.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub database_url: Option<String>,
    pub file_path: PathBuf,
}

pub enum StoreTarget {
    Database(DatabaseStore),
    File(FileStore),
}

impl StoreTarget {
    /// Prefers the database; falls back to the file when no database is
    /// configured or it cannot be reached. Fails only if neither works.
    pub async fn decide(settings: &StoreSettings) -> Result<Self, ConfigError> {
        if let Some(url) = &settings.database_url {
            match DatabaseStore::connect(url).await {
                Ok(db) => {
                    info!(database = %url, "storing records in database");
                    return Ok(StoreTarget::Database(db));
                }
                Err(e) => {
                    warn!(database = %url, error = %e, "database unavailable, falling back to file");
                }
            }
        }

        let file = FileStore::create(&settings.file_path)
            .await
            .map_err(|e| {
                ConfigError::NoStorageTarget(format!("{}: {}", settings.file_path.display(), e))
            })?;
        info!(path = %settings.file_path.display(), "storing records in file");
        Ok(StoreTarget::File(file))
    }

    pub fn describe(&self) -> String {
        match self {
            StoreTarget::Database(_) => "database".to_string(),
            StoreTarget::File(file) => format!("file {}", file.path().display()),
        }
    }
}

#[async_trait]
impl RecordSink for StoreTarget {
    async fn store(&mut self, record: &VisitedRecord) -> Result<(), StoreError> {
        match self {
            StoreTarget::Database(db) => db.store(record).await,
            StoreTarget::File(file) => file.store(record).await,
        }
    }

    async fn close(&mut self) {
        match self {
            StoreTarget::Database(db) => db.close().await,
            StoreTarget::File(file) => file.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_falls_back_to_file_without_database() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            database_url: None,
            file_path: dir.path().join("records.jsonl"),
        };
        let target = StoreTarget::decide(&settings).await.unwrap();
        assert!(matches!(target, StoreTarget::File(_)));
    }

    #[tokio::test]
    async fn test_falls_back_when_database_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            // parent directory does not exist, so SQLite cannot create the file
            database_url: Some(format!(
                "sqlite://{}/missing/dir/db.sqlite",
                dir.path().display()
            )),
            file_path: dir.path().join("records.jsonl"),
        };
        let target = StoreTarget::decide(&settings).await.unwrap();
        assert!(matches!(target, StoreTarget::File(_)));
    }

    #[tokio::test]
    async fn test_no_target_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            database_url: None,
            file_path: dir.path().join("missing").join("records.jsonl"),
        };
        let err = StoreTarget::decide(&settings).await.err().unwrap();
        assert!(matches!(err, ConfigError::NoStorageTarget(_)));
    }

    #[tokio::test]
    async fn test_uses_database_when_reachable() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StoreSettings {
            database_url: Some(format!("sqlite://{}/links.sqlite", dir.path().display())),
            file_path: dir.path().join("records.jsonl"),
        };
        let mut target = StoreTarget::decide(&settings).await.unwrap();
        assert_eq!(target.describe(), "database");
        target.close().await;
    }
}
