// src/store/database.rs
// =============================================================================
// Database storage through an sqlx SQLite pool.
//
// The links table keeps one row per visited record. Rows are only ever
// inserted; nothing here reads them back except tests.
// =============================================================================

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use super::RecordSink;
use crate::chain::VisitedRecord;
use crate::error::StoreError;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chain_id TEXT NOT NULL,
    title TEXT NOT NULL,
    link TEXT NOT NULL,
    number INTEGER NOT NULL,
    base_url TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_links_chain ON links(chain_id, number);
"#;

const INSERT_SQL: &str =
    "INSERT INTO links (chain_id, title, link, number, base_url) VALUES (?, ?, ?, ?, ?)";

pub struct DatabaseStore {
    pool: Option<SqlitePool>,
}

impl DatabaseStore {
    /// Opens the pool, pings it and makes sure the schema exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self { pool: Some(pool) })
    }

    #[cfg(test)]
    fn pool(&self) -> &SqlitePool {
        self.pool.as_ref().expect("pool open in tests")
    }
}

#[async_trait]
impl RecordSink for DatabaseStore {
    async fn store(&mut self, record: &VisitedRecord) -> Result<(), StoreError> {
        let pool = self.pool.as_ref().ok_or(StoreError::Closed)?;

        sqlx::query(INSERT_SQL)
            .bind(&record.chain_id)
            .bind(&record.label)
            .bind(&record.reference)
            .bind(i64::from(record.sequence))
            .bind(&record.base_url)
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Job;

    #[tokio::test]
    async fn test_inserts_rows_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}/links.sqlite", dir.path().display());
        let mut store = DatabaseStore::connect(&url).await.unwrap();

        let seed = Job::seed("https://example.com", "/watch?v=abc", 3).unwrap();
        let next = seed.continuation("Second".to_string(), "/watch?v=def".to_string()).unwrap();
        store.store(&VisitedRecord::from(&seed)).await.unwrap();
        store.store(&VisitedRecord::from(&next)).await.unwrap();

        let rows: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT chain_id, title, number FROM links ORDER BY id")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert_eq!(
            rows,
            vec![
                ("abc".to_string(), "".to_string(), 0),
                ("abc".to_string(), "Second".to_string(), 1),
            ]
        );

        store.close().await;
        store.close().await;
        let err = store.store(&VisitedRecord::from(&seed)).await.unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }
}
