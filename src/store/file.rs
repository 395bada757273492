// src/store/file.rs
// =============================================================================
// File storage: every visited record becomes one JSON line.
//
// Example line:
//   {"chain_id":"DT61L8hbbJ4","sequence":1,"max_depth":10,...}
// =============================================================================

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use super::RecordSink;
use crate::chain::VisitedRecord;
use crate::error::StoreError;

pub struct FileStore {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileStore {
    /// Creates (or truncates) the destination file.
    pub async fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecordSink for FileStore {
    async fn store(&mut self, record: &VisitedRecord) -> Result<(), StoreError> {
        let writer = self.writer.as_mut().ok_or(StoreError::Closed)?;

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        // a record counts as stored once it reached the file
        writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to close record file");
            }
        }
    }
}
