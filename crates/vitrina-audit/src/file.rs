//! File-backed audit sink
//!
//! Writes one JSON line per entry. Operations and errors go to separate
//! files, rotated monthly by name: `operations_YYYYMM.log` and
//! `errors_YYYYMM.log` under the configured directory.

use crate::{monthly_path, AuditEntry, AuditEvent, AuditResult, AuditSink};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub struct FileAuditSink {
    dir: PathBuf,
}

impl FileAuditSink {
    /// Creates the directory if missing.
    pub async fn new(dir: impl AsRef<Path>) -> AuditResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let prefix = match entry.event {
            AuditEvent::Operation { .. } => "operations",
            AuditEvent::Error { .. } => "errors",
        };
        let path = monthly_path(&self.dir, prefix, entry.timestamp);

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, entry: AuditEntry) {
        if let Err(e) = self.append(&entry).await {
            tracing::warn!(error = %e, "failed to write audit entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use vitrina_types::{ChatId, TransactionId};

    #[tokio::test]
    async fn operations_and_errors_land_in_separate_monthly_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileAuditSink::new(dir.path()).await.unwrap();

        let tx = TransactionId::new();
        let op = AuditEntry::operation(Some(ChatId(1)), tx, "give", "pending", "created");
        let err = AuditEntry::error(Some(ChatId(1)), "give", "boom");
        let now = op.timestamp;
        sink.record(op).await;
        sink.record(err).await;

        let ops_name = format!("operations_{:04}{:02}.log", now.year(), now.month());
        let errs_name = format!("errors_{:04}{:02}.log", now.year(), now.month());

        let ops = tokio::fs::read_to_string(dir.path().join(ops_name)).await.unwrap();
        let errs = tokio::fs::read_to_string(dir.path().join(errs_name)).await.unwrap();
        assert_eq!(ops.lines().count(), 1);
        assert_eq!(errs.lines().count(), 1);
        assert!(ops.contains("\"type\":\"operation\""));
        assert!(errs.contains("\"type\":\"error\""));
    }

    #[tokio::test]
    async fn appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileAuditSink::new(dir.path()).await.unwrap();

        for i in 0..3 {
            let entry = AuditEntry::operation(None, TransactionId::new(), "sale", "confirmed", format!("n{i}"));
            sink.record(entry).await;
        }

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let file = entries.next_entry().await.unwrap().unwrap();
        let content = tokio::fs::read_to_string(file.path()).await.unwrap();
        assert_eq!(content.lines().count(), 3);
    }
}
