//! Vitrina Audit - Append-only operation and error trail
//!
//! Every consequential action produces an audit entry. Recording is
//! fire-and-forget relative to the ledger: an audit write failure is
//! logged and swallowed, it never rolls back a persisted mutation.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use vitrina_types::{AuditEntryId, ChatId, TransactionId};

pub mod error;
pub mod file;
pub mod memory;

pub use error::{AuditError, AuditResult};
pub use file::FileAuditSink;
pub use memory::MemoryAuditSink;

/// An audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub timestamp: DateTime<Utc>,
    /// Chat of the user that triggered the event, when known
    pub actor: Option<ChatId>,
    pub event: AuditEvent,
}

/// Types of auditable events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A stock movement changed state (created, confirmed, rejected)
    Operation {
        transaction_id: TransactionId,
        kind: String,
        status: String,
        detail: String,
    },
    /// A handler failed; the user saw a generic error message
    Error { context: String, message: String },
}

impl AuditEntry {
    pub fn operation(
        actor: Option<ChatId>,
        transaction_id: TransactionId,
        kind: &str,
        status: &str,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            id: AuditEntryId::new(),
            timestamp: Utc::now(),
            actor,
            event: AuditEvent::Operation {
                transaction_id,
                kind: kind.to_string(),
                status: status.to_string(),
                detail: detail.into(),
            },
        }
    }

    pub fn error(actor: Option<ChatId>, context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: AuditEntryId::new(),
            timestamp: Utc::now(),
            actor,
            event: AuditEvent::Error { context: context.into(), message: message.into() },
        }
    }
}

/// Audit sink trait
///
/// `record` must not fail the caller: implementations log their own
/// write errors and return.
#[async_trait::async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}

/// Monthly log file name, e.g. `operations_202608.log`
pub(crate) fn monthly_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}_{:04}{:02}.log", prefix, at.year(), at.month())
}

pub(crate) fn monthly_path(dir: &Path, prefix: &str, at: DateTime<Utc>) -> PathBuf {
    dir.join(monthly_file_name(prefix, at))
}
