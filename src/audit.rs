//! Audit trail
//!
//! Appends one JSON line per settled action. Never contains key material,
//! and a failed write never affects the action itself.

use crate::workflow::{Outcome, PendingAction};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry {
    timestamp: DateTime<Utc>,
    action_id: Uuid,
    kind: &'static str,
    owner: String,
    details: Value,
    status: &'static str,
    signature: Option<String>,
    error_category: Option<&'static str>,
    requested_at: DateTime<Utc>,
}

/// Writer for audit log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLog {
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter {
                path: log_path.into(),
            })),
        }
    }

    pub async fn record(&self, pending: &PendingAction, outcome: &Outcome) {
        let (status, signature, error_category) = match outcome {
            Outcome::Success { signature } => ("success", Some(signature.clone()), None),
            Outcome::Failure { category, .. } => ("failure", None, Some(*category)),
        };

        let entry = AuditEntry {
            timestamp: Utc::now(),
            action_id: pending.id,
            kind: pending.action.kind(),
            owner: pending.owner.to_string(),
            details: pending.action.describe(),
            status,
            signature,
            error_category,
            requested_at: pending.created_at,
        };

        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }
}
