use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{ApplicationId, CheckpointKind, ForcedOutcome, StageId};

/// The state-changing operations that leave an audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    Approved,
    Rejected,
    Resubmitted,
    Overridden { outcome: ForcedOutcome },
}

/// Append-only record of one approval, rejection, override, creation, or
/// resubmission. Entries are never mutated or deleted; within one
/// application their order matches commit order because the service appends
/// while still holding the application lock.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub application_id: ApplicationId,
    pub stage_id: Option<StageId>,
    pub checkpoint: Option<CheckpointKind>,
    pub actor_id: String,
    pub action: AuditAction,
    pub remarks: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit log unavailable: {0}")]
    Unavailable(String),
}

/// Filters accepted by the read-only audit listing.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub application_id: Option<ApplicationId>,
    pub actor_id: Option<String>,
}

/// Sink the service writes audit entries to; listing is read-only.
pub trait AuditLog: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
    fn entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditError>;
}

/// In-memory append-only log backing the service binary and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AuditError::Unavailable("audit mutex poisoned".to_string()))?;
        entries.push(entry);
        Ok(())
    }

    fn entries(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, AuditError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AuditError::Unavailable("audit mutex poisoned".to_string()))?;
        Ok(entries
            .iter()
            .filter(|entry| {
                filter
                    .application_id
                    .map_or(true, |id| entry.application_id == id)
            })
            .filter(|entry| {
                filter
                    .actor_id
                    .as_deref()
                    .map_or(true, |actor| entry.actor_id == actor)
            })
            .cloned()
            .collect())
    }
}
