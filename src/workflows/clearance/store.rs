use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationStatus, CheckpointKind, StageId, StageStatus,
};

/// Durable record for one clearance application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub display_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub programme: String,
    pub hosteller: bool,
    pub proof_document_url: Option<String>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in a stage's append-only transition history.
///
/// Resubmission cycles are distinguished by the cycle counter and timestamp
/// ordering; entries from earlier cycles are never rewritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTransition {
    pub from: StageStatus,
    pub to: StageStatus,
    pub actor_id: String,
    pub remarks: Option<String>,
    pub forced: bool,
    pub cycle: u32,
    pub at: DateTime<Utc>,
}

/// Durable record for one (application, checkpoint) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub id: StageId,
    pub application_id: ApplicationId,
    pub group: u8,
    pub checkpoint: CheckpointKind,
    pub status: StageStatus,
    pub remarks: Option<String>,
    pub acted_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub current: bool,
    pub cycle: u32,
    pub history: Vec<StageTransition>,
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conflicting write for the same record")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction so the engine and service can be exercised in
/// isolation and backed by a real database later.
pub trait ClearanceStore: Send + Sync {
    fn insert_application(
        &self,
        application: ApplicationRecord,
        stages: Vec<StageRecord>,
    ) -> Result<(), StoreError>;
    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError>;
    fn update_application(&self, application: ApplicationRecord) -> Result<(), StoreError>;
    /// The open (non-terminal) application for a roll number, if any.
    fn open_application_for(
        &self,
        roll_number: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError>;
    fn fetch_stage(&self, id: &StageId) -> Result<Option<StageRecord>, StoreError>;
    /// All stages for an application in topology order.
    fn stages_for(&self, application_id: &ApplicationId) -> Result<Vec<StageRecord>, StoreError>;
    /// Commit a stage row, guarded against conflicting writers: the stored
    /// row must still carry `expected_status` in `expected_cycle`, otherwise
    /// the commit fails with `Conflict` and nothing is written.
    fn commit_stage(
        &self,
        stage: StageRecord,
        expected_status: StageStatus,
        expected_cycle: u32,
    ) -> Result<(), StoreError>;
    /// Actionable stages for one department's dashboard.
    fn pending_for_department(
        &self,
        department: CheckpointKind,
    ) -> Result<Vec<StageRecord>, StoreError>;
}

#[derive(Default)]
struct MemoryStoreInner {
    applications: HashMap<ApplicationId, ApplicationRecord>,
    stages: HashMap<StageId, StageRecord>,
    stage_order: HashMap<ApplicationId, Vec<StageId>>,
}

/// In-memory store backing the service binary and the test suites.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, MemoryStoreInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl ClearanceStore for MemoryStore {
    fn insert_application(
        &self,
        application: ApplicationRecord,
        stages: Vec<StageRecord>,
    ) -> Result<(), StoreError> {
        let mut inner = self.locked()?;
        if inner.applications.contains_key(&application.id) {
            return Err(StoreError::Conflict);
        }
        let open_exists = inner.applications.values().any(|existing| {
            existing.roll_number == application.roll_number && !existing.status.is_terminal()
        });
        if open_exists {
            return Err(StoreError::Conflict);
        }

        let order: Vec<StageId> = stages.iter().map(|stage| stage.id).collect();
        inner.stage_order.insert(application.id, order);
        for stage in stages {
            inner.stages.insert(stage.id, stage);
        }
        inner.applications.insert(application.id, application);
        Ok(())
    }

    fn fetch_application(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let inner = self.locked()?;
        Ok(inner.applications.get(id).cloned())
    }

    fn update_application(&self, application: ApplicationRecord) -> Result<(), StoreError> {
        let mut inner = self.locked()?;
        if !inner.applications.contains_key(&application.id) {
            return Err(StoreError::NotFound);
        }
        inner.applications.insert(application.id, application);
        Ok(())
    }

    fn open_application_for(
        &self,
        roll_number: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let inner = self.locked()?;
        Ok(inner
            .applications
            .values()
            .find(|application| {
                application.roll_number == roll_number && !application.status.is_terminal()
            })
            .cloned())
    }

    fn fetch_stage(&self, id: &StageId) -> Result<Option<StageRecord>, StoreError> {
        let inner = self.locked()?;
        Ok(inner.stages.get(id).cloned())
    }

    fn stages_for(&self, application_id: &ApplicationId) -> Result<Vec<StageRecord>, StoreError> {
        let inner = self.locked()?;
        let order = inner
            .stage_order
            .get(application_id)
            .ok_or(StoreError::NotFound)?;
        let mut stages = Vec::with_capacity(order.len());
        for stage_id in order {
            let stage = inner.stages.get(stage_id).ok_or(StoreError::NotFound)?;
            stages.push(stage.clone());
        }
        Ok(stages)
    }

    fn commit_stage(
        &self,
        stage: StageRecord,
        expected_status: StageStatus,
        expected_cycle: u32,
    ) -> Result<(), StoreError> {
        let mut inner = self.locked()?;
        let stored = inner.stages.get(&stage.id).ok_or(StoreError::NotFound)?;
        if stored.status != expected_status || stored.cycle != expected_cycle {
            return Err(StoreError::Conflict);
        }
        inner.stages.insert(stage.id, stage);
        Ok(())
    }

    fn pending_for_department(
        &self,
        department: CheckpointKind,
    ) -> Result<Vec<StageRecord>, StoreError> {
        let inner = self.locked()?;
        let mut pending: Vec<StageRecord> = inner
            .stages
            .values()
            .filter(|stage| stage.checkpoint == department && stage.status == StageStatus::Pending)
            .filter(|stage| {
                inner
                    .applications
                    .get(&stage.application_id)
                    .is_some_and(|application| application.status != ApplicationStatus::Rejected)
            })
            .cloned()
            .collect();
        pending.sort_by_key(|stage| {
            inner
                .applications
                .get(&stage.application_id)
                .map(|application| application.created_at)
                .unwrap_or_else(Utc::now)
        });
        Ok(pending)
    }
}
