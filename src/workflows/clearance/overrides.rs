use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Deserialize;

use super::domain::{ApplicationId, CheckpointKind, ForcedOutcome};
use super::store::StageRecord;

/// Ephemeral override request. Nothing of it is persisted beyond the audit
/// entry the service emits on success.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideRequest {
    pub outcome: ForcedOutcome,
    pub justification: String,
}

/// The one retryable error in the taxonomy: a mutating operation for this
/// application is already in flight.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("another operation is in flight for this application; retry shortly")]
pub struct BusyError;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OverridePolicyError {
    #[error("the finance stage accepts an override only after every other stage is resolved")]
    FinanceLocked,
}

/// Per-application mutual exclusion for stage-mutating operations.
///
/// Contended callers are turned away with `BusyError` instead of queueing,
/// which keeps async handlers non-blocking and gives overrides the exclusive
/// window the workflow contract requires. The guard releases on drop, after
/// the transition and refreshed snapshot have been committed.
#[derive(Debug, Default)]
pub struct ApplicationLocks {
    flags: Mutex<HashMap<ApplicationId, Arc<AtomicBool>>>,
}

impl ApplicationLocks {
    pub fn try_begin(&self, application_id: ApplicationId) -> Result<OperationGuard, BusyError> {
        let flag = {
            let mut flags = self
                .flags
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            Arc::clone(
                flags
                    .entry(application_id)
                    .or_insert_with(|| Arc::new(AtomicBool::new(false))),
            )
        };

        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(OperationGuard { flag })
        } else {
            Err(BusyError)
        }
    }
}

/// Held for the duration of one mutating operation on one application.
#[derive(Debug)]
pub struct OperationGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Policy seat for privileged forced transitions.
///
/// Finance policy: the finance stage is locked against override until every
/// other stage in the topology is resolved (approved or skipped). Before
/// that point only the finance actor may move it.
#[derive(Debug, Default, Clone, Copy)]
pub struct OverrideController;

impl OverrideController {
    pub fn new() -> Self {
        Self
    }

    pub fn vet_target(
        &self,
        target: &StageRecord,
        stages: &[StageRecord],
    ) -> Result<(), OverridePolicyError> {
        if target.checkpoint != CheckpointKind::Finance {
            return Ok(());
        }
        let rest_resolved = stages
            .iter()
            .filter(|stage| stage.id != target.id)
            .all(|stage| stage.status.is_resolved());
        if rest_resolved {
            Ok(())
        } else {
            Err(OverridePolicyError::FinanceLocked)
        }
    }
}
