use std::collections::BTreeMap;

use chrono::Utc;

use super::domain::{ApplicationId, ApplicationStatus, CheckpointKind, StageId, StageStatus};
use super::store::{ApplicationRecord, ClearanceStore, StageRecord, StageTransition, StoreError};

/// Actor recorded on transitions the engine performs on its own behalf
/// (group unlocks after a merge).
const SYSTEM_ACTOR: &str = "system";

/// Errors raised by illegal state-machine moves. No variant leaves a partial
/// transition behind; the store is only written once the move is validated.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    #[error("{checkpoint:?} stage is {found:?} and cannot be {attempted}")]
    InvalidTransition {
        checkpoint: CheckpointKind,
        found: StageStatus,
        attempted: &'static str,
    },
    #[error("application is rejected; stages are frozen until resubmission")]
    ApplicationFrozen,
    #[error("application is completed and immutable")]
    ApplicationClosed,
    #[error("application is not rejected; nothing to resubmit")]
    NotRejected,
    #[error("no rejected stage found to reopen")]
    NoRejectedStage,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Student-editable fields accepted alongside a resubmission.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ResubmissionUpdate {
    #[serde(default)]
    pub proof_document_url: Option<String>,
}

/// Updated application + full stage list returned after every transition.
pub type EngineSnapshot = (ApplicationRecord, Vec<StageRecord>);

/// Exclusive owner of Application and Stage status/order fields. The gateway
/// and override controller validate requests and delegate here; nothing else
/// writes workflow state.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransitionEngine;

impl TransitionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Approve a pending stage and advance the flow.
    ///
    /// If the stage completed its fan-out group (every sibling approved or
    /// skipped), the next group's applicable stages unlock; approving the
    /// terminal group completes the application.
    pub fn approve<S: ClearanceStore + ?Sized>(
        &self,
        store: &S,
        stage_id: &StageId,
        actor_id: &str,
        remarks: Option<String>,
        forced: bool,
    ) -> Result<EngineSnapshot, TransitionError> {
        let (application, mut stage) = self.load_actionable(store, stage_id, "approved")?;

        let now = Utc::now();
        let expected_cycle = stage.cycle;
        stage.history.push(StageTransition {
            from: StageStatus::Pending,
            to: StageStatus::Approved,
            actor_id: actor_id.to_string(),
            remarks: remarks.clone(),
            forced,
            cycle: stage.cycle,
            at: now,
        });
        stage.status = StageStatus::Approved;
        stage.remarks = remarks;
        stage.acted_by = Some(actor_id.to_string());
        stage.resolved_at = Some(now);
        stage.current = false;
        store.commit_stage(stage, StageStatus::Pending, expected_cycle)?;

        self.recompute(store, application)
    }

    /// Reject a pending stage. The application drops to rejected and every
    /// other stage freezes (no approvals accepted) until the student
    /// resubmits. Remarks are validated upstream by the gateway.
    pub fn reject<S: ClearanceStore + ?Sized>(
        &self,
        store: &S,
        stage_id: &StageId,
        actor_id: &str,
        remarks: String,
        forced: bool,
    ) -> Result<EngineSnapshot, TransitionError> {
        let (mut application, mut stage) = self.load_actionable(store, stage_id, "rejected")?;

        let now = Utc::now();
        let expected_cycle = stage.cycle;
        stage.history.push(StageTransition {
            from: StageStatus::Pending,
            to: StageStatus::Rejected,
            actor_id: actor_id.to_string(),
            remarks: Some(remarks.clone()),
            forced,
            cycle: stage.cycle,
            at: now,
        });
        stage.status = StageStatus::Rejected;
        stage.remarks = Some(remarks);
        stage.acted_by = Some(actor_id.to_string());
        stage.resolved_at = Some(now);
        stage.current = false;
        let application_id = stage.application_id;
        store.commit_stage(stage, StageStatus::Pending, expected_cycle)?;

        // Freeze: clear the actionable flag everywhere while rejected.
        let mut stages = store.stages_for(&application_id)?;
        for sibling in &mut stages {
            if sibling.current {
                sibling.current = false;
                let status = sibling.status;
                let cycle = sibling.cycle;
                store.commit_stage(sibling.clone(), status, cycle)?;
            }
        }

        application.status = ApplicationStatus::Rejected;
        application.updated_at = now;
        store.update_application(application.clone())?;
        Ok((application, stages))
    }

    /// Reopen the rejected stage for another cycle. Stages already resolved
    /// in this application's timeline are left untouched; only the rejected
    /// stage resets, with its prior cycle preserved in history.
    pub fn resubmit<S: ClearanceStore + ?Sized>(
        &self,
        store: &S,
        application_id: &ApplicationId,
        actor_id: &str,
        update: ResubmissionUpdate,
    ) -> Result<EngineSnapshot, TransitionError> {
        let mut application = store
            .fetch_application(application_id)?
            .ok_or(StoreError::NotFound)?;
        if application.status != ApplicationStatus::Rejected {
            return Err(TransitionError::NotRejected);
        }

        let stages = store.stages_for(application_id)?;
        let rejected = stages
            .into_iter()
            .find(|stage| stage.status == StageStatus::Rejected)
            .ok_or(TransitionError::NoRejectedStage)?;

        let now = Utc::now();
        let expected_cycle = rejected.cycle;
        let mut reopened = rejected;
        reopened.history.push(StageTransition {
            from: StageStatus::Rejected,
            to: StageStatus::Pending,
            actor_id: actor_id.to_string(),
            remarks: None,
            forced: false,
            cycle: expected_cycle + 1,
            at: now,
        });
        reopened.status = StageStatus::Pending;
        reopened.cycle = expected_cycle + 1;
        reopened.remarks = None;
        reopened.acted_by = None;
        reopened.resolved_at = None;
        reopened.current = true;
        store.commit_stage(reopened, StageStatus::Rejected, expected_cycle)?;

        if let Some(url) = update.proof_document_url {
            application.proof_document_url = Some(url);
        }
        application.status = ApplicationStatus::InProgress;
        application.updated_at = now;
        store.update_application(application.clone())?;

        // Unfreeze the siblings that were pending before the rejection.
        self.recompute(store, application)
    }

    /// Derive the aggregate picture from the stage rows: unlock the first
    /// unresolved group once its predecessors have merged, refresh the
    /// actionable flags, and settle the application status. This is a pure
    /// read-then-decide pass, so re-running it after concurrent sibling
    /// approvals always converges on the same answer.
    fn recompute<S: ClearanceStore + ?Sized>(
        &self,
        store: &S,
        mut application: ApplicationRecord,
    ) -> Result<EngineSnapshot, TransitionError> {
        let stages = store.stages_for(&application.id)?;

        let mut groups: BTreeMap<u8, Vec<&StageRecord>> = BTreeMap::new();
        for stage in &stages {
            groups.entry(stage.group).or_default().push(stage);
        }

        let mut all_resolved = true;
        let mut to_unlock: Vec<StageId> = Vec::new();
        for members in groups.values() {
            let resolved = members.iter().all(|stage| stage.status.is_resolved());
            if resolved {
                continue;
            }
            all_resolved = false;
            for stage in members {
                if stage.status == StageStatus::Locked {
                    to_unlock.push(stage.id);
                }
            }
            break;
        }

        let now = Utc::now();
        for stage_id in to_unlock {
            let mut stage = store.fetch_stage(&stage_id)?.ok_or(StoreError::NotFound)?;
            let cycle = stage.cycle;
            stage.history.push(StageTransition {
                from: StageStatus::Locked,
                to: StageStatus::Pending,
                actor_id: SYSTEM_ACTOR.to_string(),
                remarks: None,
                forced: false,
                cycle,
                at: now,
            });
            stage.status = StageStatus::Pending;
            stage.current = true;
            store.commit_stage(stage, StageStatus::Locked, cycle)?;
        }

        // Actionable flag tracks pending status exactly while in flight.
        let mut stages = store.stages_for(&application.id)?;
        for stage in &mut stages {
            let should_be_current = stage.status == StageStatus::Pending;
            if stage.current != should_be_current {
                stage.current = should_be_current;
                let status = stage.status;
                let cycle = stage.cycle;
                store.commit_stage(stage.clone(), status, cycle)?;
            }
        }

        application.status = if all_resolved {
            ApplicationStatus::Completed
        } else {
            ApplicationStatus::InProgress
        };
        application.updated_at = now;
        store.update_application(application.clone())?;
        Ok((application, stages))
    }

    /// Fetch a stage and its application, enforcing the common preconditions
    /// for approve/reject: the application must be in flight and the stage
    /// must be pending.
    fn load_actionable<S: ClearanceStore + ?Sized>(
        &self,
        store: &S,
        stage_id: &StageId,
        attempted: &'static str,
    ) -> Result<(ApplicationRecord, StageRecord), TransitionError> {
        let stage = store.fetch_stage(stage_id)?.ok_or(StoreError::NotFound)?;
        let application = store
            .fetch_application(&stage.application_id)?
            .ok_or(StoreError::NotFound)?;

        match application.status {
            ApplicationStatus::Completed => return Err(TransitionError::ApplicationClosed),
            ApplicationStatus::Rejected => return Err(TransitionError::ApplicationFrozen),
            ApplicationStatus::Pending | ApplicationStatus::InProgress => {}
        }
        if stage.status != StageStatus::Pending {
            return Err(TransitionError::InvalidTransition {
                checkpoint: stage.checkpoint,
                found: stage.status,
                attempted,
            });
        }

        Ok((application, stage))
    }
}
