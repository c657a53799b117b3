use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::config::WorkflowConfig;

use super::audit::{AuditAction, AuditEntry, AuditError, AuditFilter, AuditLog};
use super::domain::{
    ActorIdentity, AdmissionProfile, ApplicationId, ApplicationStatus, CheckpointKind,
    ForcedOutcome, StageId, StageStatus,
};
use super::engine::{ResubmissionUpdate, TransitionEngine, TransitionError};
use super::gateway::{ActionGateway, GatewayError};
use super::overrides::{
    ApplicationLocks, BusyError, OverrideController, OverridePolicyError, OverrideRequest,
};
use super::projection::{ClearanceSnapshot, ReviewQueueEntry, StatusProjector};
use super::store::{ApplicationRecord, ClearanceStore, StageRecord, StoreError};
use super::topology::{StageTopology, TopologyError};

/// Error raised by the clearance service facade. Each variant maps to one
/// kind in the workflow error taxonomy so callers can react structurally.
#[derive(Debug, thiserror::Error)]
pub enum ClearanceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    OverridePolicy(#[from] OverridePolicyError),
    #[error(transparent)]
    Busy(#[from] BusyError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_display_id() -> String {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("NOD-{id:06}")
}

/// Facade composing the topology resolver, store, gateway, transition
/// engine, override controller, and projector behind the operations clients
/// consume.
pub struct ClearanceService<S, L> {
    store: Arc<S>,
    audit: Arc<L>,
    topology: StageTopology,
    gateway: ActionGateway,
    engine: TransitionEngine,
    controller: OverrideController,
    locks: ApplicationLocks,
    projector: StatusProjector,
}

impl<S, L> ClearanceService<S, L>
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    pub fn new(store: Arc<S>, audit: Arc<L>, config: &WorkflowConfig) -> Self {
        Self::with_topology(store, audit, config, StageTopology::standard())
    }

    pub fn with_topology(
        store: Arc<S>,
        audit: Arc<L>,
        config: &WorkflowConfig,
        topology: StageTopology,
    ) -> Self {
        Self {
            store,
            audit,
            topology,
            gateway: ActionGateway::new(),
            engine: TransitionEngine::new(),
            controller: OverrideController::new(),
            locks: ApplicationLocks::default(),
            projector: StatusProjector::new(config.overdue_after_days, config.poll_staleness_secs),
        }
    }

    /// Open a clearance application: resolve the topology for the admission
    /// profile and instantiate its stage records.
    pub fn create_application(
        &self,
        profile: AdmissionProfile,
    ) -> Result<ClearanceSnapshot, ClearanceError> {
        if profile.student_name.trim().is_empty() {
            return Err(ClearanceError::Validation(
                "student name must not be empty".to_string(),
            ));
        }
        if profile.roll_number.trim().is_empty() {
            return Err(ClearanceError::Validation(
                "roll number must not be empty".to_string(),
            ));
        }
        if self
            .store
            .open_application_for(&profile.roll_number)?
            .is_some()
        {
            return Err(ClearanceError::Validation(format!(
                "student {} already has an open clearance application",
                profile.roll_number
            )));
        }

        let resolved = self.topology.resolve(&profile)?;
        let now = Utc::now();
        let application = ApplicationRecord {
            id: ApplicationId::generate(),
            display_id: next_display_id(),
            student_name: profile.student_name,
            roll_number: profile.roll_number,
            programme: profile.programme,
            hosteller: profile.hosteller,
            proof_document_url: profile.proof_document_url,
            status: ApplicationStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let stages: Vec<StageRecord> = resolved
            .into_iter()
            .map(|checkpoint| StageRecord {
                id: StageId::generate(),
                application_id: application.id,
                group: checkpoint.group,
                checkpoint: checkpoint.checkpoint,
                status: checkpoint.initial_status,
                remarks: None,
                acted_by: None,
                resolved_at: None,
                current: checkpoint.initial_status == StageStatus::Pending,
                cycle: 1,
                history: Vec::new(),
            })
            .collect();

        match self.store.insert_application(application.clone(), stages) {
            Ok(()) => {}
            Err(StoreError::Conflict) => {
                return Err(ClearanceError::Validation(format!(
                    "student {} already has an open clearance application",
                    application.roll_number
                )))
            }
            Err(other) => return Err(other.into()),
        }

        self.audit.append(AuditEntry {
            application_id: application.id,
            stage_id: None,
            checkpoint: None,
            actor_id: application.roll_number.clone(),
            action: AuditAction::Created,
            remarks: None,
            at: now,
        })?;
        info!(display_id = %application.display_id, "clearance application opened");

        self.snapshot_of(&application.id)
    }

    /// Stages currently actionable by one department's dashboard.
    pub fn list_pending(
        &self,
        department: CheckpointKind,
    ) -> Result<Vec<ReviewQueueEntry>, ClearanceError> {
        let now = Utc::now();
        let mut entries = Vec::new();
        for stage in self.store.pending_for_department(department)? {
            let application = self
                .store
                .fetch_application(&stage.application_id)?
                .ok_or(StoreError::NotFound)?;
            entries.push(self.projector.queue_entry(&application, &stage, now));
        }
        Ok(entries)
    }

    /// Enriched snapshot for review UIs.
    pub fn application_detail(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ClearanceSnapshot, ClearanceError> {
        self.snapshot_of(application_id)
    }

    /// Full ordered stage history for polling timeline views.
    pub fn status_timeline(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ClearanceSnapshot, ClearanceError> {
        self.snapshot_of(application_id)
    }

    /// Record a client-reported "document opened" event for the session gate.
    pub fn mark_document_viewed(
        &self,
        actor: &ActorIdentity,
        application_id: &ApplicationId,
    ) -> Result<(), ClearanceError> {
        self.store
            .fetch_application(application_id)?
            .ok_or(StoreError::NotFound)?;
        self.gateway.mark_document_viewed(actor, *application_id);
        Ok(())
    }

    /// Approve a pending stage on behalf of a departmental actor.
    pub fn approve_stage(
        &self,
        actor: &ActorIdentity,
        stage_id: &StageId,
        remarks: Option<String>,
    ) -> Result<ClearanceSnapshot, ClearanceError> {
        let stage = self.fetch_stage(stage_id)?;
        let _guard = self.locks.try_begin(stage.application_id)?;

        self.gateway.authorize_action(actor, &stage)?;
        let prior_application = self
            .store
            .fetch_application(&stage.application_id)?
            .ok_or(StoreError::NotFound)?;
        self.gateway
            .require_document_reviewed(actor, &prior_application)?;
        let prior_stages = self.store.stages_for(&stage.application_id)?;

        let (application, stages) =
            self.engine
                .approve(self.store.as_ref(), stage_id, &actor.actor_id, remarks.clone(), false)?;
        self.audit_committed(
            AuditEntry {
                application_id: application.id,
                stage_id: Some(*stage_id),
                checkpoint: Some(stage.checkpoint),
                actor_id: actor.actor_id.clone(),
                action: AuditAction::Approved,
                remarks,
                at: Utc::now(),
            },
            &prior_application,
            &prior_stages,
        )?;
        info!(
            display_id = %application.display_id,
            checkpoint = stage.checkpoint.label(),
            "stage approved"
        );

        Ok(self
            .projector
            .snapshot(&application, &stages, Utc::now()))
    }

    /// Reject a pending stage; remarks are mandatory.
    pub fn reject_stage(
        &self,
        actor: &ActorIdentity,
        stage_id: &StageId,
        remarks: String,
    ) -> Result<ClearanceSnapshot, ClearanceError> {
        self.gateway.require_remarks(&remarks)?;
        let stage = self.fetch_stage(stage_id)?;
        let _guard = self.locks.try_begin(stage.application_id)?;

        self.gateway.authorize_action(actor, &stage)?;
        let prior_application = self
            .store
            .fetch_application(&stage.application_id)?
            .ok_or(StoreError::NotFound)?;
        self.gateway
            .require_document_reviewed(actor, &prior_application)?;
        let prior_stages = self.store.stages_for(&stage.application_id)?;

        let (application, stages) =
            self.engine
                .reject(self.store.as_ref(), stage_id, &actor.actor_id, remarks.clone(), false)?;
        self.audit_committed(
            AuditEntry {
                application_id: application.id,
                stage_id: Some(*stage_id),
                checkpoint: Some(stage.checkpoint),
                actor_id: actor.actor_id.clone(),
                action: AuditAction::Rejected,
                remarks: Some(remarks),
                at: Utc::now(),
            },
            &prior_application,
            &prior_stages,
        )?;
        info!(
            display_id = %application.display_id,
            checkpoint = stage.checkpoint.label(),
            "stage rejected"
        );

        Ok(self
            .projector
            .snapshot(&application, &stages, Utc::now()))
    }

    /// Reopen a rejected application for another cycle.
    pub fn resubmit_application(
        &self,
        actor: &ActorIdentity,
        application_id: &ApplicationId,
        update: ResubmissionUpdate,
    ) -> Result<ClearanceSnapshot, ClearanceError> {
        let _guard = self.locks.try_begin(*application_id)?;

        let prior_application = self
            .store
            .fetch_application(application_id)?
            .ok_or(StoreError::NotFound)?;
        let prior_stages = self.store.stages_for(application_id)?;

        let (application, stages) =
            self.engine
                .resubmit(self.store.as_ref(), application_id, &actor.actor_id, update)?;
        self.audit_committed(
            AuditEntry {
                application_id: application.id,
                stage_id: None,
                checkpoint: None,
                actor_id: actor.actor_id.clone(),
                action: AuditAction::Resubmitted,
                remarks: None,
                at: Utc::now(),
            },
            &prior_application,
            &prior_stages,
        )?;
        info!(display_id = %application.display_id, "application resubmitted");

        Ok(self
            .projector
            .snapshot(&application, &stages, Utc::now()))
    }

    /// Force a transition outside normal actor rules. Superuser only; one
    /// override (or any other mutation) in flight per application at a time.
    pub fn override_stage(
        &self,
        actor: &ActorIdentity,
        stage_id: &StageId,
        request: OverrideRequest,
    ) -> Result<ClearanceSnapshot, ClearanceError> {
        self.gateway.authorize_override(actor)?;
        self.gateway.require_justification(&request.justification)?;

        let stage = self.fetch_stage(stage_id)?;
        let _guard = self.locks.try_begin(stage.application_id)?;

        let prior_application = self
            .store
            .fetch_application(&stage.application_id)?
            .ok_or(StoreError::NotFound)?;
        let prior_stages = self.store.stages_for(&stage.application_id)?;
        self.controller.vet_target(&stage, &prior_stages)?;

        let (application, stages) = match request.outcome {
            ForcedOutcome::Approved => self.engine.approve(
                self.store.as_ref(),
                stage_id,
                &actor.actor_id,
                Some(request.justification.clone()),
                true,
            )?,
            ForcedOutcome::Rejected => self.engine.reject(
                self.store.as_ref(),
                stage_id,
                &actor.actor_id,
                request.justification.clone(),
                true,
            )?,
        };
        self.audit_committed(
            AuditEntry {
                application_id: application.id,
                stage_id: Some(*stage_id),
                checkpoint: Some(stage.checkpoint),
                actor_id: actor.actor_id.clone(),
                action: AuditAction::Overridden {
                    outcome: request.outcome,
                },
                remarks: Some(request.justification),
                at: Utc::now(),
            },
            &prior_application,
            &prior_stages,
        )?;
        info!(
            display_id = %application.display_id,
            checkpoint = stage.checkpoint.label(),
            outcome = request.outcome.label(),
            "stage overridden"
        );

        Ok(self
            .projector
            .snapshot(&application, &stages, Utc::now()))
    }

    /// Read-only audit trail listing.
    pub fn audit_log(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>, ClearanceError> {
        Ok(self.audit.entries(filter)?)
    }

    /// Append the audit entry for a transition the engine has already
    /// committed. The store write and the audit append succeed or fail as a
    /// pair: if the sink refuses the entry, the prior rows are put back and
    /// the caller observes no state change.
    fn audit_committed(
        &self,
        entry: AuditEntry,
        prior_application: &ApplicationRecord,
        prior_stages: &[StageRecord],
    ) -> Result<(), ClearanceError> {
        if let Err(error) = self.audit.append(entry) {
            self.restore_records(prior_application, prior_stages)?;
            return Err(error.into());
        }
        Ok(())
    }

    /// Put the captured application and stage rows back. Runs while the
    /// application lock is still held, so the compare-and-set commits cannot
    /// lose a race with another writer.
    fn restore_records(
        &self,
        application: &ApplicationRecord,
        stages: &[StageRecord],
    ) -> Result<(), StoreError> {
        for prior in stages {
            let current = self
                .store
                .fetch_stage(&prior.id)?
                .ok_or(StoreError::NotFound)?;
            self.store
                .commit_stage(prior.clone(), current.status, current.cycle)?;
        }
        self.store.update_application(application.clone())
    }

    fn fetch_stage(&self, stage_id: &StageId) -> Result<StageRecord, ClearanceError> {
        Ok(self
            .store
            .fetch_stage(stage_id)?
            .ok_or(StoreError::NotFound)?)
    }

    fn snapshot_of(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ClearanceSnapshot, ClearanceError> {
        let application = self
            .store
            .fetch_application(application_id)?
            .ok_or(StoreError::NotFound)?;
        let stages = self.store.stages_for(application_id)?;
        Ok(self
            .projector
            .snapshot(&application, &stages, Utc::now()))
    }
}
