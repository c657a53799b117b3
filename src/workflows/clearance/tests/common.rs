use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;

use crate::config::WorkflowConfig;
use crate::workflows::clearance::audit::MemoryAuditLog;
use crate::workflows::clearance::domain::{
    ActorIdentity, AdmissionProfile, ApplicationId, CheckpointKind, StageId,
};
use crate::workflows::clearance::projection::ClearanceSnapshot;
use crate::workflows::clearance::service::ClearanceService;
use crate::workflows::clearance::store::MemoryStore;

pub(super) type TestService = ClearanceService<MemoryStore, MemoryAuditLog>;

pub(super) fn workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        overdue_after_days: 3,
        poll_staleness_secs: 30,
    }
}

pub(super) fn build_service() -> (Arc<MemoryStore>, Arc<MemoryAuditLog>, TestService) {
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let service = ClearanceService::new(store.clone(), audit.clone(), &workflow_config());
    (store, audit, service)
}

pub(super) fn hosteller_profile() -> AdmissionProfile {
    AdmissionProfile {
        student_name: "Asha Verma".to_string(),
        roll_number: "2022-CSE-014".to_string(),
        programme: "B.Tech CSE".to_string(),
        hosteller: true,
        proof_document_url: Some(
            "https://files.example.edu/nodues/2022-CSE-014.pdf".to_string(),
        ),
    }
}

pub(super) fn day_scholar_profile() -> AdmissionProfile {
    AdmissionProfile {
        student_name: "Rohan Iyer".to_string(),
        roll_number: "2022-ME-131".to_string(),
        programme: "B.Tech ME".to_string(),
        hosteller: false,
        proof_document_url: Some(
            "https://files.example.edu/nodues/2022-ME-131.pdf".to_string(),
        ),
    }
}

/// Profile without an attached proof document, so the review gate is moot.
pub(super) fn undocumented_profile() -> AdmissionProfile {
    AdmissionProfile {
        student_name: "Meera Pillai".to_string(),
        roll_number: "2021-EE-042".to_string(),
        programme: "B.Tech EE".to_string(),
        hosteller: false,
        proof_document_url: None,
    }
}

pub(super) fn department_actor(department: CheckpointKind) -> ActorIdentity {
    ActorIdentity::department_actor(format!("{}-desk", department.label()), department)
}

pub(super) fn stage_id_for(snapshot: &ClearanceSnapshot, kind: CheckpointKind) -> StageId {
    snapshot
        .stages
        .iter()
        .find(|stage| stage.checkpoint == kind)
        .map(|stage| stage.stage_id)
        .expect("checkpoint present in snapshot")
}

/// Approve one checkpoint after satisfying the document gate for its actor.
pub(super) fn approve_checkpoint(
    service: &TestService,
    application_id: ApplicationId,
    snapshot: &ClearanceSnapshot,
    kind: CheckpointKind,
) -> ClearanceSnapshot {
    let actor = department_actor(kind);
    service
        .mark_document_viewed(&actor, &application_id)
        .expect("application exists for review mark");
    service
        .approve_stage(&actor, &stage_id_for(snapshot, kind), None)
        .expect("approval succeeds")
}

/// Walk a fresh application up to an unlocked fan-out group.
pub(super) fn application_past_dean(
    service: &TestService,
    profile: AdmissionProfile,
) -> (ApplicationId, ClearanceSnapshot) {
    let snapshot = service
        .create_application(profile)
        .expect("application opens");
    let application_id = snapshot.application.application_id;
    let snapshot = approve_checkpoint(service, application_id, &snapshot, CheckpointKind::Dean);
    (application_id, snapshot)
}

/// Resolve the entire fan-out group, leaving finance pending.
pub(super) fn application_at_finance(
    service: &TestService,
    profile: AdmissionProfile,
) -> (ApplicationId, ClearanceSnapshot) {
    let hosteller = profile.hosteller;
    let (application_id, mut snapshot) = application_past_dean(service, profile);
    for kind in [
        CheckpointKind::Library,
        CheckpointKind::Hostel,
        CheckpointKind::Sports,
        CheckpointKind::Lab,
        CheckpointKind::RecordsOffice,
    ] {
        if kind == CheckpointKind::Hostel && !hosteller {
            continue;
        }
        snapshot = approve_checkpoint(service, application_id, &snapshot, kind);
    }
    (application_id, snapshot)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is JSON")
}
