use crate::workflows::clearance::domain::{ActorIdentity, CheckpointKind, StageStatus};
use crate::workflows::clearance::gateway::GatewayError;
use crate::workflows::clearance::service::ClearanceError;

use super::common::*;

#[test]
fn department_mismatch_is_an_authorization_error() {
    let (_, _, service) = build_service();
    let (application_id, snapshot) = application_past_dean(&service, hosteller_profile());
    let sports_id = stage_id_for(&snapshot, CheckpointKind::Sports);

    let library_actor = department_actor(CheckpointKind::Library);
    service
        .mark_document_viewed(&library_actor, &application_id)
        .expect("review mark records");
    match service.approve_stage(&library_actor, &sports_id, None) {
        Err(ClearanceError::Gateway(GatewayError::UnauthorizedDepartment {
            required: CheckpointKind::Sports,
            ..
        })) => {}
        other => panic!("expected authorization error, got {other:?}"),
    }
}

#[test]
fn superuser_may_stand_in_for_ordinary_departments() {
    let (_, _, service) = build_service();
    let (application_id, snapshot) = application_past_dean(&service, hosteller_profile());

    let root = ActorIdentity::superuser("registrar");
    service
        .mark_document_viewed(&root, &application_id)
        .expect("review mark records");
    let snapshot = service
        .approve_stage(&root, &stage_id_for(&snapshot, CheckpointKind::Library), None)
        .expect("superuser approval succeeds");

    let library = snapshot
        .stages
        .iter()
        .find(|stage| stage.checkpoint == CheckpointKind::Library)
        .expect("library present");
    assert_eq!(library.status, StageStatus::Approved);
}

#[test]
fn finance_rejects_everyone_but_its_own_actor() {
    let (_, _, service) = build_service();
    let (application_id, snapshot) = application_at_finance(&service, hosteller_profile());
    let finance_id = stage_id_for(&snapshot, CheckpointKind::Finance);

    // Even a superuser must go through the override path for finance.
    let root = ActorIdentity::superuser("registrar");
    service
        .mark_document_viewed(&root, &application_id)
        .expect("review mark records");
    match service.approve_stage(&root, &finance_id, None) {
        Err(ClearanceError::Gateway(GatewayError::FinanceRequiresOwnActor)) => {}
        other => panic!("expected finance-actor error, got {other:?}"),
    }

    let snapshot = approve_checkpoint(&service, application_id, &snapshot, CheckpointKind::Finance);
    assert_eq!(
        snapshot.application.status,
        crate::workflows::clearance::domain::ApplicationStatus::Completed
    );
}

#[test]
fn document_gate_blocks_until_the_proof_is_opened() {
    let (_, _, service) = build_service();
    let snapshot = service
        .create_application(hosteller_profile())
        .expect("application opens");
    let application_id = snapshot.application.application_id;
    let dean_id = stage_id_for(&snapshot, CheckpointKind::Dean);
    let dean = department_actor(CheckpointKind::Dean);

    match service.approve_stage(&dean, &dean_id, None) {
        Err(ClearanceError::Gateway(GatewayError::DocumentNotReviewed)) => {}
        other => panic!("expected document-gate error, got {other:?}"),
    }

    // No side effect: the stage is still pending.
    let detail = service
        .application_detail(&application_id)
        .expect("detail loads");
    let stage = detail
        .stages
        .iter()
        .find(|stage| stage.checkpoint == CheckpointKind::Dean)
        .expect("dean present");
    assert_eq!(stage.status, StageStatus::Pending);

    service
        .mark_document_viewed(&dean, &application_id)
        .expect("review mark records");
    service
        .approve_stage(&dean, &dean_id, None)
        .expect("approval succeeds once reviewed");
}

#[test]
fn document_gate_is_per_actor() {
    let (_, _, service) = build_service();
    let (application_id, snapshot) = application_past_dean(&service, hosteller_profile());
    let library_id = stage_id_for(&snapshot, CheckpointKind::Library);

    // The dean's review does not satisfy the library actor's gate.
    let library_actor = department_actor(CheckpointKind::Library);
    match service.approve_stage(&library_actor, &library_id, None) {
        Err(ClearanceError::Gateway(GatewayError::DocumentNotReviewed)) => {}
        other => panic!("expected document-gate error, got {other:?}"),
    }
}

#[test]
fn applications_without_documents_skip_the_gate() {
    let (_, _, service) = build_service();
    let snapshot = service
        .create_application(undocumented_profile())
        .expect("application opens");
    let dean = department_actor(CheckpointKind::Dean);

    service
        .approve_stage(&dean, &stage_id_for(&snapshot, CheckpointKind::Dean), None)
        .expect("no gate without a proof document");
}

#[test]
fn reject_without_remarks_is_refused() {
    let (_, _, service) = build_service();
    let (application_id, snapshot) = application_past_dean(&service, hosteller_profile());
    let hostel_id = stage_id_for(&snapshot, CheckpointKind::Hostel);
    let hostel_actor = department_actor(CheckpointKind::Hostel);
    service
        .mark_document_viewed(&hostel_actor, &application_id)
        .expect("review mark records");

    for empty in ["", "   "] {
        match service.reject_stage(&hostel_actor, &hostel_id, empty.to_string()) {
            Err(ClearanceError::Gateway(GatewayError::MissingRemarks)) => {}
            other => panic!("expected missing-remarks error, got {other:?}"),
        }
    }

    let detail = service
        .application_detail(&application_id)
        .expect("detail loads");
    let hostel = detail
        .stages
        .iter()
        .find(|stage| stage.checkpoint == CheckpointKind::Hostel)
        .expect("hostel present");
    assert_eq!(hostel.status, StageStatus::Pending);
}

#[test]
fn approve_never_requires_remarks() {
    let (_, _, service) = build_service();
    let (application_id, snapshot) = application_past_dean(&service, hosteller_profile());
    let snapshot = approve_checkpoint(&service, application_id, &snapshot, CheckpointKind::Library);
    let library = snapshot
        .stages
        .iter()
        .find(|stage| stage.checkpoint == CheckpointKind::Library)
        .expect("library present");
    assert_eq!(library.status, StageStatus::Approved);
    assert!(library.remarks.is_none());
}
