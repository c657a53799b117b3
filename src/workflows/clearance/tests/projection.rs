use chrono::{Duration, Utc};

use crate::workflows::clearance::domain::{
    ApplicationId, ApplicationStatus, CheckpointKind, StageId, StageStatus,
};
use crate::workflows::clearance::projection::StatusProjector;
use crate::workflows::clearance::store::{ApplicationRecord, StageRecord, StageTransition};

use super::common::*;

fn application_record(status: ApplicationStatus) -> ApplicationRecord {
    let now = Utc::now();
    ApplicationRecord {
        id: ApplicationId::generate(),
        display_id: "NOD-000101".to_string(),
        student_name: "Asha Verma".to_string(),
        roll_number: "2022-CSE-014".to_string(),
        programme: "B.Tech CSE".to_string(),
        hosteller: true,
        proof_document_url: None,
        status,
        created_at: now - Duration::days(10),
        updated_at: now,
    }
}

fn stage_record(
    application: &ApplicationRecord,
    checkpoint: CheckpointKind,
    status: StageStatus,
) -> StageRecord {
    StageRecord {
        id: StageId::generate(),
        application_id: application.id,
        group: 1,
        checkpoint,
        status,
        remarks: None,
        acted_by: None,
        resolved_at: None,
        current: status == StageStatus::Pending,
        cycle: 1,
        history: Vec::new(),
    }
}

#[test]
fn days_pending_counts_from_the_last_reopen() {
    let projector = StatusProjector::new(3, 30);
    let application = application_record(ApplicationStatus::InProgress);
    let now = Utc::now();

    let mut stage = stage_record(&application, CheckpointKind::Library, StageStatus::Pending);
    stage.history.push(StageTransition {
        from: StageStatus::Locked,
        to: StageStatus::Pending,
        actor_id: "system".to_string(),
        remarks: None,
        forced: false,
        cycle: 1,
        at: now - Duration::days(5),
    });

    let snapshot = projector.snapshot(&application, &[stage], now);
    let view = &snapshot.stages[0];
    assert_eq!(view.days_pending, Some(5));
    assert!(view.overdue, "5 days pending exceeds a 3 day threshold");
}

#[test]
fn stages_pending_since_creation_fall_back_to_the_application_clock() {
    let projector = StatusProjector::new(30, 30);
    let application = application_record(ApplicationStatus::Pending);
    let stage = stage_record(&application, CheckpointKind::Dean, StageStatus::Pending);
    let now = Utc::now();

    let snapshot = projector.snapshot(&application, &[stage], now);
    let view = &snapshot.stages[0];
    assert_eq!(view.days_pending, Some(10));
    assert!(!view.overdue, "10 days is inside a 30 day threshold");
}

#[test]
fn resolved_stages_report_no_pending_duration() {
    let projector = StatusProjector::new(3, 30);
    let application = application_record(ApplicationStatus::InProgress);
    let stage = stage_record(&application, CheckpointKind::Library, StageStatus::Approved);

    let snapshot = projector.snapshot(&application, &[stage], Utc::now());
    let view = &snapshot.stages[0];
    assert_eq!(view.days_pending, None);
    assert!(!view.overdue);
}

#[test]
fn current_location_names_the_awaiting_checkpoints() {
    let projector = StatusProjector::new(3, 30);
    let application = application_record(ApplicationStatus::InProgress);
    let stages = vec![
        stage_record(&application, CheckpointKind::Library, StageStatus::Pending),
        stage_record(&application, CheckpointKind::Sports, StageStatus::Pending),
        stage_record(&application, CheckpointKind::Hostel, StageStatus::Skipped),
    ];

    let snapshot = projector.snapshot(&application, &stages, Utc::now());
    assert_eq!(
        snapshot.application.current_location,
        "Awaiting Library, Sports Office"
    );
}

#[test]
fn current_location_reports_rejection_and_completion() {
    let projector = StatusProjector::new(3, 30);

    let rejected = application_record(ApplicationStatus::Rejected);
    let stages = vec![stage_record(
        &rejected,
        CheckpointKind::Hostel,
        StageStatus::Rejected,
    )];
    let snapshot = projector.snapshot(&rejected, &stages, Utc::now());
    assert_eq!(
        snapshot.application.current_location,
        "Rejected at Hostel Office"
    );

    let completed = application_record(ApplicationStatus::Completed);
    let snapshot = projector.snapshot(&completed, &[], Utc::now());
    assert_eq!(snapshot.application.current_location, "Completed");
}

#[test]
fn snapshots_stamp_their_own_as_of_instant() {
    let projector = StatusProjector::new(3, 30);
    let application = application_record(ApplicationStatus::InProgress);
    let now = Utc::now();

    let snapshot = projector.snapshot(&application, &[], now);
    assert_eq!(snapshot.as_of, now);
}

#[test]
fn snapshots_advertise_the_polling_staleness_bound() {
    let projector = StatusProjector::new(3, 45);
    let application = application_record(ApplicationStatus::InProgress);

    let snapshot = projector.snapshot(&application, &[], Utc::now());
    assert_eq!(snapshot.poll_staleness_secs, 45);
}

#[test]
fn review_queue_entries_carry_the_student_header() {
    let (_, _, service) = build_service();
    let (_, _snapshot) = application_past_dean(&service, hosteller_profile());

    let queue = service
        .list_pending(CheckpointKind::Library)
        .expect("queue loads");
    assert_eq!(queue.len(), 1);
    let entry = &queue[0];
    assert_eq!(entry.student_name, "Asha Verma");
    assert_eq!(entry.stage.checkpoint, CheckpointKind::Library);
    assert!(entry.stage.current);
}

#[test]
fn rejected_applications_leave_department_queues() {
    let (_, _, service) = build_service();
    let (application_id, snapshot) = application_past_dean(&service, hosteller_profile());

    let hostel_actor = department_actor(CheckpointKind::Hostel);
    service
        .mark_document_viewed(&hostel_actor, &application_id)
        .expect("review mark records");
    service
        .reject_stage(
            &hostel_actor,
            &stage_id_for(&snapshot, CheckpointKind::Hostel),
            "ID card not returned".to_string(),
        )
        .expect("rejection succeeds");

    let queue = service
        .list_pending(CheckpointKind::Library)
        .expect("queue loads");
    assert!(queue.is_empty(), "frozen applications are not actionable");
}
