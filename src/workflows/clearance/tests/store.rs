use chrono::Utc;

use crate::workflows::clearance::domain::{
    ApplicationId, ApplicationStatus, CheckpointKind, StageId, StageStatus,
};
use crate::workflows::clearance::store::{
    ApplicationRecord, ClearanceStore, MemoryStore, StageRecord, StoreError,
};

fn seeded_store() -> (MemoryStore, StageRecord) {
    let store = MemoryStore::new();
    let now = Utc::now();
    let application = ApplicationRecord {
        id: ApplicationId::generate(),
        display_id: "NOC-2025-0042".to_string(),
        student_name: "Asha Verma".to_string(),
        roll_number: "2022-CSE-014".to_string(),
        programme: "B.Tech CSE".to_string(),
        hosteller: true,
        proof_document_url: Some("https://files.example.edu/noc/asha.pdf".to_string()),
        status: ApplicationStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    let stage = StageRecord {
        id: StageId::generate(),
        application_id: application.id,
        group: 0,
        checkpoint: CheckpointKind::Dean,
        status: StageStatus::Pending,
        remarks: None,
        acted_by: None,
        resolved_at: None,
        current: true,
        cycle: 1,
        history: Vec::new(),
    };
    store
        .insert_application(application, vec![stage.clone()])
        .unwrap();
    (store, stage)
}

fn approved_by(desk: &str, stage: &StageRecord) -> StageRecord {
    let mut committed = stage.clone();
    committed.status = StageStatus::Approved;
    committed.acted_by = Some(desk.to_string());
    committed.resolved_at = Some(Utc::now());
    committed.current = false;
    committed
}

#[test]
fn commit_with_a_stale_status_is_refused_and_writes_nothing() {
    let (store, stage) = seeded_store();

    let result = store.commit_stage(
        approved_by("dean-desk", &stage),
        StageStatus::Locked,
        stage.cycle,
    );
    assert!(matches!(result, Err(StoreError::Conflict)));

    let stored = store.fetch_stage(&stage.id).unwrap().unwrap();
    assert_eq!(stored.status, StageStatus::Pending);
    assert_eq!(stored.acted_by, None);
    assert_eq!(stored.resolved_at, None);
    assert!(stored.current);
}

#[test]
fn second_commit_against_the_same_cycle_loses_the_race() {
    let (store, stage) = seeded_store();

    store
        .commit_stage(
            approved_by("dean-desk", &stage),
            StageStatus::Pending,
            stage.cycle,
        )
        .unwrap();

    let mut rejected = stage.clone();
    rejected.status = StageStatus::Rejected;
    rejected.acted_by = Some("dean-backup".to_string());
    rejected.remarks = Some("library dues outstanding".to_string());
    let result = store.commit_stage(rejected, StageStatus::Pending, stage.cycle);
    assert!(matches!(result, Err(StoreError::Conflict)));

    let stored = store.fetch_stage(&stage.id).unwrap().unwrap();
    assert_eq!(stored.status, StageStatus::Approved);
    assert_eq!(stored.acted_by.as_deref(), Some("dean-desk"));
    assert_eq!(stored.remarks, None);
}

#[test]
fn commit_with_a_stale_cycle_is_refused() {
    let (store, stage) = seeded_store();

    let result = store.commit_stage(
        approved_by("dean-desk", &stage),
        StageStatus::Pending,
        stage.cycle + 1,
    );
    assert!(matches!(result, Err(StoreError::Conflict)));

    let stored = store.fetch_stage(&stage.id).unwrap().unwrap();
    assert_eq!(stored.status, StageStatus::Pending);
    assert_eq!(stored.cycle, 1);
}
