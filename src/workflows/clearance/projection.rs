use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    ApplicationId, ApplicationStatus, CheckpointKind, StageId, StageStatus,
};
use super::store::{ApplicationRecord, StageRecord, StageTransition};

/// One history entry rendered for timelines.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionView {
    pub from: StageStatus,
    pub to: StageStatus,
    pub actor_id: String,
    pub remarks: Option<String>,
    pub forced: bool,
    pub cycle: u32,
    pub at: DateTime<Utc>,
}

/// Read model for one stage, including its full cross-cycle history.
#[derive(Debug, Clone, Serialize)]
pub struct StageView {
    pub stage_id: StageId,
    pub checkpoint: CheckpointKind,
    pub checkpoint_label: &'static str,
    pub status: StageStatus,
    pub status_label: &'static str,
    pub remarks: Option<String>,
    pub acted_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub current: bool,
    pub cycle: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_pending: Option<i64>,
    pub overdue: bool,
    pub history: Vec<TransitionView>,
}

/// Read model for the application header.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub display_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub programme: String,
    pub hosteller: bool,
    pub proof_document_url: Option<String>,
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub current_location: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Point-in-time snapshot returned by detail and timeline endpoints.
///
/// `as_of` is the moment the projection was computed; `poll_staleness_secs`
/// advertises the configured refresh bound so polling consumers can size
/// their interval without a separate config call.
#[derive(Debug, Clone, Serialize)]
pub struct ClearanceSnapshot {
    pub application: ApplicationView,
    pub stages: Vec<StageView>,
    pub as_of: DateTime<Utc>,
    pub poll_staleness_secs: u64,
}

/// Row in a departmental review queue.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewQueueEntry {
    pub application_id: ApplicationId,
    pub display_id: String,
    pub student_name: String,
    pub roll_number: String,
    pub stage: StageView,
}

/// Pure derivation of read-only views from store records. Never mutates
/// state; safe to call concurrently and repeatedly for polling consumers.
#[derive(Debug, Clone, Copy)]
pub struct StatusProjector {
    overdue_after_days: i64,
    poll_staleness_secs: u64,
}

impl StatusProjector {
    pub fn new(overdue_after_days: i64, poll_staleness_secs: u64) -> Self {
        Self {
            overdue_after_days,
            poll_staleness_secs,
        }
    }

    pub fn snapshot(
        &self,
        application: &ApplicationRecord,
        stages: &[StageRecord],
        now: DateTime<Utc>,
    ) -> ClearanceSnapshot {
        let stage_views: Vec<StageView> = stages
            .iter()
            .map(|stage| self.stage_view(stage, application.created_at, now))
            .collect();

        ClearanceSnapshot {
            application: self.application_view(application, stages),
            stages: stage_views,
            as_of: now,
            poll_staleness_secs: self.poll_staleness_secs,
        }
    }

    pub fn queue_entry(
        &self,
        application: &ApplicationRecord,
        stage: &StageRecord,
        now: DateTime<Utc>,
    ) -> ReviewQueueEntry {
        ReviewQueueEntry {
            application_id: application.id,
            display_id: application.display_id.clone(),
            student_name: application.student_name.clone(),
            roll_number: application.roll_number.clone(),
            stage: self.stage_view(stage, application.created_at, now),
        }
    }

    fn application_view(
        &self,
        application: &ApplicationRecord,
        stages: &[StageRecord],
    ) -> ApplicationView {
        ApplicationView {
            application_id: application.id,
            display_id: application.display_id.clone(),
            student_name: application.student_name.clone(),
            roll_number: application.roll_number.clone(),
            programme: application.programme.clone(),
            hosteller: application.hosteller,
            proof_document_url: application.proof_document_url.clone(),
            status: application.status,
            status_label: application.status.label(),
            current_location: current_location(application, stages),
            created_at: application.created_at,
            updated_at: application.updated_at,
        }
    }

    fn stage_view(
        &self,
        stage: &StageRecord,
        application_created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StageView {
        let days_pending = (stage.status == StageStatus::Pending)
            .then(|| now - pending_since(stage, application_created_at))
            .map(|elapsed| elapsed.num_days().max(0));
        let overdue = days_pending.is_some_and(|days| days > self.overdue_after_days);

        StageView {
            stage_id: stage.id,
            checkpoint: stage.checkpoint,
            checkpoint_label: stage.checkpoint.display_name(),
            status: stage.status,
            status_label: stage.status.label(),
            remarks: stage.remarks.clone(),
            acted_by: stage.acted_by.clone(),
            resolved_at: stage.resolved_at,
            current: stage.current,
            cycle: stage.cycle,
            days_pending,
            overdue,
            history: stage.history.iter().map(transition_view).collect(),
        }
    }
}

fn transition_view(transition: &StageTransition) -> TransitionView {
    TransitionView {
        from: transition.from,
        to: transition.to,
        actor_id: transition.actor_id.clone(),
        remarks: transition.remarks.clone(),
        forced: transition.forced,
        cycle: transition.cycle,
        at: transition.at,
    }
}

/// When the stage last became pending in its current cycle; falls back to
/// application creation for stages pending since instantiation.
fn pending_since(stage: &StageRecord, application_created_at: DateTime<Utc>) -> DateTime<Utc> {
    stage
        .history
        .iter()
        .rev()
        .find(|transition| transition.to == StageStatus::Pending)
        .map(|transition| transition.at)
        .unwrap_or(application_created_at)
}

/// Human-readable "where is this application right now" label.
fn current_location(application: &ApplicationRecord, stages: &[StageRecord]) -> String {
    match application.status {
        ApplicationStatus::Completed => "Completed".to_string(),
        ApplicationStatus::Rejected => stages
            .iter()
            .find(|stage| stage.status == StageStatus::Rejected)
            .map(|stage| format!("Rejected at {}", stage.checkpoint.display_name()))
            .unwrap_or_else(|| "Rejected".to_string()),
        ApplicationStatus::Pending | ApplicationStatus::InProgress => {
            let awaiting: Vec<&str> = stages
                .iter()
                .filter(|stage| stage.status == StageStatus::Pending)
                .map(|stage| stage.checkpoint.display_name())
                .collect();
            if awaiting.is_empty() {
                "Awaiting initiation".to_string()
            } else {
                format!("Awaiting {}", awaiting.join(", "))
            }
        }
    }
}
