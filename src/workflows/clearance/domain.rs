use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier wrapper for clearance applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub Uuid);

impl ApplicationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Identifier wrapper for individual stage records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageId(pub Uuid);

impl StageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Admission attributes captured when a student opens a clearance request.
///
/// The hosteller flag drives topology resolution; the proof document URL is
/// supplied by the upstream file-storage collaborator and only gates the
/// document-review check here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionProfile {
    pub student_name: String,
    pub roll_number: String,
    pub programme: String,
    pub hosteller: bool,
    #[serde(default)]
    pub proof_document_url: Option<String>,
}

/// Aggregate status of one clearance application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    InProgress,
    Rejected,
    Completed,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::InProgress => "in_progress",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Completed => "completed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, ApplicationStatus::Completed)
    }
}

/// Status of a single stage within one resubmission cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Locked,
    Pending,
    Approved,
    Rejected,
    Skipped,
}

impl StageStatus {
    pub const fn label(self) -> &'static str {
        match self {
            StageStatus::Locked => "locked",
            StageStatus::Pending => "pending",
            StageStatus::Approved => "approved",
            StageStatus::Rejected => "rejected",
            StageStatus::Skipped => "skipped",
        }
    }

    /// A resolved stage no longer gates its fan-out group.
    pub const fn is_resolved(self) -> bool {
        matches!(self, StageStatus::Approved | StageStatus::Skipped)
    }
}

/// The department/role a stage represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    Dean,
    Library,
    Hostel,
    Sports,
    Lab,
    RecordsOffice,
    Finance,
}

impl CheckpointKind {
    pub const fn label(self) -> &'static str {
        match self {
            CheckpointKind::Dean => "dean",
            CheckpointKind::Library => "library",
            CheckpointKind::Hostel => "hostel",
            CheckpointKind::Sports => "sports",
            CheckpointKind::Lab => "lab",
            CheckpointKind::RecordsOffice => "records_office",
            CheckpointKind::Finance => "finance",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            CheckpointKind::Dean => "Academic Dean",
            CheckpointKind::Library => "Library",
            CheckpointKind::Hostel => "Hostel Office",
            CheckpointKind::Sports => "Sports Office",
            CheckpointKind::Lab => "Laboratories",
            CheckpointKind::RecordsOffice => "Records Office",
            CheckpointKind::Finance => "Finance Office",
        }
    }

    /// Parse the wire label used in headers and route segments.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dean" => Some(CheckpointKind::Dean),
            "library" => Some(CheckpointKind::Library),
            "hostel" => Some(CheckpointKind::Hostel),
            "sports" => Some(CheckpointKind::Sports),
            "lab" | "labs" => Some(CheckpointKind::Lab),
            "records_office" | "records-office" | "records" => Some(CheckpointKind::RecordsOffice),
            "finance" | "accounts" => Some(CheckpointKind::Finance),
            _ => None,
        }
    }
}

/// Caller identity passed explicitly on every gateway call.
///
/// There is deliberately no ambient "current actor" state; the HTTP boundary
/// parses identity headers once and threads this value through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    pub actor_id: String,
    pub department: Option<CheckpointKind>,
    pub superuser: bool,
}

impl ActorIdentity {
    pub fn department_actor(actor_id: impl Into<String>, department: CheckpointKind) -> Self {
        Self {
            actor_id: actor_id.into(),
            department: Some(department),
            superuser: false,
        }
    }

    pub fn superuser(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            department: None,
            superuser: true,
        }
    }

    pub fn student(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            department: None,
            superuser: false,
        }
    }
}

/// Outcome forced by a superuser override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForcedOutcome {
    Approved,
    Rejected,
}

impl ForcedOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            ForcedOutcome::Approved => "approved",
            ForcedOutcome::Rejected => "rejected",
        }
    }
}
