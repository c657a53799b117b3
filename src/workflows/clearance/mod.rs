//! Student no-dues clearance workflow engine.
//!
//! The flow is a fixed sequence of checkpoint groups: dean initiation, a
//! parallel departmental fan-out, then the finance office. The transition
//! engine owns all status movement; the gateway vets actors and
//! preconditions, the override controller serializes privileged forced
//! transitions, and the projector derives read-only snapshots for clients.

pub mod audit;
pub mod domain;
pub mod engine;
pub mod gateway;
pub mod overrides;
pub mod projection;
pub mod router;
pub mod service;
pub mod store;
pub mod topology;

#[cfg(test)]
mod tests;

pub use audit::{AuditAction, AuditEntry, AuditFilter, AuditLog, MemoryAuditLog};
pub use domain::{
    ActorIdentity, AdmissionProfile, ApplicationId, ApplicationStatus, CheckpointKind,
    ForcedOutcome, StageId, StageStatus,
};
pub use engine::{ResubmissionUpdate, TransitionEngine, TransitionError};
pub use gateway::{ActionGateway, GatewayError};
pub use overrides::{BusyError, OverridePolicyError, OverrideRequest};
pub use projection::{ApplicationView, ClearanceSnapshot, ReviewQueueEntry, StageView};
pub use router::clearance_router;
pub use service::{ClearanceError, ClearanceService};
pub use store::{
    ApplicationRecord, ClearanceStore, MemoryStore, StageRecord, StageTransition, StoreError,
};
pub use topology::{StageTopology, TopologyError};
