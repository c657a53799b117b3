use std::collections::HashSet;
use std::sync::Mutex;

use super::domain::{ActorIdentity, ApplicationId, CheckpointKind};
use super::store::{ApplicationRecord, StageRecord};

/// Precondition failures raised before any state change is attempted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("actor '{actor_id}' is not authorized for the {required:?} checkpoint")]
    UnauthorizedDepartment {
        actor_id: String,
        required: CheckpointKind,
    },
    #[error("the finance checkpoint can only be advanced by its own actor or a superuser override")]
    FinanceRequiresOwnActor,
    #[error("override requests require superuser capability")]
    NotSuperuser,
    #[error("proof document has not been reviewed in this session")]
    DocumentNotReviewed,
    #[error("remarks are mandatory when rejecting a stage")]
    MissingRemarks,
    #[error("a justification is mandatory for overrides")]
    MissingJustification,
}

/// Session-scoped record of "document opened" events, keyed by actor and
/// application. This is a usability nudge reported by clients, not a
/// persisted audit fact, so it lives in process memory only.
#[derive(Debug, Default)]
pub struct DocumentReviewLedger {
    viewed: Mutex<HashSet<(String, ApplicationId)>>,
}

impl DocumentReviewLedger {
    pub fn mark(&self, actor_id: &str, application_id: ApplicationId) {
        let mut viewed = self
            .viewed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        viewed.insert((actor_id.to_string(), application_id));
    }

    pub fn satisfied(&self, actor_id: &str, application_id: ApplicationId) -> bool {
        let viewed = self
            .viewed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        viewed.contains(&(actor_id.to_string(), application_id))
    }
}

/// Sole entry point validation for departmental actions. The gateway never
/// writes workflow state; it vets the caller and the request, then the
/// service delegates to the transition engine.
#[derive(Debug, Default)]
pub struct ActionGateway {
    ledger: DocumentReviewLedger,
}

impl ActionGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a client-reported "document opened" event for this session.
    pub fn mark_document_viewed(&self, actor: &ActorIdentity, application_id: ApplicationId) {
        self.ledger.mark(&actor.actor_id, application_id);
    }

    /// Actor/checkpoint authorization for ordinary approve/reject calls.
    ///
    /// Superusers may stand in for any department except finance, which only
    /// its own actor may advance through this path; the override controller
    /// is the sanctioned superuser route around it.
    pub fn authorize_action(
        &self,
        actor: &ActorIdentity,
        stage: &StageRecord,
    ) -> Result<(), GatewayError> {
        if stage.checkpoint == CheckpointKind::Finance {
            if actor.department == Some(CheckpointKind::Finance) {
                return Ok(());
            }
            return Err(GatewayError::FinanceRequiresOwnActor);
        }

        if actor.superuser || actor.department == Some(stage.checkpoint) {
            return Ok(());
        }
        Err(GatewayError::UnauthorizedDepartment {
            actor_id: actor.actor_id.clone(),
            required: stage.checkpoint,
        })
    }

    pub fn authorize_override(&self, actor: &ActorIdentity) -> Result<(), GatewayError> {
        if actor.superuser {
            Ok(())
        } else {
            Err(GatewayError::NotSuperuser)
        }
    }

    /// The document-review gate: approving or rejecting an application that
    /// carries a proof document requires at least one "document opened"
    /// event from this actor first.
    pub fn require_document_reviewed(
        &self,
        actor: &ActorIdentity,
        application: &ApplicationRecord,
    ) -> Result<(), GatewayError> {
        if application.proof_document_url.is_none() {
            return Ok(());
        }
        if self.ledger.satisfied(&actor.actor_id, application.id) {
            return Ok(());
        }
        Err(GatewayError::DocumentNotReviewed)
    }

    pub fn require_remarks(&self, remarks: &str) -> Result<(), GatewayError> {
        if remarks.trim().is_empty() {
            return Err(GatewayError::MissingRemarks);
        }
        Ok(())
    }

    pub fn require_justification(&self, justification: &str) -> Result<(), GatewayError> {
        if justification.trim().is_empty() {
            return Err(GatewayError::MissingJustification);
        }
        Ok(())
    }
}
