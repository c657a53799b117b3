use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::audit::{AuditFilter, AuditLog};
use super::domain::{ActorIdentity, AdmissionProfile, ApplicationId, CheckpointKind, StageId};
use super::engine::{ResubmissionUpdate, TransitionError};
use super::gateway::GatewayError;
use super::overrides::OverrideRequest;
use super::service::{ClearanceError, ClearanceService};
use super::store::{ClearanceStore, StoreError};

/// Router builder exposing the clearance workflow endpoints.
pub fn clearance_router<S, L>(service: Arc<ClearanceService<S, L>>) -> Router
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    Router::new()
        .route(
            "/api/v1/clearance/applications",
            post(create_application_handler::<S, L>),
        )
        .route(
            "/api/v1/clearance/applications/:application_id",
            get(detail_handler::<S, L>),
        )
        .route(
            "/api/v1/clearance/applications/:application_id/timeline",
            get(timeline_handler::<S, L>),
        )
        .route(
            "/api/v1/clearance/applications/:application_id/resubmit",
            post(resubmit_handler::<S, L>),
        )
        .route(
            "/api/v1/clearance/applications/:application_id/document-viewed",
            post(document_viewed_handler::<S, L>),
        )
        .route(
            "/api/v1/clearance/departments/:department/pending",
            get(pending_handler::<S, L>),
        )
        .route(
            "/api/v1/clearance/stages/:stage_id/approve",
            post(approve_handler::<S, L>),
        )
        .route(
            "/api/v1/clearance/stages/:stage_id/reject",
            post(reject_handler::<S, L>),
        )
        .route(
            "/api/v1/clearance/stages/:stage_id/override",
            post(override_handler::<S, L>),
        )
        .route("/api/v1/clearance/audit", get(audit_handler::<S, L>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct ApproveBody {
    #[serde(default)]
    remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RejectBody {
    #[serde(default)]
    remarks: String,
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    #[serde(default)]
    application_id: Option<Uuid>,
    #[serde(default)]
    actor_id: Option<String>,
}

/// Parse the explicit caller identity from request headers. Credential
/// verification happens upstream; these headers are what the auth
/// collaborator forwards once the bearer token has been accepted.
fn actor_from_headers(headers: &HeaderMap) -> Result<ActorIdentity, Response> {
    let actor_id = headers
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            error_payload(
                StatusCode::UNAUTHORIZED,
                "authorization",
                "missing x-actor-id header",
            )
        })?
        .to_string();

    let department = match headers.get("x-actor-department") {
        None => None,
        Some(value) => {
            let raw = value.to_str().map_err(|_| {
                error_payload(
                    StatusCode::BAD_REQUEST,
                    "validation",
                    "x-actor-department is not valid UTF-8",
                )
            })?;
            Some(CheckpointKind::parse(raw).ok_or_else(|| {
                error_payload(
                    StatusCode::BAD_REQUEST,
                    "validation",
                    "unknown department in x-actor-department",
                )
            })?)
        }
    };

    let superuser = headers
        .get("x-actor-superuser")
        .and_then(|value| value.to_str().ok())
        .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    Ok(ActorIdentity {
        actor_id,
        department,
        superuser,
    })
}

fn parse_application_id(raw: &str) -> Result<ApplicationId, Response> {
    Uuid::parse_str(raw).map(ApplicationId).map_err(|_| {
        error_payload(
            StatusCode::BAD_REQUEST,
            "validation",
            "application id is not a valid UUID",
        )
    })
}

fn parse_stage_id(raw: &str) -> Result<StageId, Response> {
    Uuid::parse_str(raw).map(StageId).map_err(|_| {
        error_payload(
            StatusCode::BAD_REQUEST,
            "validation",
            "stage id is not a valid UUID",
        )
    })
}

fn error_payload(status: StatusCode, kind: &str, message: &str) -> Response {
    (status, axum::Json(json!({ "kind": kind, "error": message }))).into_response()
}

/// Map service errors onto the wire taxonomy: validation 422, authorization
/// 403, invalid transition 409, unsatisfied gate 428, busy 503 (retryable),
/// topology bug 500, missing record 404.
fn error_response(error: ClearanceError) -> Response {
    let (status, kind) = match &error {
        ClearanceError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        ClearanceError::Gateway(GatewayError::DocumentNotReviewed) => {
            (StatusCode::PRECONDITION_REQUIRED, "gate_not_satisfied")
        }
        ClearanceError::Gateway(
            GatewayError::MissingRemarks | GatewayError::MissingJustification,
        ) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
        ClearanceError::Gateway(_) => (StatusCode::FORBIDDEN, "authorization"),
        ClearanceError::Transition(TransitionError::Store(StoreError::NotFound)) => {
            (StatusCode::NOT_FOUND, "not_found")
        }
        ClearanceError::Transition(TransitionError::Store(StoreError::Conflict)) => {
            (StatusCode::CONFLICT, "conflict")
        }
        ClearanceError::Transition(TransitionError::Store(_)) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
        ClearanceError::Transition(_) => (StatusCode::CONFLICT, "invalid_transition"),
        ClearanceError::Topology(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration"),
        ClearanceError::OverridePolicy(_) => (StatusCode::FORBIDDEN, "authorization"),
        ClearanceError::Busy(_) => (StatusCode::SERVICE_UNAVAILABLE, "busy"),
        ClearanceError::Store(StoreError::NotFound) => (StatusCode::NOT_FOUND, "not_found"),
        ClearanceError::Store(StoreError::Conflict) => (StatusCode::CONFLICT, "conflict"),
        ClearanceError::Store(_) | ClearanceError::Audit(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    (
        status,
        axum::Json(json!({ "kind": kind, "error": error.to_string() })),
    )
        .into_response()
}

async fn create_application_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    axum::Json(profile): axum::Json<AdmissionProfile>,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    match service.create_application(profile) {
        Ok(snapshot) => (StatusCode::CREATED, axum::Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn detail_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    let id = match parse_application_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.application_detail(&id) {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn timeline_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    Path(application_id): Path<String>,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    let id = match parse_application_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    match service.status_timeline(&id) {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn resubmit_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
    axum::Json(update): axum::Json<ResubmissionUpdate>,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    let id = match parse_application_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.resubmit_application(&actor, &id, update) {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn document_viewed_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    Path(application_id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    let id = match parse_application_id(&application_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.mark_document_viewed(&actor, &id) {
        Ok(()) => (
            StatusCode::OK,
            axum::Json(json!({ "status": "document review recorded" })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

async fn pending_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    Path(department): Path<String>,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    let department = match CheckpointKind::parse(&department) {
        Some(department) => department,
        None => {
            return error_payload(StatusCode::BAD_REQUEST, "validation", "unknown department")
        }
    };
    match service.list_pending(department) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn approve_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    Path(stage_id): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<ApproveBody>,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    let id = match parse_stage_id(&stage_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.approve_stage(&actor, &id, body.remarks) {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn reject_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    Path(stage_id): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<RejectBody>,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    let id = match parse_stage_id(&stage_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.reject_stage(&actor, &id, body.remarks) {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn override_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    Path(stage_id): Path<String>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<OverrideRequest>,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    let id = match parse_stage_id(&stage_id) {
        Ok(id) => id,
        Err(response) => return response,
    };
    let actor = match actor_from_headers(&headers) {
        Ok(actor) => actor,
        Err(response) => return response,
    };
    match service.override_stage(&actor, &id, request) {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn audit_handler<S, L>(
    State(service): State<Arc<ClearanceService<S, L>>>,
    Query(query): Query<AuditQuery>,
) -> Response
where
    S: ClearanceStore + 'static,
    L: AuditLog + 'static,
{
    let filter = AuditFilter {
        application_id: query.application_id.map(ApplicationId),
        actor_id: query.actor_id,
    };
    match service.audit_log(&filter) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}
