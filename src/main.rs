use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use nodues::config::AppConfig;
use nodues::error::AppError;
use nodues::telemetry;
use nodues::workflows::clearance::{
    clearance_router, ActorIdentity, AdmissionProfile, CheckpointKind, ClearanceService,
    ClearanceSnapshot, MemoryAuditLog, MemoryStore, ResubmissionUpdate, StageStatus,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "No-Dues Clearance Service",
    about = "Run the student no-dues clearance workflow engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Walk a sample application through the full clearance flow
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug, Default)]
struct DemoArgs {
    /// Run the day-scholar variant (hostel checkpoint is skipped)
    #[arg(long)]
    day_scholar: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let service = Arc::new(ClearanceService::new(store, audit, &config.workflow));

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(clearance_router(service))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "no-dues clearance service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let store = Arc::new(MemoryStore::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let service = Arc::new(ClearanceService::new(store, audit, &config.workflow));

    let snapshot = drive_sample_flow(&service, !args.day_scholar)?;
    render_snapshot(&snapshot);
    Ok(())
}

/// Push one sample application through every transition the engine supports:
/// dean initiation, the departmental fan-out with one rejection and a
/// resubmission, and the finance merge.
fn drive_sample_flow(
    service: &ClearanceService<MemoryStore, MemoryAuditLog>,
    hosteller: bool,
) -> Result<ClearanceSnapshot, AppError> {
    let snapshot = service.create_application(AdmissionProfile {
        student_name: "Asha Verma".to_string(),
        roll_number: "2022-CSE-014".to_string(),
        programme: "B.Tech CSE".to_string(),
        hosteller,
        proof_document_url: Some("https://files.example.edu/nodues/2022-CSE-014.pdf".to_string()),
    })?;
    let application_id = snapshot.application.application_id;

    let stage_id = |snapshot: &ClearanceSnapshot, kind: CheckpointKind| {
        snapshot
            .stages
            .iter()
            .find(|stage| stage.checkpoint == kind)
            .map(|stage| stage.stage_id)
    };

    let approve = |department: CheckpointKind,
                   snapshot: &ClearanceSnapshot|
     -> Result<ClearanceSnapshot, AppError> {
        let actor =
            ActorIdentity::department_actor(format!("{}-desk", department.label()), department);
        let id = stage_id(snapshot, department).expect("checkpoint present in demo topology");
        service.mark_document_viewed(&actor, &application_id)?;
        Ok(service.approve_stage(&actor, &id, None)?)
    };

    let mut snapshot = approve(CheckpointKind::Dean, &snapshot)?;
    snapshot = approve(CheckpointKind::Library, &snapshot)?;

    if hosteller {
        // Hostel turns the student away once, then clears the resubmission.
        let hostel_actor = ActorIdentity::department_actor("hostel-desk", CheckpointKind::Hostel);
        let hostel_id =
            stage_id(&snapshot, CheckpointKind::Hostel).expect("hostel stage present for hostellers");
        service.mark_document_viewed(&hostel_actor, &application_id)?;
        service.reject_stage(&hostel_actor, &hostel_id, "ID card not returned".to_string())?;
        let student = ActorIdentity::student("2022-CSE-014");
        snapshot = service.resubmit_application(
            &student,
            &application_id,
            ResubmissionUpdate::default(),
        )?;
        snapshot = approve(CheckpointKind::Hostel, &snapshot)?;
    }

    snapshot = approve(CheckpointKind::Sports, &snapshot)?;
    snapshot = approve(CheckpointKind::Lab, &snapshot)?;
    snapshot = approve(CheckpointKind::RecordsOffice, &snapshot)?;
    snapshot = approve(CheckpointKind::Finance, &snapshot)?;

    Ok(snapshot)
}

fn render_snapshot(snapshot: &ClearanceSnapshot) {
    println!("No-dues clearance demo");
    println!(
        "{} ({}) | {}",
        snapshot.application.student_name,
        snapshot.application.display_id,
        snapshot.application.current_location
    );
    println!("Status: {}", snapshot.application.status_label);

    println!("\nStages");
    for stage in &snapshot.stages {
        let resolution = match stage.resolved_at {
            Some(at) => format!(" at {}", at.format("%Y-%m-%d %H:%M:%S")),
            None => String::new(),
        };
        println!(
            "- {} | {}{} | cycle {}",
            stage.checkpoint_label, stage.status_label, resolution, stage.cycle
        );
        for transition in &stage.history {
            let remarks = transition
                .remarks
                .as_deref()
                .map(|text| format!(" ({text})"))
                .unwrap_or_default();
            println!(
                "    {} -> {} by {}{}",
                transition.from.label(),
                transition.to.label(),
                transition.actor_id,
                remarks
            );
        }
    }

    let skipped = snapshot
        .stages
        .iter()
        .filter(|stage| stage.status == StageStatus::Skipped)
        .count();
    if skipped > 0 {
        println!("\n{skipped} checkpoint(s) skipped as inapplicable");
    }
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodues::config::WorkflowConfig;
    use nodues::workflows::clearance::ApplicationStatus;

    fn demo_service() -> Arc<ClearanceService<MemoryStore, MemoryAuditLog>> {
        let config = WorkflowConfig {
            overdue_after_days: 3,
            poll_staleness_secs: 30,
        };
        Arc::new(ClearanceService::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryAuditLog::new()),
            &config,
        ))
    }

    #[test]
    fn demo_flow_completes_for_hostellers() {
        let service = demo_service();
        let snapshot = drive_sample_flow(&service, true).expect("demo flow completes");
        assert_eq!(snapshot.application.status, ApplicationStatus::Completed);
        assert!(snapshot
            .stages
            .iter()
            .all(|stage| stage.status.is_resolved()));
    }

    #[test]
    fn demo_flow_skips_hostel_for_day_scholars() {
        let service = demo_service();
        let snapshot = drive_sample_flow(&service, false).expect("demo flow completes");
        assert_eq!(snapshot.application.status, ApplicationStatus::Completed);
        let hostel = snapshot
            .stages
            .iter()
            .find(|stage| stage.checkpoint == CheckpointKind::Hostel)
            .expect("hostel stage instantiated");
        assert_eq!(hostel.status, StageStatus::Skipped);
    }
}
