pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "DevCrew API",
        version = "0.1.0",
        description = "Plan, run and export the work of an eight-member AI software team"
    ),
    paths(
        routes::health_check,
        routes::service_info,
        routes::team_status,
        routes::list_workers,
        routes::get_project_summary,
        routes::get_project_state,
        routes::reset_project,
        routes::export_project,
        routes::orchestrate,
        routes::sse::events_stream,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::ServiceInfo,
        routes::TeamStatus,
        routes::ModeInfo,
        routes::WorkersResponse,
        routes::ResetResponse,
        routes::ExportRequest,
        routes::OrchestrateRequest,
        routes::OrchestrateResponse,
        error::ErrorResponse,
        state::ServicesStatus,
        devcrew_core::ProjectState,
        devcrew_core::ProjectSummary,
        devcrew_core::Plan,
        devcrew_core::Step,
        devcrew_core::Complexity,
        devcrew_core::ExecutionMode,
        devcrew_core::WorkerKind,
        devcrew_core::ExecutionLedger,
        devcrew_core::StepResult,
        devcrew_core::StepOutcome,
        orchestrator::WorkerInfo,
        orchestrator::ParamInfo,
        orchestrator::RunOutcome,
        orchestrator::Report,
        orchestrator::StepRow,
        orchestrator::RowStatus,
        orchestrator::Narrative,
        orchestrator::ExportSummary,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "team", description = "Team catalog and status"),
        (name = "project", description = "Project state, reset and export"),
        (name = "orchestrate", description = "Plan and run a request"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::service_info))
        .route("/health", get(routes::health_check))
        .route("/api/openapi.json", get(openapi_json))
        .route("/api/team", get(routes::team_status))
        .route("/api/workers", get(routes::list_workers))
        .route("/api/project", get(routes::get_project_summary))
        .route("/api/project/state", get(routes::get_project_state))
        .route("/api/project/reset", post(routes::reset_project))
        .route("/api/project/export", post(routes::export_project))
        .route("/api/orchestrate", post(routes::orchestrate))
        .route("/api/events", get(routes::sse::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
