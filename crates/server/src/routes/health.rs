use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    version: String,
    /// False when no planner is configured; runs are then refused.
    orchestration: bool,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Liveness and planner availability", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        orchestration: state.controller.has_planner(),
    })
}

#[derive(Serialize, ToSchema)]
pub struct ServiceInfo {
    name: String,
    version: String,
    description: String,
    endpoints: Vec<String>,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service description", body = ServiceInfo)
    ),
    tag = "health"
)]
pub async fn service_info() -> Json<ServiceInfo> {
    let endpoints = [
        "GET /health",
        "GET /api/team",
        "GET /api/workers",
        "GET /api/project",
        "GET /api/project/state",
        "POST /api/orchestrate",
        "POST /api/project/reset",
        "POST /api/project/export",
        "GET /api/events",
        "GET /api/openapi.json",
    ];

    Json(ServiceInfo {
        name: "DevCrew".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Workflow engine for a team of eight AI software specialists".to_string(),
        endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
    })
}
