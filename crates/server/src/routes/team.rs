use axum::extract::State;
use axum::Json;
use devcrew_core::{ExecutionMode, ProjectSummary, WorkerKind};
use orchestrator::WorkerInfo;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::{AppState, ServicesStatus};

#[derive(Debug, Serialize, ToSchema)]
pub struct ModeInfo {
    pub name: ExecutionMode,
    pub guideline: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeamStatus {
    pub server_version: String,
    pub team_size: usize,
    pub services: ServicesStatus,
    pub members: Vec<WorkerInfo>,
    pub modes: Vec<ModeInfo>,
    /// A run currently holds the project state.
    pub running: bool,
    pub current_project: ProjectSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkersResponse {
    pub workers: Vec<WorkerInfo>,
    /// Workers that can be invoked with the current configuration.
    pub registered: Vec<WorkerKind>,
}

fn catalog() -> Vec<WorkerInfo> {
    WorkerKind::ALL.into_iter().map(WorkerInfo::of).collect()
}

#[utoipa::path(
    get,
    path = "/api/team",
    responses(
        (status = 200, description = "Team, services and project status", body = TeamStatus)
    ),
    tag = "team"
)]
pub async fn team_status(State(state): State<AppState>) -> Json<TeamStatus> {
    let members = catalog();
    Json(TeamStatus {
        server_version: env!("CARGO_PKG_VERSION").to_string(),
        team_size: members.len(),
        services: state.services.clone(),
        members,
        modes: ExecutionMode::ALL
            .into_iter()
            .map(|mode| ModeInfo {
                name: mode,
                guideline: mode.guideline().to_string(),
            })
            .collect(),
        running: state.controller.is_running(),
        current_project: state.project().summary().await,
    })
}

#[utoipa::path(
    get,
    path = "/api/workers",
    responses(
        (status = 200, description = "Worker catalog", body = WorkersResponse)
    ),
    tag = "team"
)]
pub async fn list_workers(State(state): State<AppState>) -> Json<WorkersResponse> {
    Json(WorkersResponse {
        workers: catalog(),
        registered: state.controller.registry().kinds().collect(),
    })
}
