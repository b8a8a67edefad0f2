use std::path::{Component, Path};

use axum::extract::State;
use axum::Json;
use devcrew_core::{ProjectState, ProjectSummary};
use orchestrator::{ExportOptions, ExportSummary};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/project",
    responses(
        (status = 200, description = "Completed phases and implemented modules", body = ProjectSummary)
    ),
    tag = "project"
)]
pub async fn get_project_summary(State(state): State<AppState>) -> Json<ProjectSummary> {
    Json(state.project().summary().await)
}

#[utoipa::path(
    get,
    path = "/api/project/state",
    responses(
        (status = 200, description = "Full project state snapshot", body = ProjectState)
    ),
    tag = "project"
)]
pub async fn get_project_state(State(state): State<AppState>) -> Json<ProjectState> {
    Json(state.project().snapshot().await)
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    pub version: u64,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/project/reset",
    responses(
        (status = 200, description = "Project state cleared", body = ResetResponse)
    ),
    tag = "project"
)]
pub async fn reset_project(State(state): State<AppState>) -> Json<ResetResponse> {
    state.controller.reset().await;
    let version = state.project().summary().await.version;

    Json(ResetResponse {
        version,
        message: "Project state cleared".to_string(),
    })
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ExportRequest {
    /// Directory name relative to the configured export root.
    pub output_directory: Option<String>,
    pub include_docs: Option<bool>,
}

fn validate_output_directory(dir: &str) -> Result<(), AppError> {
    let path = Path::new(dir);
    let safe = !dir.trim().is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "output_directory must be a relative path inside the export root: {dir}"
        )))
    }
}

#[utoipa::path(
    post,
    path = "/api/project/export",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Project exported", body = ExportSummary),
        (status = 400, description = "Invalid output directory", body = ErrorResponse),
        (status = 409, description = "No active project", body = ErrorResponse)
    ),
    tag = "project"
)]
pub async fn export_project(
    State(state): State<AppState>,
    body: Option<Json<ExportRequest>>,
) -> Result<Json<ExportSummary>, AppError> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    if let Some(dir) = &request.output_directory {
        validate_output_directory(dir)?;
    }

    let options = ExportOptions::new(state.config.export_dir(request.output_directory.as_deref()))
        .with_docs(request.include_docs.unwrap_or(state.config.export.include_docs));
    let summary = state.controller.export(&options).await?;

    Ok(Json(summary))
}
