use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::{OrchestratorError, PlanningError};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Orchestrator(OrchestratorError),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Orchestrator(err) => {
                let message = err.to_string();
                match err {
                    OrchestratorError::Validation(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "invalid_plan", message)
                    }
                    OrchestratorError::Planning(PlanningError::Unavailable) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "planner_unavailable", message)
                    }
                    OrchestratorError::Planning(_) => {
                        tracing::warn!(error = %message, "Planning failed");
                        (StatusCode::BAD_GATEWAY, "planning_failed", message)
                    }
                    OrchestratorError::RunInProgress => {
                        (StatusCode::CONFLICT, "run_in_progress", message)
                    }
                    OrchestratorError::Cancelled => {
                        (StatusCode::SERVICE_UNAVAILABLE, "cancelled", message)
                    }
                    OrchestratorError::NoActiveProject => {
                        (StatusCode::CONFLICT, "no_active_project", message)
                    }
                    OrchestratorError::Export(_)
                    | OrchestratorError::Io(_)
                    | OrchestratorError::Serialization(_) => {
                        tracing::error!(error = %message, "Export failed");
                        (StatusCode::INTERNAL_SERVER_ERROR, "export_failed", message)
                    }
                }
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestrator(err)
    }
}
