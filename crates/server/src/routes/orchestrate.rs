use axum::extract::State;
use axum::Json;
use devcrew_core::ExecutionMode;
use orchestrator::{RunOutcome, RunRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrchestrateRequest {
    pub request: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Defaults to true. When false only the plan is returned.
    pub auto_execute: Option<bool>,
    /// Falls back to the server configuration.
    pub halt_on_failure: Option<bool>,
    pub concurrency: Option<usize>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrchestrateResponse {
    pub run_id: Uuid,
    /// Rendered plan summary or final report.
    pub text: String,
    pub outcome: RunOutcome,
}

impl OrchestrateRequest {
    fn into_run_request(self, state: &AppState) -> RunRequest {
        let execution = &state.config.execution;
        let mut run = RunRequest::new(self.request)
            .with_mode(self.mode)
            .with_auto_execute(self.auto_execute.unwrap_or(true))
            .with_halt_on_failure(self.halt_on_failure.unwrap_or(execution.halt_on_failure))
            .with_concurrency(self.concurrency.unwrap_or(execution.concurrency));
        run.parameters = self.parameters;
        run
    }
}

#[utoipa::path(
    post,
    path = "/api/orchestrate",
    request_body = OrchestrateRequest,
    responses(
        (status = 200, description = "Plan preview or completed run", body = OrchestrateResponse),
        (status = 400, description = "Empty request", body = ErrorResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse),
        (status = 422, description = "Planner produced an invalid plan", body = ErrorResponse),
        (status = 502, description = "Planner call failed", body = ErrorResponse),
        (status = 503, description = "No planner configured", body = ErrorResponse)
    ),
    tag = "orchestrate"
)]
pub async fn orchestrate(
    State(state): State<AppState>,
    Json(body): Json<OrchestrateRequest>,
) -> Result<Json<OrchestrateResponse>, AppError> {
    if body.request.trim().is_empty() {
        return Err(AppError::BadRequest("request must not be empty".to_string()));
    }

    let run = body.into_run_request(&state);
    let outcome = state
        .controller
        .run(run, &state.shutdown.child_token())
        .await?;

    Ok(Json(OrchestrateResponse {
        run_id: outcome.run_id(),
        text: outcome.render(),
        outcome,
    }))
}
