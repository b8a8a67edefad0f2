use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::worker::WorkerKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded { output: String },
    Failed { error: String },
}

/// Outcome of one executed step. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StepResult {
    pub step_id: u32,
    pub worker: WorkerKind,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub duration_ms: u64,
}

impl StepResult {
    pub fn succeeded(step_id: u32, worker: WorkerKind, output: impl Into<String>) -> Self {
        Self {
            step_id,
            worker,
            outcome: StepOutcome::Succeeded {
                output: output.into(),
            },
            duration_ms: 0,
        }
    }

    pub fn failed(step_id: u32, worker: WorkerKind, error: impl Into<String>) -> Self {
        Self {
            step_id,
            worker,
            outcome: StepOutcome::Failed {
                error: error.into(),
            },
            duration_ms: 0,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn status(&self) -> StepStatus {
        match self.outcome {
            StepOutcome::Succeeded { .. } => StepStatus::Succeeded,
            StepOutcome::Failed { .. } => StepStatus::Failed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == StepStatus::Succeeded
    }

    pub fn output(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Succeeded { output } => Some(output),
            StepOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Succeeded { .. } => None,
            StepOutcome::Failed { error } => Some(error),
        }
    }

    /// Output on success, error message on failure.
    pub fn text(&self) -> &str {
        match &self.outcome {
            StepOutcome::Succeeded { output } => output,
            StepOutcome::Failed { error } => error,
        }
    }
}

/// Ordered record of per-step outcomes for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ExecutionLedger {
    pub results: Vec<StepResult>,
    /// A cancellation signal stopped the run early.
    pub cancelled: bool,
    /// `halt_on_failure` stopped the run after a failed step.
    pub halted: bool,
}

impl ExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: StepResult) {
        self.results.push(result);
    }

    pub fn get(&self, step_id: u32) -> Option<&StepResult> {
        self.results.iter().find(|result| result.step_id == step_id)
    }

    pub fn output_of(&self, step_id: u32) -> Option<&str> {
        self.get(step_id).and_then(StepResult::output)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter()
    }

    pub fn succeeded_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.succeeded_count()
    }

    /// Stopped before every step was attempted.
    pub fn is_partial(&self) -> bool {
        self.cancelled || self.halted
    }

    pub fn sort_by_step(&mut self) {
        self.results.sort_by_key(|result| result.step_id);
    }
}
