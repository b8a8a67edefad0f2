mod ledger;
mod plan;
mod state;
mod worker;

pub use ledger::{ExecutionLedger, StepOutcome, StepResult, StepStatus};
pub use plan::{Complexity, ExecutionMode, Plan, Step};
pub use state::{ProjectState, ProjectSummary, StateField, StateWrite};
pub use worker::{ParamSpec, StateTarget, WorkerKind};
