//! Workflow engine for the DevCrew specialist team.
//!
//! A [`Planner`] turns a request into a plan, [`validate`] proves it
//! executable, the [`WorkflowExecutor`] invokes one worker per step while
//! threading outputs and shared [`ProjectStateStore`] artifacts between them,
//! and the [`ReportAssembler`] summarises the result. [`RunController`] ties
//! these together.

pub mod error;
pub mod executor;
pub mod export;
pub mod params;
pub mod planner;
pub mod prompts;
pub mod report;
pub mod run;
pub mod services;
pub mod state;
pub mod validation;
pub mod workers;

pub use error::{
    OrchestratorError, PlanningError, ProviderError, Result, ValidationError, ValidationErrorKind,
    WorkerError,
};
pub use executor::{ExecutorConfig, Scheduling, WorkflowExecutor};
pub use export::{ExportOptions, ExportSummary, ProjectExporter};
pub use params::{Parameters, UNAVAILABLE_MARKER};
pub use planner::{parse_plan, LlmPlanner, Planner, StaticPlanner};
pub use report::{render_plan, Narrative, Report, ReportAssembler, RowStatus, StepRow};
pub use run::{RunController, RunOutcome, RunRequest};
pub use services::{
    GeminiClient, Generation, RetryPolicy, SearchHit, TavilyClient, TextGenerator, WebSearch,
};
pub use state::ProjectStateStore;
pub use validation::{validate, ValidatedPlan, ValidatedStep};
pub use workers::{
    ParamInfo, SpecialistWorker, Worker, WorkerInfo, WorkerOutput, WorkerRegistry,
};
