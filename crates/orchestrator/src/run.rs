//! End-to-end run: plan, validate, execute, report.

use std::sync::Arc;

use devcrew_core::{ExecutionLedger, ExecutionMode, Plan};
use events::{Event, EventBus};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, PlanningError, Result};
use crate::executor::{ExecutorConfig, WorkflowExecutor};
use crate::export::{ExportOptions, ExportSummary, ProjectExporter};
use crate::planner::Planner;
use crate::report::{render_plan, Report, ReportAssembler};
use crate::state::ProjectStateStore;
use crate::validation::validate;
use crate::workers::WorkerRegistry;

fn default_true() -> bool {
    true
}

/// What a caller asks the team to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RunRequest {
    pub request: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    /// When false only the plan is produced and validated.
    #[serde(default = "default_true")]
    pub auto_execute: bool,
    #[serde(default)]
    pub halt_on_failure: bool,
    /// Maximum steps in flight; 0 or 1 runs sequentially.
    #[serde(default)]
    pub concurrency: usize,
    /// Extra parameters merged under every step's own parameters.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub parameters: Map<String, Value>,
}

impl RunRequest {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            mode: ExecutionMode::default(),
            auto_execute: true,
            halt_on_failure: false,
            concurrency: 0,
            parameters: Map::new(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_auto_execute(mut self, auto_execute: bool) -> Self {
        self.auto_execute = auto_execute;
        self
    }

    pub fn with_halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit;
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Parameters every step starts from. The request doubles as the analyst's
    /// input and the research topic unless the caller overrides them.
    fn initial_parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("user_request".to_string(), Value::from(self.request.clone()));
        params.insert("topic".to_string(), Value::from(self.request.clone()));
        params.extend(self.parameters.clone());
        params
    }

    fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig::new()
            .with_halt_on_failure(self.halt_on_failure)
            .with_concurrency(self.concurrency)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum RunOutcome {
    /// Plan validated but not executed.
    Preview {
        run_id: Uuid,
        plan: Plan,
        summary: String,
    },
    Completed {
        run_id: Uuid,
        plan: Plan,
        ledger: ExecutionLedger,
        report: Box<Report>,
    },
}

impl RunOutcome {
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Preview { run_id, .. } | Self::Completed { run_id, .. } => *run_id,
        }
    }

    pub fn plan(&self) -> &Plan {
        match self {
            Self::Preview { plan, .. } | Self::Completed { plan, .. } => plan,
        }
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            Self::Completed { report, .. } => Some(report),
            Self::Preview { .. } => None,
        }
    }

    /// Human-readable text: the plan summary for previews, the full report
    /// otherwise.
    pub fn render(&self) -> String {
        match self {
            Self::Preview { summary, .. } => summary.clone(),
            Self::Completed { report, .. } => report.render(),
        }
    }
}

/// Owns the lifecycle of runs against one project state.
///
/// Executing runs are exclusive: a run started while another holds the
/// project state fails with [`OrchestratorError::RunInProgress`].
pub struct RunController {
    registry: WorkerRegistry,
    state: ProjectStateStore,
    planner: Option<Arc<dyn Planner>>,
    reporter: ReportAssembler,
    exporter: ProjectExporter,
    event_bus: Option<EventBus>,
    run_lock: Mutex<()>,
}

impl RunController {
    pub fn new(registry: WorkerRegistry, state: ProjectStateStore) -> Self {
        Self {
            registry,
            state,
            planner: None,
            reporter: ReportAssembler::default(),
            exporter: ProjectExporter::new(),
            event_bus: None,
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn Planner>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn with_reporter(mut self, reporter: ReportAssembler) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.exporter = self.exporter.with_event_bus(bus.clone());
        self.event_bus = Some(bus);
        self
    }

    pub fn state(&self) -> &ProjectStateStore {
        &self.state
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn has_planner(&self) -> bool {
        self.planner.is_some()
    }

    /// Whether a run currently holds the project state.
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    pub async fn run(&self, request: RunRequest, cancel: &CancellationToken) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            mode = %request.mode,
            auto_execute = request.auto_execute,
            "Run requested"
        );

        // One executing run at a time, from planning until the ledger is done.
        let guard = if request.auto_execute {
            match self.run_lock.try_lock() {
                Ok(guard) => Some(guard),
                Err(_) => return Err(self.abort(run_id, OrchestratorError::RunInProgress)),
            }
        } else {
            None
        };

        let planned = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(OrchestratorError::Cancelled),
            planned = self.plan(&request) => planned.map_err(OrchestratorError::from),
        };
        let plan = match planned {
            Ok(plan) => plan,
            Err(e) => return Err(self.abort(run_id, e)),
        };
        let validated = match validate(&plan, &self.registry) {
            Ok(validated) => validated,
            Err(e) => return Err(self.abort(run_id, e.into())),
        };

        let Some(guard) = guard else {
            info!(run_id = %run_id, steps = validated.len(), "Plan previewed, not executing");
            return Ok(RunOutcome::Preview {
                run_id,
                summary: render_plan(validated.plan()),
                plan: validated.into_plan(),
            });
        };

        if cancel.is_cancelled() {
            return Err(self.abort(run_id, OrchestratorError::Cancelled));
        }

        self.state.start_project(request.request.clone()).await;

        let mut executor = WorkflowExecutor::new(self.registry.clone(), self.state.clone())
            .with_config(request.executor_config())
            .with_run_id(run_id);
        if let Some(bus) = &self.event_bus {
            executor = executor.with_event_bus(bus.clone());
        }

        let ledger = executor
            .execute(&validated, &request.initial_parameters(), cancel)
            .await;
        let snapshot = self.state.snapshot().await;
        drop(guard);

        let report = self
            .reporter
            .assemble(&request.request, validated.plan(), &ledger, &snapshot)
            .await;

        Ok(RunOutcome::Completed {
            run_id,
            plan: validated.into_plan(),
            ledger,
            report: Box::new(report),
        })
    }

    /// Clear the project state once no run holds it.
    pub async fn reset(&self) {
        let _guard = self.run_lock.lock().await;
        self.state.reset_all().await;
    }

    /// Export the state as of now. Does not wait for an active run.
    pub async fn export(&self, options: &ExportOptions) -> Result<ExportSummary> {
        let snapshot = self.state.snapshot().await;
        self.exporter.export(&snapshot, options).await
    }

    async fn plan(&self, request: &RunRequest) -> std::result::Result<Plan, PlanningError> {
        let planner = self.planner.as_ref().ok_or(PlanningError::Unavailable)?;
        planner.plan(&request.request, request.mode).await
    }

    fn abort(&self, run_id: Uuid, error: OrchestratorError) -> OrchestratorError {
        warn!(run_id = %run_id, error = %error, "Run aborted");
        if let Some(bus) = &self.event_bus {
            bus.emit(Event::RunAborted {
                run_id,
                reason: error.to_string(),
            });
        }
        error
    }
}

impl std::fmt::Debug for RunController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunController")
            .field("registry", &self.registry)
            .field("has_planner", &self.planner.is_some())
            .field("reporter", &self.reporter)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_request_defaults_from_json() {
        let request: RunRequest = serde_json::from_str(r#"{"request": "todo app"}"#).unwrap();

        assert!(request.auto_execute);
        assert!(!request.halt_on_failure);
        assert_eq!(request.mode, ExecutionMode::Full);
        assert_eq!(request.concurrency, 0);
    }

    #[test]
    fn test_initial_parameters_can_be_overridden() {
        let params = RunRequest::new("todo app")
            .with_parameter("topic", "offline-first todo apps")
            .initial_parameters();

        assert_eq!(params["user_request"], "todo app");
        assert_eq!(params["topic"], "offline-first todo apps");
    }

    #[tokio::test]
    async fn test_run_without_planner_aborts() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let controller = RunController::new(WorkerRegistry::new(), ProjectStateStore::new())
            .with_event_bus(bus);

        let err = controller
            .run(RunRequest::new("anything"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrchestratorError::Planning(PlanningError::Unavailable)
        ));
        let envelope = rx.try_recv().unwrap();
        assert!(matches!(envelope.event, Event::RunAborted { .. }));
    }
}
