use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use devcrew_core::{Complexity, ExecutionMode, Plan, Step, StepStatus, WorkerKind};
use events::{Event, EventBus};
use orchestrator::{
    validate, ExecutorConfig, OrchestratorError, Parameters, Planner, PlanningError,
    ProjectStateStore, RowStatus, RunController, RunOutcome, RunRequest, StaticPlanner,
    ValidationErrorKind, Worker, WorkerError, WorkerOutput, WorkerRegistry, WorkflowExecutor,
    UNAVAILABLE_MARKER,
};
use serde_json::{json, Map};
use tokio_util::sync::CancellationToken;

/// Worker driven by a closure. A `delay_ms` parameter makes it sleep first.
struct FnWorker<F> {
    kind: WorkerKind,
    f: F,
}

#[async_trait]
impl<F> Worker for FnWorker<F>
where
    F: Fn(&Parameters) -> Result<String, WorkerError> + Send + Sync,
{
    fn kind(&self) -> WorkerKind {
        self.kind
    }

    async fn invoke(
        &self,
        params: &Parameters,
        _state: &ProjectStateStore,
    ) -> Result<WorkerOutput, WorkerError> {
        if let Some(ms) = params.get("delay_ms").and_then(|v| v.as_u64()) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        (self.f)(params).map(WorkerOutput::new)
    }
}

fn worker<F>(kind: WorkerKind, f: F) -> Arc<dyn Worker>
where
    F: Fn(&Parameters) -> Result<String, WorkerError> + Send + Sync + 'static,
{
    Arc::new(FnWorker { kind, f })
}

fn failing(kind: WorkerKind, message: &'static str) -> Arc<dyn Worker> {
    worker(kind, move |_| Err(WorkerError::failed(message)))
}

/// Every kind answers "<kind> done", except the overrides.
fn registry(overrides: Vec<Arc<dyn Worker>>) -> WorkerRegistry {
    let base = WorkerKind::ALL.into_iter().fold(WorkerRegistry::new(), |r, kind| {
        r.with_worker(worker(kind, move |_| Ok(format!("{kind} done"))))
    });
    overrides
        .into_iter()
        .fold(base, |r, worker| r.with_worker(worker))
}

/// Planner that takes a minute to answer.
struct SlowPlanner(Plan);

#[async_trait]
impl Planner for SlowPlanner {
    async fn plan(&self, _request: &str, _mode: ExecutionMode) -> Result<Plan, PlanningError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(self.0.clone())
    }
}

fn plan(steps: Vec<Step>) -> Plan {
    Plan::new("Tasky", Complexity::Moderate, steps)
}

async fn execute(
    registry: WorkerRegistry,
    state: &ProjectStateStore,
    plan: &Plan,
    config: ExecutorConfig,
) -> devcrew_core::ExecutionLedger {
    let validated = validate(plan, &registry).expect("plan should validate");
    WorkflowExecutor::new(registry, state.clone())
        .with_config(config)
        .execute(&validated, &Map::new(), &CancellationToken::new())
        .await
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_three_independent_steps_succeed() {
        let state = ProjectStateStore::new();
        let plan = plan(vec![
            Step::new(1, "product_analyst").with_param("user_request", "todo app"),
            Step::new(2, "research_engineer").with_param("topic", "todo apps"),
            Step::new(3, "software_architect"),
        ]);

        let ledger = execute(registry(vec![]), &state, &plan, ExecutorConfig::new()).await;

        let rows: Vec<_> = ledger.iter().map(|r| (r.step_id, r.status())).collect();
        assert_eq!(
            rows,
            vec![
                (1, StepStatus::Succeeded),
                (2, StepStatus::Succeeded),
                (3, StepStatus::Succeeded)
            ]
        );
        assert!(!ledger.is_partial());
    }

    #[tokio::test]
    async fn test_failed_step_does_not_abort_run() {
        let state = ProjectStateStore::new();
        let seen = Arc::new(Mutex::new(None));
        let seen_by_architect = seen.clone();
        let architect = worker(WorkerKind::SoftwareArchitect, move |params| {
            *seen_by_architect.lock().unwrap() = params.text("requirements");
            Ok("layered design".to_string())
        });
        let plan = plan(vec![
            Step::new(1, "product_analyst"),
            Step::new(2, "software_architect")
                .depending_on([1])
                .with_param("requirements", "{{step:1}}"),
        ]);

        let ledger = execute(
            registry(vec![
                failing(WorkerKind::ProductAnalyst, "upstream timeout"),
                architect,
            ]),
            &state,
            &plan,
            ExecutorConfig::new(),
        )
        .await;

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get(1).unwrap().error(), Some("upstream timeout"));
        assert!(ledger.get(2).unwrap().is_success());
        assert_eq!(seen.lock().unwrap().as_deref(), Some(UNAVAILABLE_MARKER));

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.requirements, None);
        assert_eq!(snapshot.architecture.as_deref(), Some("layered design"));
    }

    #[tokio::test]
    async fn test_forward_reference_is_rejected() {
        let plan = plan(vec![Step::new(1, "product_analyst").depending_on([2])]);

        let err = validate(&plan, &registry(vec![])).unwrap_err();

        assert_eq!(err.step_id, 1);
        assert_eq!(err.kind, ValidationErrorKind::ForwardDependency(2));
    }

    #[tokio::test]
    async fn test_second_run_starts_from_empty_state() {
        let modules_seen = Arc::new(Mutex::new(Vec::new()));
        let state = ProjectStateStore::new();

        let first = plan(vec![
            Step::new(1, "senior_developer").with_param("module_name", "alpha"),
            Step::new(2, "senior_developer").with_param("module_name", "beta"),
        ]);
        let controller = RunController::new(registry(vec![]), state.clone())
            .with_planner(Arc::new(StaticPlanner::new(first)));
        controller
            .run(RunRequest::new("first"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(state.summary().await.code_modules_count, 2);

        // The analyst of the second run observes the store right after the reset.
        let probe_state = state.clone();
        let probe_seen = modules_seen.clone();
        let probe: Arc<dyn Worker> = Arc::new(StateProbe {
            state: probe_state,
            seen: probe_seen,
        });
        let second = plan(vec![
            Step::new(1, "product_analyst"),
            Step::new(2, "senior_developer").with_param("module_name", "gamma"),
        ]);
        let controller = RunController::new(registry(vec![probe]), state.clone())
            .with_planner(Arc::new(StaticPlanner::new(second)));
        controller
            .run(RunRequest::new("second"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*modules_seen.lock().unwrap(), vec![0]);
        let snapshot = state.snapshot().await;
        let names: Vec<_> = snapshot.code_modules.keys().cloned().collect();
        assert_eq!(names, vec!["gamma"]);
        assert_eq!(snapshot.current_project.as_deref(), Some("second"));
    }

    struct StateProbe {
        state: ProjectStateStore,
        seen: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl Worker for StateProbe {
        fn kind(&self) -> WorkerKind {
            WorkerKind::ProductAnalyst
        }

        async fn invoke(
            &self,
            _params: &Parameters,
            _state: &ProjectStateStore,
        ) -> Result<WorkerOutput, WorkerError> {
            let count = self.state.summary().await.code_modules_count;
            self.seen.lock().unwrap().push(count);
            Ok(WorkerOutput::new("requirements"))
        }
    }
}

mod failure_policy {
    use super::*;

    #[tokio::test]
    async fn test_halt_on_failure_stops_scheduling() {
        let state = ProjectStateStore::new();
        let plan = plan(vec![
            Step::new(1, "product_analyst"),
            Step::new(2, "software_architect"),
            Step::new(3, "technical_lead"),
        ]);

        let ledger = execute(
            registry(vec![failing(WorkerKind::ProductAnalyst, "bad request")]),
            &state,
            &plan,
            ExecutorConfig::new().with_halt_on_failure(true),
        )
        .await;

        assert_eq!(ledger.len(), 1);
        assert!(ledger.halted);
        assert!(!ledger.cancelled);
    }

    #[tokio::test]
    async fn test_panicking_worker_is_recorded_as_failure() {
        let state = ProjectStateStore::new();
        let plan = plan(vec![
            Step::new(1, "qa_engineer"),
            Step::new(2, "devops_engineer"),
        ]);
        let qa = worker(WorkerKind::QaEngineer, |_| -> Result<String, WorkerError> {
            panic!("test harness exploded")
        });

        let ledger = execute(registry(vec![qa]), &state, &plan, ExecutorConfig::new()).await;

        assert_eq!(ledger.get(1).unwrap().error(), Some("worker panicked"));
        assert!(ledger.get(2).unwrap().is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_in_flight_step() {
        let state = ProjectStateStore::new();
        let registry = registry(vec![]);
        let plan = plan(vec![
            Step::new(1, "product_analyst").with_param("delay_ms", 60_000),
            Step::new(2, "software_architect"),
        ]);
        let validated = validate(&plan, &registry).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let ledger = WorkflowExecutor::new(registry, state.clone())
            .execute(&validated, &Map::new(), &cancel)
            .await;

        assert!(ledger.cancelled);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get(1).unwrap().error(), Some("cancelled"));
        assert_eq!(state.snapshot().await.requirements, None);
    }

    #[tokio::test]
    async fn test_cancelled_run_reports_not_run_steps() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let analyst = worker(WorkerKind::ProductAnalyst, move |_| {
            trigger.cancel();
            Ok("requirements".to_string())
        });
        let plan = plan(vec![
            Step::new(1, "product_analyst"),
            Step::new(2, "software_architect"),
            Step::new(3, "technical_lead"),
        ]);
        let controller = RunController::new(registry(vec![analyst]), ProjectStateStore::new())
            .with_planner(Arc::new(StaticPlanner::new(plan)));

        let outcome = controller.run(RunRequest::new("todo"), &cancel).await.unwrap();

        let report = outcome.report().expect("completed run has a report");
        assert!(report.cancelled);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.not_run, 2);
        assert_eq!(report.steps[2].status, RowStatus::NotRun);
    }
}

mod concurrency {
    use super::*;

    fn fan_out_plan() -> Plan {
        plan(vec![
            Step::new(1, "product_analyst"),
            Step::new(2, "senior_developer")
                .with_param("module_name", "beta")
                .with_param("delay_ms", 40),
            Step::new(3, "senior_developer").with_param("module_name", "alpha"),
            Step::new(4, "technical_lead")
                .depending_on([2, 3])
                .with_param("architecture", "{{step:2}}"),
        ])
    }

    fn developer() -> Arc<dyn Worker> {
        worker(WorkerKind::SeniorDeveloper, |params| {
            Ok(format!("code for {}", params.text_or("module_name", "?")))
        })
    }

    fn lead() -> Arc<dyn Worker> {
        worker(WorkerKind::TechnicalLead, |params| {
            Ok(format!("plan from {}", params.text_or("architecture", "?")))
        })
    }

    #[tokio::test]
    async fn test_concurrent_run_matches_sequential_state() {
        let sequential = ProjectStateStore::new();
        let sequential_ledger = execute(
            registry(vec![developer(), lead()]),
            &sequential,
            &fan_out_plan(),
            ExecutorConfig::new(),
        )
        .await;

        let concurrent = ProjectStateStore::new();
        let concurrent_ledger = execute(
            registry(vec![developer(), lead()]),
            &concurrent,
            &fan_out_plan(),
            ExecutorConfig::new().with_concurrency(3),
        )
        .await;

        let ids: Vec<_> = concurrent_ledger.iter().map(|r| r.step_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        let a = sequential.snapshot().await;
        let b = concurrent.snapshot().await;
        assert_eq!(a.code_modules, b.code_modules);
        assert_eq!(
            b.code_modules.keys().cloned().collect::<Vec<_>>(),
            vec!["beta", "alpha"]
        );
        assert_eq!(a.requirements, b.requirements);
        assert_eq!(a.implementation_plan, b.implementation_plan);
        assert_eq!(
            sequential_ledger.output_of(4),
            concurrent_ledger.output_of(4)
        );
    }

    #[tokio::test]
    async fn test_dependents_wait_for_prerequisites() {
        let state = ProjectStateStore::new();
        let ledger = execute(
            registry(vec![developer(), lead()]),
            &state,
            &fan_out_plan(),
            ExecutorConfig::new().with_concurrency(4),
        )
        .await;

        assert_eq!(ledger.output_of(4), Some("plan from code for beta"));
        assert_eq!(
            state.snapshot().await.implementation_plan.as_deref(),
            Some("plan from code for beta")
        );
    }
}

mod controller {
    use super::*;

    fn todo_plan() -> Plan {
        plan(vec![
            Step::new(1, "product_analyst"),
            Step::new(2, "software_architect").depending_on([1]),
        ])
    }

    #[tokio::test]
    async fn test_preview_does_not_touch_state() {
        let state = ProjectStateStore::new();
        state.set_code_module("existing", "keep").await;
        let controller = RunController::new(registry(vec![]), state.clone())
            .with_planner(Arc::new(StaticPlanner::new(todo_plan())));

        let outcome = controller
            .run(
                RunRequest::new("todo").with_auto_execute(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::Preview { .. }));
        assert!(outcome.render().contains("Step 2: SOFTWARE ARCHITECT"));
        assert_eq!(state.code_module("existing").await.as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn test_request_seeds_analyst_parameters() {
        let seen = Arc::new(Mutex::new(None));
        let seen_by_analyst = seen.clone();
        let analyst = worker(WorkerKind::ProductAnalyst, move |params| {
            *seen_by_analyst.lock().unwrap() = params.text("user_request");
            Ok("requirements".to_string())
        });
        let controller = RunController::new(registry(vec![analyst]), ProjectStateStore::new())
            .with_planner(Arc::new(StaticPlanner::new(todo_plan())));

        let outcome = controller
            .run(RunRequest::new("a todo app"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("a todo app"));
        let report = outcome.report().unwrap();
        assert!(report.is_success());
        assert_eq!(report.project.name.as_deref(), Some("a todo app"));
    }

    #[tokio::test]
    async fn test_request_text_reaches_worker_verbatim() {
        let seen = Arc::new(Mutex::new(None));
        let seen_by_analyst = seen.clone();
        let analyst = worker(WorkerKind::ProductAnalyst, move |params| {
            *seen_by_analyst.lock().unwrap() = params.text("user_request");
            Ok("requirements".to_string())
        });
        let controller = RunController::new(registry(vec![analyst]), ProjectStateStore::new())
            .with_planner(Arc::new(StaticPlanner::new(plan(vec![Step::new(
                1,
                "product_analyst",
            )]))));

        controller
            .run(
                RunRequest::new("Explain the {{step:1}} syntax"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            seen.lock().unwrap().as_deref(),
            Some("Explain the {{step:1}} syntax")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_planning() {
        let state = ProjectStateStore::new();
        state.set_code_module("existing", "keep").await;
        let controller = RunController::new(registry(vec![]), state.clone())
            .with_planner(Arc::new(SlowPlanner(todo_plan())));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = controller
            .run(RunRequest::new("todo"), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!controller.is_running());
        assert_eq!(state.code_module("existing").await.as_deref(), Some("keep"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_is_refused_while_first_executes() {
        let slow_plan = plan(vec![
            Step::new(1, "product_analyst").with_param("delay_ms", 60_000),
            Step::new(2, "software_architect"),
        ]);
        let controller = Arc::new(
            RunController::new(registry(vec![]), ProjectStateStore::new())
                .with_planner(Arc::new(StaticPlanner::new(slow_plan))),
        );
        let cancel = CancellationToken::new();

        let first = {
            let controller = controller.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { controller.run(RunRequest::new("first"), &cancel).await })
        };
        while !controller.is_running() {
            tokio::task::yield_now().await;
        }

        let err = controller
            .run(RunRequest::new("second"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::RunInProgress));

        let preview = controller
            .run(
                RunRequest::new("second").with_auto_execute(false),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(matches!(preview, RunOutcome::Preview { .. }));

        cancel.cancel();
        let outcome = first.await.unwrap().unwrap();
        assert!(outcome.report().unwrap().cancelled);
        assert_eq!(
            controller.state().summary().await.name.as_deref(),
            Some("first")
        );
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn test_invalid_plan_aborts_before_any_worker() {
        let calls = Arc::new(Mutex::new(0));
        let counted = calls.clone();
        let analyst = worker(WorkerKind::ProductAnalyst, move |_| {
            *counted.lock().unwrap() += 1;
            Ok("requirements".to_string())
        });
        let bad = plan(vec![
            Step::new(1, "product_analyst"),
            Step::new(2, "ux_designer"),
        ]);
        let state = ProjectStateStore::new();
        state.set_code_module("existing", "keep").await;
        let controller = RunController::new(registry(vec![analyst]), state.clone())
            .with_planner(Arc::new(StaticPlanner::new(bad)));

        let err = controller
            .run(RunRequest::new("todo"), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OrchestratorError::Validation(ref e) if e.step_id == 2));
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(state.summary().await.code_modules_count, 1);
    }

    #[tokio::test]
    async fn test_run_publishes_lifecycle_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let controller = RunController::new(registry(vec![]), ProjectStateStore::new())
            .with_planner(Arc::new(StaticPlanner::new(todo_plan())))
            .with_event_bus(bus);

        let outcome = controller
            .run(
                RunRequest::new("todo").with_mode(ExecutionMode::Planning),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let mut names = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            if let Some(run_id) = envelope.event.run_id() {
                assert_eq!(run_id, outcome.run_id());
            }
            if !matches!(envelope.event, Event::StateUpdated { .. } | Event::StateReset { .. }) {
                names.push(envelope.event.name());
            }
        }
        assert_eq!(
            names,
            vec![
                "run.started",
                "step.started",
                "step.succeeded",
                "step.started",
                "step.succeeded",
                "run.completed"
            ]
        );
    }

    #[tokio::test]
    async fn test_reset_clears_state() {
        let state = ProjectStateStore::new();
        let controller = RunController::new(registry(vec![]), state.clone())
            .with_planner(Arc::new(StaticPlanner::new(todo_plan())));
        controller
            .run(RunRequest::new("todo"), &CancellationToken::new())
            .await
            .unwrap();

        controller.reset().await;
        controller.reset().await;

        assert!(state.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_export_after_run() {
        let tmp = tempfile::TempDir::new().unwrap();
        let controller = RunController::new(registry(vec![]), ProjectStateStore::new())
            .with_planner(Arc::new(StaticPlanner::new(plan(vec![Step::new(
                1,
                "senior_developer",
            )
            .with_param("module_name", "app.py")]))));
        controller
            .run(RunRequest::new("todo"), &CancellationToken::new())
            .await
            .unwrap();

        let summary = controller
            .export(&orchestrator::ExportOptions::new(tmp.path().join("todo")))
            .await
            .unwrap();

        assert!(summary.files.contains(&"src/app.py".to_string()));
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("todo/src/app.py")).unwrap(),
            "senior_developer done"
        );
    }

    #[test]
    fn test_run_request_accepts_parameters() {
        let request: RunRequest = serde_json::from_value(json!({
            "request": "todo",
            "mode": "deployment",
            "parameters": {"language": "rust"}
        }))
        .unwrap();

        assert_eq!(request.mode, ExecutionMode::Deployment);
        assert_eq!(request.parameters["language"], "rust");
    }
}
