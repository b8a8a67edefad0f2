use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use devcrew_core::{
    ExecutionLedger, ProjectState, StateTarget, StateWrite, StepOutcome, StepResult, WorkerKind,
};
use events::{Event, EventBus};
use futures::FutureExt;
use serde_json::{Map, Value};
use tokio::task::{self, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::WorkerError;
use crate::params::Parameters;
use crate::state::ProjectStateStore;
use crate::validation::{ValidatedPlan, ValidatedStep};
use crate::workers::{Worker, WorkerOutput, WorkerRegistry};

const DEFAULT_MODULE_NAME: &str = "main_module";

/// How ready steps are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheduling {
    /// One step at a time in ascending id order.
    #[default]
    Sequential,
    /// Steps whose dependencies have finished run in parallel, at most `limit`
    /// at a time.
    Concurrent { limit: usize },
}

#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    /// Stop scheduling after the first failed step.
    pub halt_on_failure: bool,
    pub scheduling: Scheduling,
}

impl ExecutorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// A limit of 0 or 1 means sequential execution.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.scheduling = if limit > 1 {
            Scheduling::Concurrent { limit }
        } else {
            Scheduling::Sequential
        };
        self
    }
}

/// Outcome of one invocation before it is recorded.
#[derive(Debug)]
struct StepRun {
    result: StepResult,
    write: Option<StateWrite>,
    cancelled: bool,
}

/// Runs a validated plan against the registry and the shared project state.
pub struct WorkflowExecutor {
    registry: WorkerRegistry,
    state: ProjectStateStore,
    config: ExecutorConfig,
    event_bus: Option<EventBus>,
    run_id: Uuid,
}

impl WorkflowExecutor {
    pub fn new(registry: WorkerRegistry, state: ProjectStateStore) -> Self {
        Self {
            registry,
            state,
            config: ExecutorConfig::default(),
            event_bus: None,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Identifier attached to the events of this run.
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Attempt every step of `plan` once and return the ledger in ascending id
    /// order. Step failures are recorded, never propagated.
    pub async fn execute(
        &self,
        plan: &ValidatedPlan,
        initial_parameters: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> ExecutionLedger {
        info!(
            run_id = %self.run_id,
            project = %plan.project_name(),
            steps = plan.len(),
            scheduling = ?self.config.scheduling,
            "Executing plan"
        );
        self.emit(Event::RunStarted {
            run_id: self.run_id,
            project_name: plan.project_name().to_string(),
            total_steps: plan.len(),
        });

        let ledger = match self.config.scheduling {
            Scheduling::Sequential => {
                self.execute_sequential(plan, initial_parameters, cancel)
                    .await
            }
            Scheduling::Concurrent { limit } => {
                self.execute_concurrent(plan, initial_parameters, cancel, limit)
                    .await
            }
        };

        info!(
            run_id = %self.run_id,
            succeeded = ledger.succeeded_count(),
            failed = ledger.failed_count(),
            not_run = plan.len() - ledger.len(),
            cancelled = ledger.cancelled,
            halted = ledger.halted,
            "Plan execution finished"
        );
        self.emit(Event::RunCompleted {
            run_id: self.run_id,
            succeeded: ledger.succeeded_count(),
            failed: ledger.failed_count(),
            cancelled: ledger.cancelled,
        });

        ledger
    }

    async fn execute_sequential(
        &self,
        plan: &ValidatedPlan,
        initial: &Map<String, Value>,
        cancel: &CancellationToken,
    ) -> ExecutionLedger {
        let mut ledger = ExecutionLedger::new();

        for step in plan.steps() {
            if cancel.is_cancelled() {
                ledger.cancelled = true;
                break;
            }

            let params = resolve_parameters(step, initial, &ledger);
            let run = self.launch(step, params, cancel.clone()).await;
            let stop = self.record(&mut ledger, run).await;
            if stop {
                break;
            }
        }

        ledger
    }

    async fn execute_concurrent(
        &self,
        plan: &ValidatedPlan,
        initial: &Map<String, Value>,
        cancel: &CancellationToken,
        limit: usize,
    ) -> ExecutionLedger {
        let limit = limit.max(1);
        let base: ProjectState = self.state.snapshot().await;
        let mut ledger = ExecutionLedger::new();
        let mut pending: Vec<&ValidatedStep> = plan.steps().iter().collect();
        let mut finished: HashSet<u32> = HashSet::new();
        let mut writes: Vec<(u32, StateWrite)> = Vec::new();
        let mut in_flight = JoinSet::new();
        let mut launched: HashMap<task::Id, (u32, WorkerKind)> = HashMap::new();
        let mut stopped = false;

        loop {
            if !stopped && cancel.is_cancelled() {
                ledger.cancelled = true;
                stopped = true;
            }

            if !stopped {
                let mut i = 0;
                while in_flight.len() < limit && i < pending.len() {
                    let ready = pending[i]
                        .prerequisites()
                        .iter()
                        .all(|id| finished.contains(id));
                    if !ready {
                        i += 1;
                        continue;
                    }
                    let step = pending.remove(i);
                    let params = resolve_parameters(step, initial, &ledger);
                    let launch = self.launch(step, params, cancel.clone());
                    let handle = in_flight.spawn(launch);
                    launched.insert(handle.id(), (step.id, step.worker));
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let run = match joined {
                Ok(run) => run,
                Err(e) => {
                    error!(run_id = %self.run_id, error = %e, "Step task aborted");
                    match lost_step(&e, &launched) {
                        Some(run) => run,
                        None => {
                            stopped = true;
                            continue;
                        }
                    }
                }
            };

            finished.insert(run.result.step_id);
            if let Some(write) = &run.write {
                writes.push((run.result.step_id, write.clone()));
            }
            if self.record(&mut ledger, run).await {
                stopped = true;
            }
        }

        ledger.sort_by_step();
        writes.sort_by_key(|(id, _)| *id);
        self.state
            .replay(base, writes.into_iter().map(|(_, write)| write))
            .await;

        ledger
    }

    /// Build the future that invokes one step. The future owns everything it
    /// needs so it can be spawned.
    fn launch(
        &self,
        step: &ValidatedStep,
        params: Parameters,
        cancel: CancellationToken,
    ) -> impl std::future::Future<Output = StepRun> + Send + 'static {
        let worker = self.registry.get(step.worker).cloned();
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();
        let run_id = self.run_id;
        let step_id = step.id;
        let kind = step.worker;

        async move {
            info!(run_id = %run_id, step_id, worker = %kind, "Executing step");
            if let Some(bus) = &event_bus {
                bus.emit(Event::StepStarted {
                    run_id,
                    step_id,
                    worker: kind,
                });
            }

            let started = Instant::now();
            let outcome = match worker {
                Some(worker) => invoke(worker, &params, &state, &cancel).await,
                None => Err(WorkerError::failed(format!("worker '{kind}' is not registered"))),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => {
                    debug!(step_id, worker = %kind, duration_ms, "Step succeeded");
                    let write = kind.populates().map(|target| match target {
                        StateTarget::Field(field) => StateWrite::Field {
                            field,
                            value: output.artifact().to_string(),
                        },
                        StateTarget::CodeModule => StateWrite::CodeModule {
                            name: params.text_or("module_name", DEFAULT_MODULE_NAME),
                            content: output.artifact().to_string(),
                        },
                    });
                    StepRun {
                        result: StepResult::succeeded(step_id, kind, output.report)
                            .with_duration(duration_ms),
                        write,
                        cancelled: false,
                    }
                }
                Err(e) => {
                    warn!(step_id, worker = %kind, error = %e, "Step failed");
                    StepRun {
                        cancelled: matches!(e, WorkerError::Cancelled),
                        result: StepResult::failed(step_id, kind, e.to_string())
                            .with_duration(duration_ms),
                        write: None,
                    }
                }
            }
        }
    }

    /// Store the step's artifact, append its result and report whether
    /// scheduling must stop.
    async fn record(&self, ledger: &mut ExecutionLedger, run: StepRun) -> bool {
        let StepRun {
            result,
            write,
            cancelled,
        } = run;

        if let Some(write) = write {
            self.state.apply(write).await;
        }

        self.emit(match &result.outcome {
            StepOutcome::Succeeded { .. } => Event::StepSucceeded {
                run_id: self.run_id,
                step_id: result.step_id,
                worker: result.worker,
                duration_ms: result.duration_ms,
            },
            StepOutcome::Failed { error } => Event::StepFailed {
                run_id: self.run_id,
                step_id: result.step_id,
                worker: result.worker,
                error: error.clone(),
            },
        });

        let failed = !result.is_success();
        ledger.record(result);

        if cancelled {
            ledger.cancelled = true;
            return true;
        }
        if failed && self.config.halt_on_failure {
            info!(run_id = %self.run_id, "Halting after failed step");
            ledger.halted = true;
            return true;
        }
        false
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event);
        }
    }
}

fn resolve_parameters(
    step: &ValidatedStep,
    initial: &Map<String, Value>,
    ledger: &ExecutionLedger,
) -> Parameters {
    Parameters::resolve(initial, &step.parameters, |id| ledger.output_of(id))
        .with_defaults(step.worker.parameters())
}

/// Invoke `worker`, racing it against `cancel`. Panics become failures.
/// Ledger entry for a step whose task ended outside the worker call.
fn lost_step(error: &JoinError, launched: &HashMap<task::Id, (u32, WorkerKind)>) -> Option<StepRun> {
    let (step_id, worker) = launched.get(&error.id())?;
    let reason = if error.is_cancelled() {
        "step task aborted"
    } else {
        "step task panicked"
    };
    Some(StepRun {
        result: StepResult::failed(*step_id, *worker, reason),
        write: None,
        cancelled: false,
    })
}

async fn invoke(
    worker: Arc<dyn Worker>,
    params: &Parameters,
    state: &ProjectStateStore,
    cancel: &CancellationToken,
) -> Result<WorkerOutput, WorkerError> {
    let call = AssertUnwindSafe(worker.invoke(params, state)).catch_unwind();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(WorkerError::Cancelled),
        result = call => result.unwrap_or_else(|_| Err(WorkerError::failed("worker panicked"))),
    }
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor")
            .field("run_id", &self.run_id)
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
