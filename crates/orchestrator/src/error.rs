use thiserror::Error;

/// Why a plan was rejected before execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    #[error("plan has no steps")]
    EmptyPlan,

    #[error("step ids must be positive")]
    NonPositiveId,

    #[error("step id is used more than once")]
    DuplicateId,

    #[error("step depends on itself")]
    SelfDependency,

    #[error("step depends on later step {0}")]
    ForwardDependency(u32),

    #[error("step depends on unknown step {0}")]
    MissingDependency(u32),

    #[error("unknown worker '{0}'")]
    UnknownWorker(String),

    #[error("worker '{0}' is not registered")]
    UnregisteredWorker(String),

    #[error("parameter '{param}' references step {target}, which does not run earlier")]
    InvalidPlaceholder { param: String, target: u32 },
}

/// A malformed plan. Fatal to the run, raised before any worker is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid plan at step {step_id}: {kind}")]
pub struct ValidationError {
    /// Offending step; 0 when the plan as a whole is at fault.
    pub step_id: u32,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(step_id: u32, kind: ValidationErrorKind) -> Self {
        Self { step_id, kind }
    }
}

/// The planner could not produce a usable plan.
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("planner call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("planner response contained no JSON object")]
    NoStructuredOutput,

    #[error("planner response is not a valid plan: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("no planner configured")]
    Unavailable,
}

/// One worker invocation failed. Recorded in the ledger, never fatal.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{0}")]
    Provider(#[from] ProviderError),

    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("{0}")]
    Failed(String),

    #[error("cancelled")]
    Cancelled,
}

impl WorkerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Failure talking to an external text-generation or search service.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{service} API error: {message}")]
    Api {
        service: &'static str,
        message: String,
        status_code: Option<u16>,
    },

    #[error("{service} rate limited, retry after {retry_after:?}s")]
    RateLimited {
        service: &'static str,
        retry_after: Option<u64>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("empty response from {0}")]
    EmptyResponse(&'static str),
}

impl ProviderError {
    pub fn api(service: &'static str, message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Api {
            service,
            message: message.into(),
            status_code,
        }
    }

    /// Rate limits and server-side failures are worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::Api {
                status_code: Some(code),
                ..
            } => *code >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("run cancelled")]
    Cancelled,

    #[error("another run is in progress")]
    RunInProgress,

    #[error("no active project to export")]
    NoActiveProject,

    #[error("Export failed: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export(message.into())
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
