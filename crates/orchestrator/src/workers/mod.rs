//! Specialist workers and the registry the executor dispatches through.

mod registry;
mod specialist;

use async_trait::async_trait;
use devcrew_core::WorkerKind;

use crate::error::WorkerError;
use crate::params::Parameters;
use crate::state::ProjectStateStore;

pub use registry::{ParamInfo, WorkerInfo, WorkerRegistry};
pub use specialist::SpecialistWorker;

/// What a successful invocation hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutput {
    /// Text recorded in the ledger.
    pub report: String,
    /// Raw text stored in the project state, when it differs from the report.
    pub artifact: Option<String>,
}

impl WorkerOutput {
    pub fn new(report: impl Into<String>) -> Self {
        Self {
            report: report.into(),
            artifact: None,
        }
    }

    pub fn with_artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = Some(artifact.into());
        self
    }

    /// The text to store if the worker populates a state field.
    pub fn artifact(&self) -> &str {
        self.artifact.as_deref().unwrap_or(&self.report)
    }
}

/// A named capability that accepts a parameter bag and returns text or fails.
///
/// Workers may read the project state but never write it; the executor stores
/// the artifact of workers that declare a state field.
#[async_trait]
pub trait Worker: Send + Sync {
    fn kind(&self) -> WorkerKind;

    async fn invoke(
        &self,
        params: &Parameters,
        state: &ProjectStateStore,
    ) -> Result<WorkerOutput, WorkerError>;
}
