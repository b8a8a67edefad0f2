use std::collections::BTreeMap;
use std::sync::Arc;

use devcrew_core::{StateTarget, WorkerKind};
use serde::Serialize;

use super::{SpecialistWorker, Worker};
use crate::services::{TextGenerator, WebSearch};

/// Catalog entry describing one parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ParamInfo {
    pub name: String,
    pub default: Option<String>,
    pub description: String,
}

/// Catalog entry describing one registered worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct WorkerInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub parameters: Vec<ParamInfo>,
    /// Project state entry written on success.
    pub populates: Option<String>,
}

impl WorkerInfo {
    pub fn of(kind: WorkerKind) -> Self {
        Self {
            name: kind.as_str().to_string(),
            display_name: kind.display_name().to_string(),
            description: kind.description().to_string(),
            parameters: kind
                .parameters()
                .iter()
                .map(|spec| ParamInfo {
                    name: spec.name.to_string(),
                    default: spec.default.map(str::to_string),
                    description: spec.description.to_string(),
                })
                .collect(),
            populates: kind.populates().map(|target| match target {
                StateTarget::Field(field) => field.as_str().to_string(),
                StateTarget::CodeModule => "code_modules".to_string(),
            }),
        }
    }
}

/// Workers available to a run, keyed by kind.
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<WorkerKind, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All eight specialists backed by the given collaborators.
    pub fn specialists(
        generator: Arc<dyn TextGenerator>,
        search: Option<Arc<dyn WebSearch>>,
    ) -> Self {
        WorkerKind::ALL
            .into_iter()
            .fold(Self::new(), |registry, kind| {
                registry.with_worker(Arc::new(SpecialistWorker::new(
                    kind,
                    Arc::clone(&generator),
                    search.clone(),
                )))
            })
    }

    pub fn with_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.register(worker);
        self
    }

    /// Register a worker, replacing any previous worker of the same kind.
    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.workers.insert(worker.kind(), worker);
    }

    pub fn get(&self, kind: WorkerKind) -> Option<&Arc<dyn Worker>> {
        self.workers.get(&kind)
    }

    pub fn contains(&self, kind: WorkerKind) -> bool {
        self.workers.contains_key(&kind)
    }

    /// Registered kinds in canonical team order.
    pub fn kinds(&self) -> impl Iterator<Item = WorkerKind> + '_ {
        self.workers.keys().copied()
    }

    pub fn catalog(&self) -> Vec<WorkerInfo> {
        self.kinds().map(WorkerInfo::of).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.workers.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::services::Generation;
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl TextGenerator for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn generate(&self, _request: Generation) -> Result<String, ProviderError> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_specialists_registers_whole_team_in_order() {
        let registry = WorkerRegistry::specialists(Arc::new(Silent), None);

        assert_eq!(registry.len(), 8);
        let kinds: Vec<_> = registry.kinds().collect();
        assert_eq!(kinds, WorkerKind::ALL.to_vec());
    }

    #[test]
    fn test_catalog_entry() {
        let info = WorkerInfo::of(WorkerKind::SeniorDeveloper);

        assert_eq!(info.name, "senior_developer");
        assert_eq!(info.populates.as_deref(), Some("code_modules"));
        assert_eq!(info.parameters[2].name, "language");
        assert_eq!(info.parameters[2].default.as_deref(), Some("python"));
        assert_eq!(WorkerInfo::of(WorkerKind::QaEngineer).populates, None);
    }

    #[test]
    fn test_empty_registry() {
        let registry = WorkerRegistry::new();
        assert!(registry.is_empty());
        assert!(!registry.contains(WorkerKind::ProductAnalyst));
        assert!(registry.catalog().is_empty());
    }
}
