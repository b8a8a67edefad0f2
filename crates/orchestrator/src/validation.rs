//! Plan validation
//!
//! A plan is only executable once every step id is unique and positive, every
//! dependency and placeholder points strictly backwards, and every worker name
//! resolves to a registered [`WorkerKind`].

use std::collections::{BTreeSet, HashSet};

use devcrew_core::{Complexity, Plan, WorkerKind};
use serde_json::{Map, Value};

use crate::error::{ValidationError, ValidationErrorKind};
use crate::params::placeholder_refs;
use crate::workers::WorkerRegistry;

/// A step whose worker has been resolved and whose references are known valid.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedStep {
    pub id: u32,
    pub worker: WorkerKind,
    pub parameters: Map<String, Value>,
    pub depends_on: BTreeSet<u32>,
    /// Steps whose output is referenced from the parameters.
    pub placeholders: BTreeSet<u32>,
}

impl ValidatedStep {
    /// Every step that must finish before this one may start when dependencies
    /// are enforced.
    pub fn prerequisites(&self) -> BTreeSet<u32> {
        self.depends_on.union(&self.placeholders).copied().collect()
    }
}

/// Plan proven executable. Steps are held in ascending id order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPlan {
    plan: Plan,
    steps: Vec<ValidatedStep>,
}

impl ValidatedPlan {
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn project_name(&self) -> &str {
        &self.plan.project_name
    }

    pub fn complexity(&self) -> Complexity {
        self.plan.complexity
    }

    pub fn steps(&self) -> &[ValidatedStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn into_plan(self) -> Plan {
        self.plan
    }
}

/// Check `plan` against `registry`. Nothing is executed or mutated.
pub fn validate(plan: &Plan, registry: &WorkerRegistry) -> Result<ValidatedPlan, ValidationError> {
    if plan.steps.is_empty() {
        return Err(ValidationError::new(0, ValidationErrorKind::EmptyPlan));
    }

    let mut ids = HashSet::with_capacity(plan.steps.len());
    for step in &plan.steps {
        if step.id == 0 {
            return Err(ValidationError::new(0, ValidationErrorKind::NonPositiveId));
        }
        if !ids.insert(step.id) {
            return Err(ValidationError::new(step.id, ValidationErrorKind::DuplicateId));
        }
    }

    let mut ordered: Vec<_> = plan.steps.iter().collect();
    ordered.sort_by_key(|step| step.id);

    let mut steps = Vec::with_capacity(ordered.len());
    for step in ordered {
        let fail = |kind| ValidationError::new(step.id, kind);

        let worker = WorkerKind::parse(&step.worker)
            .ok_or_else(|| fail(ValidationErrorKind::UnknownWorker(step.worker.clone())))?;
        if !registry.contains(worker) {
            return Err(fail(ValidationErrorKind::UnregisteredWorker(
                step.worker.clone(),
            )));
        }

        for &dep in &step.depends_on {
            if dep == step.id {
                return Err(fail(ValidationErrorKind::SelfDependency));
            }
            if dep > step.id {
                return Err(fail(ValidationErrorKind::ForwardDependency(dep)));
            }
            if !ids.contains(&dep) {
                return Err(fail(ValidationErrorKind::MissingDependency(dep)));
            }
        }

        let mut placeholders = BTreeSet::new();
        for (name, value) in &step.parameters {
            for target in placeholder_refs(value) {
                if target >= step.id || !ids.contains(&target) {
                    return Err(fail(ValidationErrorKind::InvalidPlaceholder {
                        param: name.clone(),
                        target,
                    }));
                }
                placeholders.insert(target);
            }
        }

        steps.push(ValidatedStep {
            id: step.id,
            worker,
            parameters: step.parameters.clone(),
            depends_on: step.depends_on.clone(),
            placeholders,
        });
    }

    Ok(ValidatedPlan {
        plan: plan.clone(),
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkerError;
    use crate::params::Parameters;
    use crate::state::ProjectStateStore;
    use crate::workers::{Worker, WorkerOutput};
    use async_trait::async_trait;
    use devcrew_core::Step;
    use serde_json::json;
    use std::sync::Arc;

    struct Noop(WorkerKind);

    #[async_trait]
    impl Worker for Noop {
        fn kind(&self) -> WorkerKind {
            self.0
        }

        async fn invoke(
            &self,
            _params: &Parameters,
            _state: &ProjectStateStore,
        ) -> Result<WorkerOutput, WorkerError> {
            Ok(WorkerOutput::new("ok"))
        }
    }

    fn registry() -> WorkerRegistry {
        WorkerKind::ALL
            .into_iter()
            .fold(WorkerRegistry::new(), |r, kind| r.with_worker(Arc::new(Noop(kind))))
    }

    fn plan(steps: Vec<Step>) -> Plan {
        Plan::new("test", Complexity::Simple, steps)
    }

    #[test]
    fn test_backward_plan_is_valid_and_sorted() {
        let plan = plan(vec![
            Step::new(3, "technical_lead").depending_on([2]),
            Step::new(1, "product_analyst"),
            Step::new(2, "software_architect").depending_on([1]),
        ]);

        let validated = validate(&plan, &registry()).unwrap();
        let ids: Vec<_> = validated.steps().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(validated.steps()[1].worker, WorkerKind::SoftwareArchitect);
    }

    #[test]
    fn test_forward_reference_cites_step() {
        let plan = plan(vec![Step::new(1, "product_analyst").depending_on([2])]);

        let err = validate(&plan, &registry()).unwrap_err();
        assert_eq!(err.step_id, 1);
        assert_eq!(err.kind, ValidationErrorKind::ForwardDependency(2));
    }

    #[test]
    fn test_out_of_order_dependency_rejected() {
        let plan = plan(vec![
            Step::new(3, "technical_lead").depending_on([5]),
            Step::new(5, "product_analyst"),
        ]);

        let err = validate(&plan, &registry()).unwrap_err();
        assert_eq!(err, ValidationError::new(3, ValidationErrorKind::ForwardDependency(5)));
    }

    #[test]
    fn test_self_and_missing_dependencies() {
        let err = validate(&plan(vec![Step::new(2, "qa_engineer").depending_on([2])]), &registry())
            .unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::SelfDependency);

        let err = validate(&plan(vec![Step::new(4, "qa_engineer").depending_on([1])]), &registry())
            .unwrap_err();
        assert_eq!(err, ValidationError::new(4, ValidationErrorKind::MissingDependency(1)));
    }

    #[test]
    fn test_duplicate_and_zero_ids() {
        let err = validate(
            &plan(vec![Step::new(1, "qa_engineer"), Step::new(1, "devops_engineer")]),
            &registry(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::new(1, ValidationErrorKind::DuplicateId));

        let err = validate(&plan(vec![Step::new(0, "qa_engineer")]), &registry()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::NonPositiveId);
    }

    #[test]
    fn test_empty_plan() {
        let err = validate(&plan(vec![]), &registry()).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::EmptyPlan);
    }

    #[test]
    fn test_unknown_and_unregistered_workers() {
        let err = validate(&plan(vec![Step::new(1, "ux_designer")]), &registry()).unwrap_err();
        assert_eq!(
            err.kind,
            ValidationErrorKind::UnknownWorker("ux_designer".to_string())
        );

        let partial = WorkerRegistry::new().with_worker(Arc::new(Noop(WorkerKind::QaEngineer)));
        let err = validate(&plan(vec![Step::new(1, "product_analyst")]), &partial).unwrap_err();
        assert!(matches!(err.kind, ValidationErrorKind::UnregisteredWorker(_)));
    }

    #[test]
    fn test_placeholders_must_point_backwards() {
        let ok = plan(vec![
            Step::new(1, "product_analyst"),
            Step::new(2, "software_architect").with_param("requirements", "{{step:1}}"),
        ]);
        let validated = validate(&ok, &registry()).unwrap();
        assert_eq!(
            validated.steps()[1].prerequisites().into_iter().collect::<Vec<_>>(),
            vec![1]
        );

        let bad = plan(vec![
            Step::new(1, "product_analyst").with_param("additional_context", json!({"$step": 2})),
            Step::new(2, "software_architect"),
        ]);
        let err = validate(&bad, &registry()).unwrap_err();
        assert_eq!(err.step_id, 1);
        assert_eq!(
            err.kind,
            ValidationErrorKind::InvalidPlaceholder {
                param: "additional_context".to_string(),
                target: 2
            }
        );
    }
}
