use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Scalar artifacts of the project state.
///
/// Code modules are keyed by name and addressed separately.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    CurrentProject,
    Requirements,
    Architecture,
    ImplementationPlan,
    DeploymentPlan,
}

impl StateField {
    pub const ALL: [StateField; 5] = [
        StateField::CurrentProject,
        StateField::Requirements,
        StateField::Architecture,
        StateField::ImplementationPlan,
        StateField::DeploymentPlan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentProject => "current_project",
            Self::Requirements => "requirements",
            Self::Architecture => "architecture",
            Self::ImplementationPlan => "implementation_plan",
            Self::DeploymentPlan => "deployment_plan",
        }
    }
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single mutation produced by a completed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateWrite {
    Field { field: StateField, value: String },
    CodeModule { name: String, content: String },
}

/// Accumulated artifacts of the active project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProjectState {
    pub current_project: Option<String>,
    pub requirements: Option<String>,
    pub architecture: Option<String>,
    pub implementation_plan: Option<String>,
    /// Module name to source text, in insertion order.
    #[schema(value_type = Object)]
    pub code_modules: IndexMap<String, String>,
    pub deployment_plan: Option<String>,
    /// Bumped on every mutation.
    pub version: u64,
}

impl ProjectState {
    pub fn get(&self, field: StateField) -> Option<&str> {
        let value = match field {
            StateField::CurrentProject => &self.current_project,
            StateField::Requirements => &self.requirements,
            StateField::Architecture => &self.architecture,
            StateField::ImplementationPlan => &self.implementation_plan,
            StateField::DeploymentPlan => &self.deployment_plan,
        };
        value.as_deref()
    }

    pub fn set(&mut self, field: StateField, value: impl Into<String>) {
        let slot = match field {
            StateField::CurrentProject => &mut self.current_project,
            StateField::Requirements => &mut self.requirements,
            StateField::Architecture => &mut self.architecture,
            StateField::ImplementationPlan => &mut self.implementation_plan,
            StateField::DeploymentPlan => &mut self.deployment_plan,
        };
        *slot = Some(value.into());
        self.version += 1;
    }

    pub fn set_code_module(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.code_modules.insert(name.into(), content.into());
        self.version += 1;
    }

    pub fn apply(&mut self, write: StateWrite) {
        match write {
            StateWrite::Field { field, value } => self.set(field, value),
            StateWrite::CodeModule { name, content } => self.set_code_module(name, content),
        }
    }

    /// Clears every artifact. The version keeps counting so readers can tell
    /// a reset happened; clearing an already empty state changes nothing.
    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }
        let version = self.version;
        *self = Self {
            version: version + 1,
            ..Self::default()
        };
    }

    /// True when no artifact is present.
    pub fn is_empty(&self) -> bool {
        StateField::ALL.iter().all(|field| self.get(*field).is_none())
            && self.code_modules.is_empty()
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            name: self.current_project.clone(),
            has_requirements: self.requirements.is_some(),
            has_architecture: self.architecture.is_some(),
            has_implementation_plan: self.implementation_plan.is_some(),
            code_modules_count: self.code_modules.len(),
            code_modules: self.code_modules.keys().cloned().collect(),
            has_deployment_plan: self.deployment_plan.is_some(),
            completed_phases: self.completed_phases(),
            version: self.version,
        }
    }

    /// Names of the phases whose artifacts are present, in delivery order.
    pub fn completed_phases(&self) -> Vec<String> {
        let mut phases = Vec::new();
        if self.requirements.is_some() {
            phases.push("requirements");
        }
        if self.architecture.is_some() {
            phases.push("architecture");
        }
        if self.implementation_plan.is_some() {
            phases.push("implementation_plan");
        }
        if !self.code_modules.is_empty() {
            phases.push("code");
        }
        if self.deployment_plan.is_some() {
            phases.push("deployment");
        }
        phases.into_iter().map(str::to_string).collect()
    }
}

/// Read-only progress view of the project state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProjectSummary {
    pub name: Option<String>,
    pub has_requirements: bool,
    pub has_architecture: bool,
    pub has_implementation_plan: bool,
    pub code_modules_count: usize,
    pub code_modules: Vec<String>,
    pub has_deployment_plan: bool,
    pub completed_phases: Vec<String>,
    pub version: u64,
}

impl ProjectSummary {
    pub fn is_active(&self) -> bool {
        self.name.is_some()
    }
}
