use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::worker::WorkerKind;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Complexity {
    Simple,
    #[default]
    Moderate,
    Complex,
    Enterprise,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
            Self::Enterprise => "enterprise",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Some(Self::Simple),
            "moderate" => Some(Self::Moderate),
            "complex" => Some(Self::Complex),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }
}

/// Planners are free-form about casing; anything unrecognised is treated as
/// moderate rather than failing the whole plan.
impl From<String> for Complexity {
    fn from(value: String) -> Self {
        Self::parse(&value).unwrap_or_default()
    }
}

/// Which part of the team a run should involve.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// All eight specialists.
    #[default]
    Full,
    /// Analysis, research and architecture.
    Planning,
    /// Planning plus technical lead and developer.
    Implementation,
    /// Implementation plus QA and DevOps.
    Deployment,
    /// Planner picks based on the request.
    Custom,
}

impl ExecutionMode {
    pub const ALL: [ExecutionMode; 5] = [
        ExecutionMode::Full,
        ExecutionMode::Planning,
        ExecutionMode::Implementation,
        ExecutionMode::Deployment,
        ExecutionMode::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Planning => "planning",
            Self::Implementation => "implementation",
            Self::Deployment => "deployment",
            Self::Custom => "custom",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s.trim().to_ascii_lowercase())
    }

    /// Workers the mode suggests to the planner. `Custom` suggests all of them.
    pub fn workers(&self) -> &'static [WorkerKind] {
        let all = &WorkerKind::ALL;
        match self {
            Self::Planning => &all[..3],
            Self::Implementation => &all[..5],
            Self::Deployment => &all[..7],
            Self::Full | Self::Custom => all,
        }
    }

    pub fn guideline(&self) -> &'static str {
        match self {
            Self::Full => "Use all 8 team members for complete project delivery",
            Self::Planning => "Use members 1-3 (analysis, research, architecture)",
            Self::Implementation => "Use members 1-5 (add implementation)",
            Self::Deployment => "Use members 1-7 (add DevOps)",
            Self::Custom => "Choose members based on request complexity",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::UnknownMode(s.to_string()))
    }
}

/// One unit of work bound to a worker and a parameter bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Step {
    #[serde(alias = "step")]
    pub id: u32,
    /// Worker name as written by the planner; resolved during validation.
    #[serde(alias = "agent")]
    pub worker: String,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(value_type = Object)]
    pub parameters: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    #[schema(value_type = Vec<u32>)]
    pub depends_on: BTreeSet<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

impl Step {
    pub fn new(id: u32, worker: impl Into<String>) -> Self {
        Self {
            id,
            worker: worker.into(),
            parameters: Map::new(),
            depends_on: BTreeSet::new(),
            reason: None,
            estimated_time: None,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn depending_on(mut self, ids: impl IntoIterator<Item = u32>) -> Self {
        self.depends_on.extend(ids);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Structured output of a planning call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Plan {
    #[serde(default = "unnamed_project")]
    pub project_name: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(alias = "team_workflow")]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_mode: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_modules: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub success_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_total_time: Option<String>,
}

fn unnamed_project() -> String {
    "Unnamed Project".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Plan {
    pub fn new(project_name: impl Into<String>, complexity: Complexity, steps: Vec<Step>) -> Self {
        Self {
            project_name: project_name.into(),
            complexity,
            steps,
            analysis: None,
            recommended_mode: None,
            key_modules: Vec::new(),
            success_criteria: Vec::new(),
            estimated_total_time: None,
        }
    }

    pub fn step(&self, id: u32) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == id)
    }
}
