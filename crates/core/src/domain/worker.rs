use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::state::StateField;
use crate::error::CoreError;

/// The closed set of specialist workers a plan may dispatch to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    ProductAnalyst,
    ResearchEngineer,
    SoftwareArchitect,
    TechnicalLead,
    SeniorDeveloper,
    QaEngineer,
    DevopsEngineer,
    DocumentationSpecialist,
}

/// One entry of a worker's ordered parameter list.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Value used when neither the step nor the run supplies one.
    pub default: Option<&'static str>,
    pub description: &'static str,
}

impl ParamSpec {
    const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            default: None,
            description,
        }
    }

    const fn with_default(
        name: &'static str,
        default: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            default: Some(default),
            description,
        }
    }
}

/// Where a worker's artifact lands in the project state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateTarget {
    Field(StateField),
    /// Keyed by the step's `module_name` parameter.
    CodeModule,
}

const PRODUCT_ANALYST_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("user_request", "The application idea or requirements"),
    ParamSpec::new("additional_context", "Additional context or constraints"),
];

const RESEARCH_ENGINEER_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("topic", "What to research"),
    ParamSpec::new("focus_areas", "Specific aspects to focus on"),
];

const SOFTWARE_ARCHITECT_PARAMS: &[ParamSpec] = &[
    ParamSpec::new("requirements", "Product requirements, defaults to stored requirements"),
    ParamSpec::new("research_findings", "Research report used as context"),
];

const TECHNICAL_LEAD_PARAMS: &[ParamSpec] = &[ParamSpec::new(
    "architecture",
    "Architecture document, defaults to stored architecture",
)];

const SENIOR_DEVELOPER_PARAMS: &[ParamSpec] = &[
    ParamSpec::with_default("module_name", "main_module", "Name of the module to implement"),
    ParamSpec::with_default(
        "specifications",
        "Implement according to architecture",
        "Detailed specifications for the module",
    ),
    ParamSpec::with_default("language", "python", "Programming language"),
];

const QA_ENGINEER_PARAMS: &[ParamSpec] = &[
    ParamSpec::with_default("module_name", "main_module", "Name of the module to test"),
    ParamSpec::new("code", "Code under test, defaults to the stored module"),
    ParamSpec::with_default("test_type", "comprehensive", "unit, integration, e2e or comprehensive"),
];

const DEVOPS_ENGINEER_PARAMS: &[ParamSpec] = &[
    ParamSpec::with_default("environment", "production", "Target environment"),
    ParamSpec::with_default("deployment_type", "cloud", "cloud, on-premise or serverless"),
];

const DOCUMENTATION_SPECIALIST_PARAMS: &[ParamSpec] = &[ParamSpec::with_default(
    "doc_type",
    "complete",
    "readme, api, user_guide, developer_guide or complete",
)];

impl WorkerKind {
    pub const ALL: [WorkerKind; 8] = [
        WorkerKind::ProductAnalyst,
        WorkerKind::ResearchEngineer,
        WorkerKind::SoftwareArchitect,
        WorkerKind::TechnicalLead,
        WorkerKind::SeniorDeveloper,
        WorkerKind::QaEngineer,
        WorkerKind::DevopsEngineer,
        WorkerKind::DocumentationSpecialist,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductAnalyst => "product_analyst",
            Self::ResearchEngineer => "research_engineer",
            Self::SoftwareArchitect => "software_architect",
            Self::TechnicalLead => "technical_lead",
            Self::SeniorDeveloper => "senior_developer",
            Self::QaEngineer => "qa_engineer",
            Self::DevopsEngineer => "devops_engineer",
            Self::DocumentationSpecialist => "documentation_specialist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s.trim())
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ProductAnalyst => "Product Analyst",
            Self::ResearchEngineer => "Research Engineer",
            Self::SoftwareArchitect => "Software Architect",
            Self::TechnicalLead => "Technical Lead",
            Self::SeniorDeveloper => "Senior Developer",
            Self::QaEngineer => "QA Engineer",
            Self::DevopsEngineer => "DevOps Engineer",
            Self::DocumentationSpecialist => "Documentation Specialist",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::ProductAnalyst => "Requirements and product specifications",
            Self::ResearchEngineer => "Technology research and best practices",
            Self::SoftwareArchitect => "System architecture design",
            Self::TechnicalLead => "Implementation planning and task breakdown",
            Self::SeniorDeveloper => "Code implementation",
            Self::QaEngineer => "Testing and quality assurance",
            Self::DevopsEngineer => "Deployment and infrastructure",
            Self::DocumentationSpecialist => "Project documentation",
        }
    }

    /// Ordered parameter list accepted by this worker.
    pub fn parameters(&self) -> &'static [ParamSpec] {
        match self {
            Self::ProductAnalyst => PRODUCT_ANALYST_PARAMS,
            Self::ResearchEngineer => RESEARCH_ENGINEER_PARAMS,
            Self::SoftwareArchitect => SOFTWARE_ARCHITECT_PARAMS,
            Self::TechnicalLead => TECHNICAL_LEAD_PARAMS,
            Self::SeniorDeveloper => SENIOR_DEVELOPER_PARAMS,
            Self::QaEngineer => QA_ENGINEER_PARAMS,
            Self::DevopsEngineer => DEVOPS_ENGINEER_PARAMS,
            Self::DocumentationSpecialist => DOCUMENTATION_SPECIALIST_PARAMS,
        }
    }

    pub fn param(&self, name: &str) -> Option<&'static ParamSpec> {
        self.parameters().iter().find(|spec| spec.name == name)
    }

    /// The project state field this worker's artifact is written to, if any.
    pub fn populates(&self) -> Option<StateTarget> {
        match self {
            Self::ProductAnalyst => Some(StateTarget::Field(StateField::Requirements)),
            Self::SoftwareArchitect => Some(StateTarget::Field(StateField::Architecture)),
            Self::TechnicalLead => Some(StateTarget::Field(StateField::ImplementationPlan)),
            Self::SeniorDeveloper => Some(StateTarget::CodeModule),
            Self::DevopsEngineer => Some(StateTarget::Field(StateField::DeploymentPlan)),
            Self::ResearchEngineer | Self::QaEngineer | Self::DocumentationSpecialist => None,
        }
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WorkerKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::UnknownWorker(s.to_string()))
    }
}
