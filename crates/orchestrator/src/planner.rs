//! Planning collaborators: turn a request into a [`Plan`].

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use devcrew_core::{ExecutionMode, Plan};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::PlanningError;
use crate::prompts::WorkerPrompts;
use crate::services::{Generation, TextGenerator};

const PLANNER_TEMPERATURE: f32 = 0.3;
const PLANNER_MAX_TOKENS: u32 = 4096;

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &str, mode: ExecutionMode) -> Result<Plan, PlanningError>;
}

/// Asks a text generator for a JSON plan.
pub struct LlmPlanner {
    generator: Arc<dyn TextGenerator>,
}

impl LlmPlanner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, request: &str, mode: ExecutionMode) -> Result<Plan, PlanningError> {
        info!(mode = %mode, "Planning request");

        let generation = Generation::new(WorkerPrompts::planner(request, mode))
            .with_temperature(PLANNER_TEMPERATURE)
            .with_max_tokens(PLANNER_MAX_TOKENS);
        let response = self.generator.generate(generation).await?;

        let plan = parse_plan(&response).map_err(|e| {
            warn!(error = %e, response_len = response.len(), "Planner output unusable");
            e
        })?;
        debug!(
            project = %plan.project_name,
            steps = plan.steps.len(),
            "Plan received"
        );
        Ok(plan)
    }
}

fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("Invalid JSON object regex pattern"))
}

/// Extract the outermost JSON object from free text and deserialize it.
pub fn parse_plan(text: &str) -> Result<Plan, PlanningError> {
    let json = json_object_pattern()
        .find(text)
        .ok_or(PlanningError::NoStructuredOutput)?;
    Ok(serde_json::from_str(json.as_str())?)
}

/// Returns the same plan for every request.
#[derive(Debug, Clone)]
pub struct StaticPlanner {
    plan: Plan,
}

impl StaticPlanner {
    pub fn new(plan: Plan) -> Self {
        Self { plan }
    }

    /// Accepts the same JSON a planning model would produce, surrounding text
    /// included.
    pub fn from_json(text: &str) -> Result<Self, PlanningError> {
        parse_plan(text).map(Self::new)
    }
}

#[async_trait]
impl Planner for StaticPlanner {
    async fn plan(&self, _request: &str, _mode: ExecutionMode) -> Result<Plan, PlanningError> {
        Ok(self.plan.clone())
    }
}
