use std::sync::Arc;

use async_trait::async_trait;
use devcrew_core::{StateField, WorkerKind};
use futures::future::join_all;
use tracing::{debug, warn};

use super::{Worker, WorkerOutput};
use crate::error::WorkerError;
use crate::params::Parameters;
use crate::prompts::{self, WorkerPrompts};
use crate::services::{Generation, SearchHit, TextGenerator, WebSearch};
use crate::state::ProjectStateStore;

const SEARCH_MAX_RESULTS: usize = 5;

/// One member of the team, backed by a text generator (and, for research, a
/// web search service).
pub struct SpecialistWorker {
    kind: WorkerKind,
    generator: Arc<dyn TextGenerator>,
    search: Option<Arc<dyn WebSearch>>,
}

impl SpecialistWorker {
    pub fn new(
        kind: WorkerKind,
        generator: Arc<dyn TextGenerator>,
        search: Option<Arc<dyn WebSearch>>,
    ) -> Self {
        Self {
            kind,
            generator,
            search,
        }
    }

    async fn generate(&self, prompt: String) -> Result<String, WorkerError> {
        let request = Generation::new(prompt).with_temperature(prompts::temperature(self.kind));
        Ok(self.generator.generate(request).await?)
    }

    fn frame(&self, details: &[(&str, String)], body: &str) -> String {
        let mut header = format!("## {} Report", self.kind.display_name());
        for (label, value) in details {
            header.push_str(&format!("\n- {label}: {value}"));
        }
        format!("{header}\n\n{body}")
    }

    async fn research(&self, topic: &str, focus_areas: &[String]) -> Vec<SearchHit> {
        let Some(search) = &self.search else {
            warn!(topic, "No web search configured, researching without sources");
            return Vec::new();
        };

        let queries = WorkerPrompts::research_queries(topic, focus_areas);
        let results = join_all(
            queries
                .iter()
                .map(|query| search.search(query, SEARCH_MAX_RESULTS)),
        )
        .await;

        queries
            .iter()
            .zip(results)
            .flat_map(|(query, result)| match result {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = %query, error = %e, "Search failed, skipping");
                    Vec::new()
                }
            })
            .collect()
    }
}

fn required(params: &Parameters, name: &'static str) -> Result<String, WorkerError> {
    params.text(name).ok_or(WorkerError::MissingParameter(name))
}

async fn stored_or(state: &ProjectStateStore, field: StateField, fallback: &str) -> String {
    state
        .get(field)
        .await
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait]
impl Worker for SpecialistWorker {
    fn kind(&self) -> WorkerKind {
        self.kind
    }

    async fn invoke(
        &self,
        params: &Parameters,
        state: &ProjectStateStore,
    ) -> Result<WorkerOutput, WorkerError> {
        debug!(worker = %self.kind, params = params.len(), "Invoking specialist");

        match self.kind {
            WorkerKind::ProductAnalyst => {
                let request = required(params, "user_request")?;
                let context = params.text("additional_context");
                let text = self
                    .generate(WorkerPrompts::product_analyst(&request, context.as_deref()))
                    .await?;
                Ok(WorkerOutput::new(self.frame(&[], &text)).with_artifact(text))
            }
            WorkerKind::ResearchEngineer => {
                let topic = required(params, "topic")?;
                let focus_areas = params.list("focus_areas");
                let hits = self.research(&topic, &focus_areas).await;
                let searches = WorkerPrompts::research_queries(&topic, &focus_areas).len();
                let text = self
                    .generate(WorkerPrompts::research_engineer(&topic, &focus_areas, &hits))
                    .await?;
                let details = [
                    ("Searches performed", searches.to_string()),
                    ("Sources analyzed", hits.len().to_string()),
                ];
                Ok(WorkerOutput::new(self.frame(&details, &text)))
            }
            WorkerKind::SoftwareArchitect => {
                let requirements = match params.text("requirements") {
                    Some(requirements) => requirements,
                    None => {
                        stored_or(state, StateField::Requirements, "No requirements available")
                            .await
                    }
                };
                let findings = params.text("research_findings");
                let text = self
                    .generate(WorkerPrompts::software_architect(
                        &requirements,
                        findings.as_deref(),
                    ))
                    .await?;
                Ok(WorkerOutput::new(self.frame(&[], &text)).with_artifact(text))
            }
            WorkerKind::TechnicalLead => {
                let architecture = match params.text("architecture") {
                    Some(architecture) => architecture,
                    None => {
                        stored_or(state, StateField::Architecture, "No architecture available")
                            .await
                    }
                };
                let text = self
                    .generate(WorkerPrompts::technical_lead(&architecture))
                    .await?;
                Ok(WorkerOutput::new(self.frame(&[], &text)).with_artifact(text))
            }
            WorkerKind::SeniorDeveloper => {
                let module = required(params, "module_name")?;
                let specifications = required(params, "specifications")?;
                let language = required(params, "language")?;
                let architecture =
                    stored_or(state, StateField::Architecture, "See specifications").await;
                let text = self
                    .generate(WorkerPrompts::senior_developer(
                        &module,
                        &specifications,
                        &language,
                        &architecture,
                    ))
                    .await?;
                let details = [("Module", module), ("Language", language)];
                Ok(WorkerOutput::new(self.frame(&details, &text)).with_artifact(text))
            }
            WorkerKind::QaEngineer => {
                let module = required(params, "module_name")?;
                let test_type = required(params, "test_type")?;
                let code = match params.text("code") {
                    Some(code) => code,
                    None => state
                        .code_module(&module)
                        .await
                        .unwrap_or_else(|| "No code available".to_string()),
                };
                let architecture =
                    stored_or(state, StateField::Architecture, "No architecture available").await;
                let text = self
                    .generate(WorkerPrompts::qa_engineer(
                        &module,
                        &code,
                        &test_type,
                        &architecture,
                    ))
                    .await?;
                let details = [("Module", module), ("Test type", test_type)];
                Ok(WorkerOutput::new(self.frame(&details, &text)))
            }
            WorkerKind::DevopsEngineer => {
                let environment = required(params, "environment")?;
                let deployment_type = required(params, "deployment_type")?;
                let architecture =
                    stored_or(state, StateField::Architecture, "No architecture available").await;
                let text = self
                    .generate(WorkerPrompts::devops_engineer(
                        &environment,
                        &deployment_type,
                        &architecture,
                    ))
                    .await?;
                let details = [("Environment", environment), ("Deployment", deployment_type)];
                Ok(WorkerOutput::new(self.frame(&details, &text)).with_artifact(text))
            }
            WorkerKind::DocumentationSpecialist => {
                let doc_type = required(params, "doc_type")?;
                let requirements =
                    stored_or(state, StateField::Requirements, "No requirements").await;
                let architecture =
                    stored_or(state, StateField::Architecture, "No architecture").await;
                let plan =
                    stored_or(state, StateField::ImplementationPlan, "No implementation plan")
                        .await;
                let text = self
                    .generate(WorkerPrompts::documentation_specialist(
                        &doc_type,
                        &requirements,
                        &architecture,
                        &plan,
                    ))
                    .await?;
                let details = [("Documentation", doc_type)];
                Ok(WorkerOutput::new(self.frame(&details, &text)))
            }
        }
    }
}
