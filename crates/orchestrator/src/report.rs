//! Final delivery report for a run.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use devcrew_core::{Complexity, ExecutionLedger, Plan, ProjectState, ProjectSummary, WorkerKind};
use serde::Serialize;
use tracing::{info, warn};

use crate::prompts::{truncate_chars, WorkerPrompts};
use crate::services::{Generation, TextGenerator};

/// Characters of each step's text shown in the status table.
pub const PREVIEW_CHARS: usize = 800;
/// Characters of each step's text handed to the narrative generator.
pub const NARRATIVE_INPUT_CHARS: usize = 500;

const NARRATIVE_TEMPERATURE: f32 = 0.4;
const NARRATIVE_MAX_TOKENS: u32 = 4096;
const NO_GENERATOR_NOTICE: &str = "Narrative summary unavailable: no text generator configured.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum RowStatus {
    Succeeded,
    Failed,
    NotRun,
}

impl RowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::NotRun => "not run",
        }
    }
}

/// One line of the status table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StepRow {
    pub step_id: u32,
    pub worker: String,
    pub status: RowStatus,
    /// Output on success, error on failure, truncated.
    pub preview: Option<String>,
    pub truncated: bool,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Narrative {
    Generated(String),
    /// Plain notice used when synthesis failed or was not possible.
    Unavailable(String),
}

impl Narrative {
    pub fn text(&self) -> &str {
        match self {
            Self::Generated(text) | Self::Unavailable(text) => text,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Report {
    pub request: String,
    pub project_name: String,
    pub complexity: Complexity,
    pub generated_at: DateTime<Utc>,
    pub steps: Vec<StepRow>,
    pub succeeded: usize,
    pub failed: usize,
    pub not_run: usize,
    pub cancelled: bool,
    pub halted: bool,
    pub narrative: Narrative,
    pub project: ProjectSummary,
}

impl Report {
    pub fn total(&self) -> usize {
        self.steps.len()
    }

    /// Every step ran and succeeded.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.not_run == 0
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(72);

        let _ = writeln!(out, "{rule}\n{}\n{rule}", self.project_name);
        let _ = writeln!(out, "Request: {}", self.request);
        let _ = writeln!(out, "Complexity: {}", self.complexity.as_str());
        let _ = writeln!(out, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));

        let _ = writeln!(out, "\nSTEPS");
        for row in &self.steps {
            let duration = row
                .duration_ms
                .map(|ms| format!(" ({ms} ms)"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "\n[{}] {}: {}{}",
                row.step_id,
                row.worker,
                row.status.as_str(),
                duration
            );
            if let Some(preview) = &row.preview {
                let ellipsis = if row.truncated { "..." } else { "" };
                let _ = writeln!(out, "{preview}{ellipsis}");
            }
        }

        let _ = writeln!(
            out,
            "\nTOTALS: {} succeeded, {} failed, {} not run ({} steps)",
            self.succeeded,
            self.failed,
            self.not_run,
            self.total()
        );
        if self.cancelled {
            let _ = writeln!(out, "The run was cancelled before every step was attempted.");
        }
        if self.halted {
            let _ = writeln!(out, "The run halted after a failed step.");
        }

        let _ = writeln!(out, "\n{rule}\nPROJECT SUMMARY\n{rule}\n{}", self.narrative.text());
        out
    }
}

/// Builds the report. Never fails.
#[derive(Clone, Default)]
pub struct ReportAssembler {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl ReportAssembler {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub async fn assemble(
        &self,
        request: &str,
        plan: &Plan,
        ledger: &ExecutionLedger,
        snapshot: &ProjectState,
    ) -> Report {
        let mut step_ids: Vec<u32> = plan.steps.iter().map(|step| step.id).collect();
        step_ids.sort_unstable();

        let steps: Vec<StepRow> = step_ids
            .iter()
            .map(|&id| match ledger.get(id) {
                Some(result) => {
                    let text = result.text();
                    let preview = truncate_chars(text, PREVIEW_CHARS);
                    StepRow {
                        step_id: id,
                        worker: result.worker.as_str().to_string(),
                        status: if result.is_success() {
                            RowStatus::Succeeded
                        } else {
                            RowStatus::Failed
                        },
                        truncated: preview.len() < text.len(),
                        preview: Some(preview.to_string()),
                        duration_ms: Some(result.duration_ms),
                    }
                }
                None => StepRow {
                    step_id: id,
                    worker: plan
                        .step(id)
                        .map(|step| step.worker.clone())
                        .unwrap_or_default(),
                    status: RowStatus::NotRun,
                    preview: None,
                    truncated: false,
                    duration_ms: None,
                },
            })
            .collect();

        let succeeded = ledger.succeeded_count();
        let failed = ledger.failed_count();
        let not_run = steps.len().saturating_sub(ledger.len());

        let narrative = self.narrative(request, plan, ledger).await;
        info!(
            project = %plan.project_name,
            succeeded,
            failed,
            not_run,
            "Report assembled"
        );

        Report {
            request: request.to_string(),
            project_name: plan.project_name.clone(),
            complexity: plan.complexity,
            generated_at: Utc::now(),
            steps,
            succeeded,
            failed,
            not_run,
            cancelled: ledger.cancelled,
            halted: ledger.halted,
            narrative,
            project: snapshot.summary(),
        }
    }

    async fn narrative(&self, request: &str, plan: &Plan, ledger: &ExecutionLedger) -> Narrative {
        let Some(generator) = &self.generator else {
            return Narrative::Unavailable(NO_GENERATOR_NOTICE.to_string());
        };

        let outputs: Vec<(u32, WorkerKind, &str)> = ledger
            .iter()
            .map(|r| (r.step_id, r.worker, truncate_chars(r.text(), NARRATIVE_INPUT_CHARS)))
            .collect();
        let generation = Generation::new(WorkerPrompts::summary(request, &plan.project_name, &outputs))
            .with_temperature(NARRATIVE_TEMPERATURE)
            .with_max_tokens(NARRATIVE_MAX_TOKENS);

        match generator.generate(generation).await {
            Ok(text) => Narrative::Generated(text),
            Err(e) => {
                warn!(error = %e, "Narrative synthesis failed");
                Narrative::Unavailable(format!("Narrative summary unavailable: {e}"))
            }
        }
    }
}

/// Plain-text overview of a plan, shown when a run only previews.
pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Project: {}", plan.project_name);
    let _ = writeln!(out, "Complexity: {}", plan.complexity.as_str().to_uppercase());
    if let Some(time) = &plan.estimated_total_time {
        let _ = writeln!(out, "Estimated time: {time}");
    }
    if let Some(analysis) = &plan.analysis {
        let _ = writeln!(out, "\nANALYSIS\n{analysis}");
    }
    if !plan.success_criteria.is_empty() {
        let _ = writeln!(out, "\nSUCCESS CRITERIA");
        for criterion in &plan.success_criteria {
            let _ = writeln!(out, "  - {criterion}");
        }
    }

    let _ = writeln!(out, "\nWORKFLOW ({} steps)", plan.steps.len());
    let mut steps: Vec<_> = plan.steps.iter().collect();
    steps.sort_by_key(|step| step.id);
    for step in steps {
        let title = step.worker.to_uppercase().replace('_', " ");
        let _ = writeln!(out, "\n  Step {}: {}", step.id, title);
        if let Some(time) = &step.estimated_time {
            let _ = writeln!(out, "    Time: {time}");
        }
        if let Some(reason) = &step.reason {
            let _ = writeln!(out, "    Reason: {reason}");
        }
        if !step.depends_on.is_empty() {
            let deps: Vec<String> = step.depends_on.iter().map(u32::to_string).collect();
            let _ = writeln!(out, "    Depends on steps: {}", deps.join(", "));
        }
    }

    if !plan.key_modules.is_empty() {
        let _ = writeln!(out, "\nKEY MODULES");
        for module in &plan.key_modules {
            let _ = writeln!(out, "  - {module}");
        }
    }
    out
}

impl std::fmt::Debug for ReportAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReportAssembler")
            .field("has_generator", &self.generator.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use devcrew_core::{Step, StepResult};

    struct Failing;

    #[async_trait::async_trait]
    impl TextGenerator for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _request: Generation) -> Result<String, ProviderError> {
            Err(ProviderError::api("gemini", "quota exceeded", Some(403)))
        }
    }

    struct Echo;

    #[async_trait::async_trait]
    impl TextGenerator for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, request: Generation) -> Result<String, ProviderError> {
            Ok(request.prompt)
        }
    }

    fn three_step_plan() -> Plan {
        Plan::new(
            "Tasky",
            Complexity::Simple,
            vec![
                Step::new(1, "product_analyst"),
                Step::new(2, "research_engineer"),
                Step::new(3, "software_architect"),
            ],
        )
    }

    #[tokio::test]
    async fn test_all_steps_succeeded() {
        let mut ledger = ExecutionLedger::new();
        ledger.record(StepResult::succeeded(1, WorkerKind::ProductAnalyst, "a"));
        ledger.record(StepResult::succeeded(2, WorkerKind::ResearchEngineer, "b"));
        ledger.record(StepResult::succeeded(3, WorkerKind::SoftwareArchitect, "c"));

        let report = ReportAssembler::default()
            .assemble("todo app", &three_step_plan(), &ledger, &ProjectState::default())
            .await;

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.total(), 3);
        assert!(report.is_success());
        assert!(report.render().contains("3 succeeded, 0 failed, 0 not run"));
        assert_eq!(report.narrative.text(), NO_GENERATOR_NOTICE);
    }

    #[tokio::test]
    async fn test_collaborator_failure_still_yields_table() {
        let mut ledger = ExecutionLedger::new();
        ledger.record(StepResult::failed(1, WorkerKind::ProductAnalyst, "timeout"));
        ledger.cancelled = true;

        let report = ReportAssembler::new(Some(Arc::new(Failing)))
            .assemble("todo app", &three_step_plan(), &ledger, &ProjectState::default())
            .await;

        assert!(matches!(report.narrative, Narrative::Unavailable(_)));
        assert!(report.narrative.text().contains("quota exceeded"));
        assert_eq!(report.failed, 1);
        assert_eq!(report.not_run, 2);
        let statuses: Vec<_> = report.steps.iter().map(|row| row.status).collect();
        assert_eq!(
            statuses,
            vec![RowStatus::Failed, RowStatus::NotRun, RowStatus::NotRun]
        );
        assert_eq!(report.steps[1].worker, "research_engineer");
        assert!(report.render().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_preview_and_narrative_truncation() {
        let long = "é".repeat(PREVIEW_CHARS + 50);
        let mut ledger = ExecutionLedger::new();
        ledger.record(StepResult::succeeded(1, WorkerKind::ProductAnalyst, long));
        let plan = Plan::new("Long", Complexity::Moderate, vec![Step::new(1, "product_analyst")]);

        let report = ReportAssembler::new(Some(Arc::new(Echo)))
            .assemble("long", &plan, &ledger, &ProjectState::default())
            .await;

        let row = &report.steps[0];
        assert!(row.truncated);
        assert_eq!(row.preview.as_ref().unwrap().chars().count(), PREVIEW_CHARS);
        let narrative = report.narrative.text();
        assert!(narrative.contains(&"é".repeat(NARRATIVE_INPUT_CHARS)));
        assert!(!narrative.contains(&"é".repeat(NARRATIVE_INPUT_CHARS + 1)));
    }

    #[test]
    fn test_render_plan() {
        let mut plan = three_step_plan();
        plan.steps[1] = Step::new(2, "research_engineer")
            .depending_on([1])
            .with_reason("Pick a stack");
        plan.key_modules = vec!["api".to_string()];

        let text = render_plan(&plan);
        assert!(text.contains("Step 2: RESEARCH ENGINEER"));
        assert!(text.contains("Depends on steps: 1"));
        assert!(text.contains("Reason: Pick a stack"));
        assert!(text.contains("KEY MODULES"));
    }
}
