use devcrew_core::{ExecutionMode, WorkerKind};

use crate::services::SearchHit;

/// Characters of stored architecture embedded as context by downstream workers.
pub const ARCHITECTURE_CONTEXT_CHARS: usize = 1000;
/// Characters of code handed to the QA engineer.
pub const QA_CODE_CHARS: usize = 6000;
/// Characters of serialized search results handed to the research synthesis.
pub const RESEARCH_DATA_CHARS: usize = 12000;

/// Truncate to at most `max` characters without splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Sampling temperature used for each specialist.
pub fn temperature(kind: WorkerKind) -> f32 {
    match kind {
        WorkerKind::ProductAnalyst => 0.5,
        WorkerKind::ResearchEngineer => 0.4,
        WorkerKind::SoftwareArchitect | WorkerKind::TechnicalLead => 0.3,
        WorkerKind::SeniorDeveloper | WorkerKind::QaEngineer | WorkerKind::DevopsEngineer => 0.2,
        WorkerKind::DocumentationSpecialist => 0.3,
    }
}

pub struct WorkerPrompts;

impl WorkerPrompts {
    pub fn product_analyst(user_request: &str, additional_context: Option<&str>) -> String {
        format!(
            r#"You are the Product Analyst on a software engineering team.

## Request
{user_request}

## Additional Context
{context}

## Required Output
1. Project overview: suggested name, short description, target users, problem solved
2. Core requirements split into MVP, phase 2 and future
3. At least five user stories with acceptance criteria
4. Key user flows and UX priorities
5. Success metrics
6. Constraints and risks
7. Open questions and assumptions

Be specific and developer-friendly."#,
            context = additional_context.unwrap_or("None provided"),
        )
    }

    pub fn research_queries(topic: &str, focus_areas: &[String]) -> Vec<String> {
        let mut queries = vec![
            format!("{topic} best practices 2024 2025"),
            format!("{topic} architecture patterns"),
            format!("{topic} technology stack recommendations"),
        ];
        queries.extend(
            focus_areas
                .iter()
                .take(2)
                .map(|area| format!("{topic} {area} solutions")),
        );
        queries.truncate(4);
        queries
    }

    pub fn research_engineer(topic: &str, focus_areas: &[String], hits: &[SearchHit]) -> String {
        let data = serde_json::to_string_pretty(hits).unwrap_or_default();
        let focus = if focus_areas.is_empty() {
            "General best practices".to_string()
        } else {
            focus_areas.join(", ")
        };
        format!(
            r#"You are the Research Engineer analyzing technical resources for: {topic}

## Focus Areas
{focus}

## Research Data
{data}

## Required Output
1. Executive summary with top recommendations
2. Recommended technology stack, with reasons
3. Architectural patterns and scalability notes
4. Security considerations
5. The most relevant resources and why they matter
6. Common pitfalls and how to avoid them

Name concrete versions where possible."#,
            data = truncate_chars(&data, RESEARCH_DATA_CHARS),
        )
    }

    pub fn software_architect(requirements: &str, research_findings: Option<&str>) -> String {
        format!(
            r#"You are the Software Architect designing a robust, scalable system.

## Requirements
{requirements}

## Research Context
{research}

## Required Output
1. Architecture overview and style, with justification
2. Technology stack for frontend, backend, database and infrastructure
3. Data models and relationships
4. API design and authentication flow
5. Project structure and module breakdown
6. Security architecture
7. Scalability plan
8. Development environment setup

Be implementation-ready."#,
            research = research_findings.unwrap_or("Use your expertise for technology choices"),
        )
    }

    pub fn technical_lead(architecture: &str) -> String {
        format!(
            r#"You are the Technical Lead turning an architecture into an implementation plan.

## Architecture
{architecture}

## Required Output
1. Development phases with duration, deliverables and success criteria
2. Task breakdown with ids, estimates, priorities and dependencies
3. Sprint plan
4. Critical path and parallel workstreams
5. Milestones and quality gates
6. Risks and mitigations
7. Coding standards and git workflow

Each task must be clear enough for a developer to start immediately."#
        )
    }

    pub fn senior_developer(
        module_name: &str,
        specifications: &str,
        language: &str,
        architecture: &str,
    ) -> String {
        format!(
            r#"You are the Senior Developer implementing a production-ready module.

## Module
{module_name}

## Language
{language}

## Specifications
{specifications}

## Architecture Context
{architecture}

## Required Output
Complete, runnable code with imports, error handling, input validation and
logging, followed by two or three key unit tests, required configuration and
short review notes on known limitations."#,
            architecture = truncate_chars(architecture, ARCHITECTURE_CONTEXT_CHARS),
        )
    }

    pub fn qa_engineer(module_name: &str, code: &str, test_type: &str, architecture: &str) -> String {
        format!(
            r#"You are the QA Engineer writing tests for: {module_name}

## Test Type
{test_type}

## Code Under Test
{code}

## Architecture Context
{architecture}

## Required Output
1. Test strategy and coverage goals
2. Unit tests for every public function, including edge cases
3. Integration tests where components interact
4. Error and boundary scenarios
5. Test data and fixtures
6. Instructions to run the suite"#,
            code = truncate_chars(code, QA_CODE_CHARS),
            architecture = truncate_chars(architecture, ARCHITECTURE_CONTEXT_CHARS),
        )
    }

    pub fn devops_engineer(environment: &str, deployment_type: &str, architecture: &str) -> String {
        format!(
            r#"You are the DevOps Engineer preparing a {deployment_type} deployment for {environment}.

## Architecture
{architecture}

## Required Output
1. Containerization (Dockerfile, compose file)
2. CI/CD pipeline configuration
3. Infrastructure as code for the target platform
4. Environment configuration and secrets handling
5. Monitoring, logging and alerting
6. Backup, recovery and rollback procedures
7. Step-by-step deployment checklist"#,
            architecture = truncate_chars(architecture, 2 * ARCHITECTURE_CONTEXT_CHARS),
        )
    }

    pub fn documentation_specialist(
        doc_type: &str,
        requirements: &str,
        architecture: &str,
        implementation_plan: &str,
    ) -> String {
        format!(
            r#"You are the Documentation Specialist writing {doc_type} documentation.

## Requirements
{requirements}

## Architecture
{architecture}

## Implementation Plan
{implementation_plan}

## Required Output
A README with overview, features, quick start and configuration, followed by
API reference, user guide, developer guide and troubleshooting sections as
appropriate for the requested documentation type."#,
            requirements = truncate_chars(requirements, 2 * ARCHITECTURE_CONTEXT_CHARS),
            architecture = truncate_chars(architecture, 2 * ARCHITECTURE_CONTEXT_CHARS),
            implementation_plan = truncate_chars(implementation_plan, ARCHITECTURE_CONTEXT_CHARS),
        )
    }

    pub fn planner(request: &str, mode: ExecutionMode) -> String {
        let team = WorkerKind::ALL
            .iter()
            .enumerate()
            .map(|(i, kind)| format!("{}. {} - {}", i + 1, kind.as_str(), kind.description()))
            .collect::<Vec<_>>()
            .join("\n");
        let guidelines = ExecutionMode::ALL
            .iter()
            .map(|m| format!("- \"{}\": {}", m.as_str(), m.guideline()))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"You are the orchestrator coordinating a team of 8 software engineering specialists.

## Request
"{request}"

## Execution Mode
{mode}

## Team
{team}

## Mode Guidelines
{guidelines}

## Required Output
Respond with a single JSON object:
{{
    "project_name": "Suggested project name",
    "complexity": "simple|moderate|complex|enterprise",
    "analysis": "Brief analysis of what needs to be built",
    "recommended_mode": "Recommended execution mode if custom",
    "team_workflow": [
        {{
            "step": 1,
            "agent": "product_analyst",
            "parameters": {{"user_request": "...", "additional_context": "..."}},
            "reason": "Why this agent is needed",
            "estimated_time": "Time estimate"
        }},
        {{
            "step": 2,
            "agent": "research_engineer",
            "parameters": {{"topic": "...", "focus_areas": ["..."]}},
            "reason": "Why this agent is needed",
            "estimated_time": "Time estimate",
            "depends_on": [1]
        }}
    ],
    "key_modules": ["Main modules to implement if senior_developer is involved"],
    "success_criteria": ["How we will know the project is complete"],
    "estimated_total_time": "Overall project timeline"
}}

Steps are numbered from 1 and may only depend on earlier steps. A parameter
value may embed the output of an earlier step with the token {{{{step:N}}}}."#
        )
    }

    /// `outputs` holds `(step_id, worker, text)` with text already truncated.
    pub fn summary(request: &str, project_name: &str, outputs: &[(u32, WorkerKind, &str)]) -> String {
        let team_outputs = outputs
            .iter()
            .map(|(id, kind, text)| format!("### Step {id}: {kind}\n{text}"))
            .collect::<Vec<_>>()
            .join("\n\n");
        format!(
            r#"You are the orchestrator writing the final project delivery summary.

## Original Request
{request}

## Project
{project_name}

## Team Outputs
{team_outputs}

## Required Output
1. What was built and the key features delivered
2. Deliverables completed by each team member
3. Overall status and readiness for the next phase
4. Next steps for the user
5. Key insights and recommendations

Be concise. This is the executive summary."#
        )
    }
}
