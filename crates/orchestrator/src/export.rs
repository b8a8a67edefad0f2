//! Writes the project state out as a directory tree.
//!
//! Layout: `src/`, `tests/`, `docs/`, `config/`, `scripts/`, plus `README.md`,
//! `.gitignore` and `manifest.json` at the root. Code modules are placed by
//! naming heuristics.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use devcrew_core::ProjectState;
use events::{Event, EventBus};
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{OrchestratorError, Result};

const PROJECT_DIRS: [&str; 5] = ["src", "tests", "docs", "config", "scripts"];
const MANIFEST_FILE: &str = "manifest.json";

const GITIGNORE: &str = "\
# Dependencies
node_modules/
__pycache__/
*.pyc
venv/
.venv/

# IDE
.vscode/
.idea/
*.swp

# OS
.DS_Store
Thumbs.db

# Logs
*.log
logs/

# Environment
.env
.env.local

# Build output
dist/
build/
target/

# Databases
*.db
*.sqlite3

# Temporary files
tmp/
*.tmp
";

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    /// Write requirements, architecture and plans under `docs/`.
    pub include_docs: bool,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            include_docs: true,
        }
    }

    pub fn with_docs(mut self, include: bool) -> Self {
        self.include_docs = include;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ExportSummary {
    pub project_name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub path: PathBuf,
    /// Written files, relative to `path`.
    pub files: Vec<String>,
    /// Where a previous directory at `path` was moved.
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>))]
    pub backup: Option<PathBuf>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct Manifest<'a> {
    project_name: &'a str,
    exported_at: DateTime<Utc>,
    state_version: u64,
    code_modules: Vec<&'a str>,
    files: &'a [String],
}

/// Where a code module lands and which extension it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placement {
    dir: &'static str,
    extension: &'static str,
}

fn place_module(name: &str, content: &str) -> Placement {
    let lower = name.to_ascii_lowercase();
    let placement = |dir, extension| Placement { dir, extension };

    if content.contains("import React") || lower.contains("jsx") {
        placement("src/components", ".jsx")
    } else if content.contains("from flask") || lower.contains("app.py") {
        placement("src", ".py")
    } else if lower.contains("package.json") {
        placement("", ".json")
    } else if lower.contains("dockerfile") {
        placement("config", "")
    } else if lower.contains("test") {
        let python = content.to_ascii_lowercase().contains("python") || content.contains("def ");
        placement("tests", if python { ".py" } else { ".js" })
    } else {
        placement("src", ".py")
    }
}

/// Keep a module name inside its directory.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "module".to_string()
    } else {
        cleaned.to_string()
    }
}

fn module_path(name: &str, content: &str) -> String {
    let Placement { dir, extension } = place_module(name, content);
    let mut file = sanitize_file_name(name);
    if !extension.is_empty() && !file.to_ascii_lowercase().ends_with(extension) {
        file.push_str(extension);
    }
    if dir.is_empty() {
        file
    } else {
        format!("{dir}/{file}")
    }
}

/// Exports snapshots of the project state to disk.
#[derive(Debug, Clone, Default)]
pub struct ProjectExporter {
    event_bus: Option<EventBus>,
}

impl ProjectExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub async fn export(
        &self,
        snapshot: &ProjectState,
        options: &ExportOptions,
    ) -> Result<ExportSummary> {
        let project_name = snapshot
            .current_project
            .as_deref()
            .ok_or(OrchestratorError::NoActiveProject)?;
        let root = options.output_dir.as_path();
        let exported_at = Utc::now();

        let backup = backup_existing(root, exported_at).await?;
        for dir in PROJECT_DIRS {
            fs::create_dir_all(root.join(dir)).await?;
        }

        let mut files = Vec::new();

        for (name, content) in &snapshot.code_modules {
            let relative = module_path(name, content);
            write_file(root, &relative, content).await?;
            files.push(relative);
        }

        if options.include_docs {
            let docs = [
                ("docs/requirements.md", "Project Requirements", &snapshot.requirements),
                ("docs/architecture.md", "System Architecture", &snapshot.architecture),
                (
                    "docs/implementation_plan.md",
                    "Implementation Plan",
                    &snapshot.implementation_plan,
                ),
                ("docs/deployment.md", "Deployment Guide", &snapshot.deployment_plan),
            ];
            for (relative, title, body) in docs {
                if let Some(body) = body {
                    write_file(root, relative, &format!("# {title}\n\n{body}")).await?;
                    files.push(relative.to_string());
                }
            }
        }

        write_file(root, ".gitignore", GITIGNORE).await?;
        files.push(".gitignore".to_string());

        files.push("README.md".to_string());
        write_file(root, "README.md", &readme(project_name, exported_at, &files)).await?;

        files.push(MANIFEST_FILE.to_string());
        let manifest = Manifest {
            project_name,
            exported_at,
            state_version: snapshot.version,
            code_modules: snapshot.code_modules.keys().map(String::as_str).collect(),
            files: &files,
        };
        write_file(root, MANIFEST_FILE, &serde_json::to_string_pretty(&manifest)?).await?;

        info!(
            project = %project_name,
            path = %root.display(),
            files = files.len(),
            "Project exported"
        );
        if let Some(bus) = &self.event_bus {
            bus.emit(Event::ProjectExported {
                path: root.display().to_string(),
                files: files.len(),
            });
        }

        Ok(ExportSummary {
            project_name: project_name.to_string(),
            path: root.to_path_buf(),
            files,
            backup,
            exported_at,
        })
    }
}

async fn backup_existing(root: &Path, now: DateTime<Utc>) -> Result<Option<PathBuf>> {
    if fs::metadata(root).await.is_err() {
        return Ok(None);
    }

    let name = root
        .file_name()
        .ok_or_else(|| OrchestratorError::export(format!("invalid output path {}", root.display())))?
        .to_string_lossy();
    let backup = root.with_file_name(format!("{name}_backup_{}", now.format("%Y%m%d_%H%M%S")));
    if fs::metadata(&backup).await.is_ok() {
        return Err(OrchestratorError::export(format!(
            "backup path {} already exists",
            backup.display()
        )));
    }

    fs::rename(root, &backup).await?;
    info!(from = %root.display(), to = %backup.display(), "Existing export moved aside");
    Ok(Some(backup))
}

async fn write_file(root: &Path, relative: &str, content: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&path, content).await?;
    debug!(path = %path.display(), bytes = content.len(), "Wrote export file");
    Ok(())
}

fn readme(project_name: &str, exported_at: DateTime<Utc>, files: &[String]) -> String {
    let mut listing: Vec<&str> = files.iter().map(String::as_str).collect();
    listing.sort_unstable();
    let listing: String = listing.iter().map(|f| format!("- `{f}`\n")).collect();

    format!(
        "# {project_name}\n\n\
         Generated by DevCrew on {}.\n\n\
         ## Project Structure\n\n\
         ```\n\
         src/       source code\n\
         tests/     test suites\n\
         docs/      requirements, architecture and plans\n\
         config/    deployment configuration\n\
         scripts/   helper scripts\n\
         ```\n\n\
         ## Files\n\n{listing}",
        exported_at.format("%Y-%m-%d %H:%M UTC")
    )
}
