use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use devcrew_core::{ExecutionMode, WorkerKind};
use events::EventBus;
use orchestrator::{ExportOptions, RunRequest, StaticPlanner, WorkerInfo};
use server::config::{AppConfig, CONFIG_DIR, CONFIG_FILE};
use server::state::{build_controller, AppState, ServicesStatus};
use server::create_router;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "devcrew")]
#[command(about = "Plan, run and export the work of an AI software team", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Overrides the configured port
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration to .devcrew/config.toml
    Init,
    /// Start the HTTP API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Plan and execute a single request
    Run {
        request: String,

        #[arg(short, long, default_value_t = ExecutionMode::Full)]
        mode: ExecutionMode,

        /// Print the plan without executing it
        #[arg(long)]
        no_execute: bool,

        /// Use a plan from a JSON file instead of asking the planner
        #[arg(long, value_name = "FILE")]
        plan: Option<PathBuf>,

        /// Export the finished project into this directory
        #[arg(long, value_name = "DIR")]
        export: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,

        /// Stop at the first failed step
        #[arg(long)]
        halt_on_failure: bool,

        /// Maximum steps in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List the team members and whether they can run
    Workers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init) => init_project().await,
        Some(Commands::Serve { port }) => serve(port.or(cli.port)).await,
        Some(Commands::Run {
            request,
            mode,
            no_execute,
            plan,
            export,
            json,
            halt_on_failure,
            concurrency,
        }) => {
            let run = RunRequest::new(request)
                .with_mode(mode)
                .with_auto_execute(!no_execute);
            run_once(
                run,
                RunFlags {
                    plan,
                    export,
                    json,
                    halt_on_failure,
                    concurrency,
                },
            )
            .await
        }
        Some(Commands::Workers) => workers().await,
        None => serve(cli.port).await,
    }
}

async fn load_config(cwd: &Path) -> Result<AppConfig> {
    let config = AppConfig::load(cwd)
        .await
        .context("Failed to load configuration")?
        .with_env()?;
    Ok(config)
}

async fn init_project() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config_path = AppConfig::path(&cwd);

    if config_path.exists() {
        println!("DevCrew already initialized at {}", config_path.display());
        return Ok(());
    }

    let config_dir = cwd.join(CONFIG_DIR);
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    tokio::fs::write(&config_path, AppConfig::default().to_toml()?).await?;

    println!();
    println!("Initialized DevCrew in {}", cwd.display());
    println!();
    println!("Created:");
    println!("  {}/", CONFIG_DIR);
    println!("  └── {}", CONFIG_FILE);
    println!();
    println!("Next steps:");
    println!("  1. Set GEMINI_API_KEY (and optionally TAVILY_API_KEY)");
    println!("  2. Run 'devcrew run \"<request>\"' or 'devcrew serve'");
    println!();

    Ok(())
}

async fn serve(port: Option<u16>) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let mut config = load_config(&cwd).await?;
    if let Some(port) = port {
        config.server.port = port;
    }

    init_tracing(false);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let services = ServicesStatus::from_config(&config);
    let state = AppState::from_config(config);
    let shutdown = state.shutdown.clone();
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    let local = listener.local_addr()?;

    println!();
    println!("DevCrew API");
    println!("════════════════════════════════════════");
    println!();
    println!("  API Server:  http://{}", local);
    println!("  OpenAPI:     http://{}/api/openapi.json", local);
    println!(
        "  Model:       {}",
        services.text_generation.as_deref().unwrap_or("not configured")
    );
    println!(
        "  Web search:  {}",
        if services.web_search { "enabled" } else { "disabled" }
    );
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutting down");
            }
            shutdown.cancel();
        })
        .await?;

    Ok(())
}

struct RunFlags {
    plan: Option<PathBuf>,
    export: Option<PathBuf>,
    json: bool,
    halt_on_failure: bool,
    concurrency: Option<usize>,
}

async fn run_once(request: RunRequest, flags: RunFlags) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = load_config(&cwd).await?;

    init_tracing(true);

    let bus = EventBus::new();
    let mut controller = build_controller(&config, &bus);
    if let Some(path) = &flags.plan {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read plan {}", path.display()))?;
        controller = controller.with_planner(Arc::new(StaticPlanner::from_json(&text)?));
    }

    let request = request
        .with_halt_on_failure(flags.halt_on_failure || config.execution.halt_on_failure)
        .with_concurrency(flags.concurrency.unwrap_or(config.execution.concurrency));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let outcome = controller.run(request, &cancel).await?;

    if flags.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.render());
    }

    let Some(report) = outcome.report() else {
        return Ok(());
    };

    if let Some(dir) = flags.export {
        let options = ExportOptions::new(dir).with_docs(config.export.include_docs);
        let summary = controller.export(&options).await?;
        if !flags.json {
            println!(
                "Exported {} files to {}",
                summary.files.len(),
                summary.path.display()
            );
            if let Some(backup) = &summary.backup {
                println!("Previous export moved to {}", backup.display());
            }
        }
    }

    if !report.is_success() {
        bail!(
            "{} of {} steps did not succeed",
            report.failed + report.not_run,
            report.total()
        );
    }
    Ok(())
}

async fn workers() -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = load_config(&cwd).await?;
    let available = config.gemini.api_key.is_some();

    println!();
    println!("Team ({} members):", WorkerKind::ALL.len());
    for kind in WorkerKind::ALL {
        let info = WorkerInfo::of(kind);
        let icon = if available { "●" } else { "○" };
        println!("  {} {} ({})", icon, info.display_name, info.name);
        println!("      {}", info.description);
        for param in &info.parameters {
            match &param.default {
                Some(default) => println!("      - {} = {}", param.name, default),
                None => println!("      - {}", param.name),
            }
        }
    }
    println!();
    if !available {
        println!("GEMINI_API_KEY is not set; no worker can run.");
        println!();
    }

    Ok(())
}

/// `to_stderr` routes logs to stderr so stdout stays machine readable.
fn init_tracing(to_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "devcrew=info,orchestrator=info,server=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if to_stderr {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
