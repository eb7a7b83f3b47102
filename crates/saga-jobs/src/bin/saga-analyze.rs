//! saga-analyze: analyze text files as the units of one scope and print the
//! resulting timeline as JSON.
//!
//! Configuration comes from the environment (a `.env` file is honoured):
//! `OPENAI_*` for the generation backend, `ANALYSIS_*` for the orchestrator,
//! and `DATABASE_URL` when `--database` is given.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use saga_core::{AnalysisContext, GenerationBackend, ScopeUnit, TaskStatus};
use saga_db::Database;
use saga_inference::{MockGenerationBackend, OpenAIBackend};
use saga_jobs::{AnalysisService, OrchestratorConfig};

#[derive(Parser)]
#[command(name = "saga-analyze")]
#[command(author, version, about = "Extract a timeline from story files")]
struct Cli {
    /// Story files; each one is analyzed as a separate unit
    #[arg(required = true, num_args = 1..)]
    files: Vec<PathBuf>,

    /// Scope id shared by all units (random if omitted)
    #[arg(long)]
    scope_id: Option<Uuid>,

    /// Scope name; locations with this name do not link units
    #[arg(long)]
    scope_name: Option<String>,

    /// Known character names, used to canonicalize extracted names
    #[arg(short, long = "character")]
    characters: Vec<String>,

    /// Known location names
    #[arg(short, long = "location")]
    locations: Vec<String>,

    /// Analyze all files together in one call instead of one call per file
    #[arg(long)]
    combined: bool,

    /// Ignore cached analyses
    #[arg(long)]
    force: bool,

    /// Use the deterministic mock backend instead of the OpenAI API
    #[arg(long)]
    mock: bool,

    /// Persist to PostgreSQL at DATABASE_URL instead of memory
    #[arg(long)]
    database: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every unit was analyzed.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let backend: Arc<dyn GenerationBackend> = if cli.mock {
        Arc::new(MockGenerationBackend::new())
    } else {
        Arc::new(OpenAIBackend::from_env().context("failed to configure generation backend")?)
    };

    let config = OrchestratorConfig::from_env();
    let service = if cli.database {
        let db = Database::from_env()
            .await
            .context("failed to connect to database")?;
        db.migrate().await.context("failed to apply schema")?;
        AnalysisService::with_database(backend, &db, config)
    } else {
        AnalysisService::in_memory(backend, config)
    };

    let scope_id = cli.scope_id.unwrap_or_else(Uuid::new_v4);
    let context = AnalysisContext::new(scope_id)
        .with_known_characters(cli.characters.iter().cloned())
        .with_known_locations(cli.locations.iter().cloned());

    let mut stories = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let unit_id = Uuid::new_v5(&scope_id, path.to_string_lossy().as_bytes());
        let title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let unit = ScopeUnit::new(unit_id, content).with_title(title);
        stories.push((path.display().to_string(), unit));
    }

    let submitted = if cli.combined {
        let members = stories.iter().map(|(_, unit)| unit.clone()).collect();
        let task_id = service
            .submit_scope_analysis(scope_id, members, context, cli.force)
            .await;
        vec![(format!("{} files", stories.len()), task_id)]
    } else {
        let mut submitted = Vec::with_capacity(stories.len());
        for (label, unit) in stories {
            let task_id = service
                .submit_analysis(
                    unit.unit_id,
                    unit.content,
                    context.clone().with_title(unit.title),
                    cli.force,
                )
                .await;
            submitted.push((label, task_id));
        }
        submitted
    };

    let outcomes = join_all(
        submitted
            .iter()
            .map(|(_, task_id)| service.wait(*task_id)),
    )
    .await;

    let mut all_ok = true;
    for ((label, _), outcome) in submitted.iter().zip(outcomes) {
        let task = outcome?;
        match task.status {
            TaskStatus::Completed => info!(
                input = %label,
                cache_hit = task.cache_hit,
                unit_count = task.result.as_ref().map(|r| r.units.len()).unwrap_or(0),
                "Analyzed"
            ),
            _ => {
                all_ok = false;
                let message = task.error.map(|e| e.message).unwrap_or_default();
                warn!(input = %label, error = %message, "Analysis failed");
            }
        }
    }

    let timeline = match cli.scope_name.as_deref() {
        Some(name) => service.get_timeline_named(scope_id, name).await?,
        None => service.get_timeline(scope_id).await?,
    };
    println!("{}", serde_json::to_string_pretty(&timeline)?);

    Ok(all_ok)
}
