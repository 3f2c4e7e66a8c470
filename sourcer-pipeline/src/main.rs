//! sourcer-pipeline - Sourcer-code classification pipeline
//!
//! One binary, one subcommand per stage:
//! read-data → train → register-model → predict → upload-db
//!
//! `run` executes all five in order; `init-db` creates the tables.
//! A failed stage exits non-zero.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sourcer_common::db::init_database;
use sourcer_common::logging::LogBuffer;
use sourcer_common::{Mode, PipelineConfig};
use sourcer_pipeline::artifacts::LocalArtifactStore;
use sourcer_pipeline::gateway::ControlTable;
use sourcer_pipeline::model::GridSearchFitter;
use sourcer_pipeline::pipeline::LogUpload;
use sourcer_pipeline::sink::SqliteResultSink;
use sourcer_pipeline::{Runner, Stage, StageContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sourcer-pipeline")]
#[command(about = "MRP sourcer-code classification pipeline")]
#[command(version)]
struct Cli {
    /// Configuration file (overrides SOURCER_CONFIG and platform paths)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Claim a ready work item and prepare training/inference data
    ReadData(StageArgs),
    /// Train both classifiers
    Train(ModelArgs),
    /// Register the trained model files
    RegisterModel(ModelArgs),
    /// Predict sourcer codes for the inference data
    Predict(StageArgs),
    /// Publish predictions and close the work item
    UploadDb(StageArgs),
    /// Run every stage in order
    Run(ModelArgs),
    /// Create database tables
    InitDb {
        #[arg(long)]
        mode: Mode,
    },
}

#[derive(Args, Debug)]
struct StageArgs {
    /// Plant code
    #[arg(long)]
    plant: String,

    /// Directory holding series_id.txt
    #[arg(long = "series_id")]
    series_id: PathBuf,

    /// Database target: prd or qas
    #[arg(long)]
    mode: Mode,

    /// Orchestration run id recorded as model lineage (generated when absent)
    #[arg(long = "run_id")]
    run_id: Option<String>,
}

#[derive(Args, Debug)]
struct ModelArgs {
    #[command(flatten)]
    stage: StageArgs,

    /// Directory of the trained model files
    #[arg(long = "model_file")]
    model_file: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let log_buffer = LogBuffer::new();
    let default_filter = format!(
        "sourcer_pipeline={level},sourcer_common={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(log_buffer.clone())
        .init();

    info!(
        "Starting sourcer-pipeline v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let (stage, args, model_dir) = match cli.command {
        Command::InitDb { mode } => {
            init_database(config.database_url(mode))
                .await
                .with_context(|| format!("Failed to initialize {} database", mode))?;
            info!(mode = %mode, "Database initialized");
            return Ok(());
        }
        Command::ReadData(args) => (Some(Stage::ReadData), args, None),
        Command::Train(m) => (Some(Stage::Train), m.stage, Some(m.model_file)),
        Command::RegisterModel(m) => (Some(Stage::RegisterModel), m.stage, Some(m.model_file)),
        Command::Predict(args) => (Some(Stage::Predict), args, None),
        Command::UploadDb(args) => (Some(Stage::UploadDb), args, None),
        Command::Run(m) => (None, m.stage, Some(m.model_file)),
    };

    info!(plant = %args.plant, mode = %args.mode, "Connecting to database");
    let pool = init_database(config.database_url(args.mode))
        .await
        .context("Failed to open database")?;

    let run_id = args
        .run_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let log_upload = config.logging.upload_to_db.then(|| LogUpload {
        buffer: log_buffer.clone(),
        pool: pool.clone(),
        plant: args.plant.clone(),
        window: chrono::Duration::minutes(config.logging.upload_window_minutes),
    });

    let runner = Runner {
        fitter: GridSearchFitter::from_config(&config.training),
        model_dir: model_dir.unwrap_or_else(|| PathBuf::from("./outputs")),
        sink: Box::new(SqliteResultSink::new(pool.clone())),
        log_upload,
        ctx: StageContext {
            plant: args.plant,
            series_dir: args.series_id,
            gateway: ControlTable::new(pool),
            store: Arc::new(LocalArtifactStore::new(&config.artifacts.root)),
            config,
            run_id,
        },
    };

    match stage {
        Some(stage) => {
            let outcome = runner
                .run_stage(stage)
                .await
                .with_context(|| format!("Stage {} failed", stage))?;
            info!(stage = %stage, outcome = ?outcome, "Done");
        }
        None => {
            let outcomes = runner.run_all().await.context("Pipeline run failed")?;
            for (stage, outcome) in outcomes {
                info!(stage = %stage, outcome = ?outcome, "Done");
            }
        }
    }

    Ok(())
}
