use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use designflow::db::Database;
use designflow::pipeline::{replace_stage, simulated_stages, FailingStage};
use designflow::projector::{ProgressHandlers, ProgressProjector, ProgressView};
use designflow::store::JobQueryParams;
use designflow::{
    load_config, logging, Config, DesignRequest, DesignService, DesignflowError, FileAssetStorage,
    ImageUpload, JobId, JobReader, JobStatus, JobStore, Pipeline, RunnerPool, StageName,
};

#[derive(Parser)]
#[command(name = "designflow", version, about = "Run and inspect garment design jobs")]
struct Cli {
    /// Path to a JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a design and follow it to completion
    Run {
        /// Free-text design direction
        #[arg(short, long)]
        prompt: String,

        /// Garment photograph
        #[arg(short, long)]
        garment: PathBuf,

        /// Optional style swatch image
        #[arg(short, long)]
        swatch: Option<PathBuf>,

        /// Make this stage fail, for trying out error handling
        #[arg(long)]
        fail_stage: Option<StageName>,
    },

    /// List recent jobs
    List {
        #[arg(long)]
        status: Option<JobStatus>,

        #[arg(long, default_value_t = 20)]
        limit: u64,
    },

    /// Print one job as JSON
    Show { id: JobId },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.json_logs) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<ExitCode, DesignflowError> {
    let config = match cli.config {
        Some(ref path) => load_config(path)?,
        None => Config::new(default_asset_directory()),
    };
    let store = open_store(&config)?;

    match cli.command {
        Command::Run {
            prompt,
            garment,
            swatch,
            fail_stage,
        } => run(&config, store, prompt, &garment, swatch.as_deref(), fail_stage).await,
        Command::List { status, limit } => {
            let response = store.list(&JobQueryParams {
                status,
                limit: Some(limit),
                offset: None,
            })?;
            for job in &response.jobs {
                println!(
                    "{}  {:<10}  {:>3}%  {}",
                    job.id,
                    job.status,
                    job.overall_progress(),
                    job.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            println!("{} of {} jobs", response.jobs.len(), response.total);
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { id } => {
            let job = store.get_job(&id)?;
            println!("{}", render_json(&job)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run(
    config: &Config,
    store: Arc<JobStore>,
    prompt: String,
    garment: &Path,
    swatch: Option<&Path>,
    fail_stage: Option<StageName>,
) -> Result<ExitCode, DesignflowError> {
    let request = DesignRequest {
        garment_image: Some(read_image(garment)?),
        style_swatch_image: swatch.map(read_image).transpose()?,
        design_prompt: prompt,
    };

    let assets = Arc::new(FileAssetStorage::new(&config.asset_directory));
    let mut stages = simulated_stages(&config.simulation, assets.clone());
    if let Some(stage) = fail_stage {
        let message = format!("{} failed", stage.title());
        replace_stage(&mut stages, Arc::new(FailingStage::new(stage, message)));
    }
    let pipeline = Pipeline::new(store.clone(), stages)?;
    let service = DesignService::new(store.clone(), assets, RunnerPool::new(Arc::new(pipeline)));

    let (id, handle) = service.submit(request)?;
    println!("Job {}", id);

    let projector = ProgressProjector::new(store.clone());
    let handlers = ProgressHandlers::new(print_view)
        .on_complete(|job| println!("Design {} completed", job.id))
        .on_error(|message| println!("Failed: {}", message));
    let subscription = projector.subscribe(&id, handlers)?;
    let view = subscription.wait().await;

    match handle.await {
        Ok(Ok(status)) => info!(job_id = %id, status = %status, "Run finished"),
        Ok(Err(e)) => return Err(e.into()),
        Err(e) => error!(job_id = %id, error = %e, "Runner task did not finish"),
    }

    Ok(if view.status == JobStatus::Completed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_view(view: &ProgressView) {
    let current = view
        .current_stage
        .and_then(|stage| view.step(stage))
        .map(|step| format!("{} ({}, {}%)", step.title(), step.status, step.progress))
        .unwrap_or_else(|| "waiting".to_string());
    println!("[{:>3}%] {:<10} {}", view.overall_progress(), view.status, current);
}

fn render_json<T: serde::Serialize>(value: &T) -> Result<String, DesignflowError> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn open_store(config: &Config) -> Result<Arc<JobStore>, DesignflowError> {
    let store = Arc::new(JobStore::new(config.notification_capacity));
    if let Some(path) = config.resolved_database_path() {
        store.set_database(Database::open(&path)?);
        store.load_from_database()?;
    }
    Ok(store)
}

fn read_image(path: &Path) -> Result<ImageUpload, DesignflowError> {
    ImageUpload::from_path(path).map_err(|source| DesignflowError::ReadInput {
        path: path.to_path_buf(),
        source,
    })
}

fn default_asset_directory() -> String {
    dirs::home_dir()
        .map(|home| home.join(".designflow").join("assets"))
        .unwrap_or_else(|| PathBuf::from("designflow-assets"))
        .to_string_lossy()
        .into_owned()
}
