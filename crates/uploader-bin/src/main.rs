//! Nightscout uploader - store-and-forward delivery of glucose readings,
//! device status and pump treatments to a Nightscout site.

mod app;
mod input;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use nightscout_gateway::UploadError;
use nightscout_records::TimestampedPumpEvent;
use serde_json::{Map, Value};
use upload_outbox::{CheckpointStore, JsonFileCheckpointStore};
use uploader_config_and_utils::{init_logging, parse_level, Config, Paths};

/// Nightscout uploader command-line interface.
#[derive(Parser)]
#[command(name = "nightscout-uploader")]
#[command(about = "Store-and-forward uploader for Nightscout")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, checkpoint and logs. Defaults to ~/.nightscout-uploader
    #[arg(long, global = true, env = "NIGHTSCOUT_UPLOADER_HOME")]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the API secret against the site
    CheckAuth,
    /// Translate a JSON array of timestamped pump events and upload the treatments
    PushEvents {
        /// File containing the events
        file: PathBuf,
        /// Source label recorded as `enteredBy`
        #[arg(long, default_value = "nightscout-uploader")]
        source: String,
    },
    /// Upload one device status JSON object
    PushStatus {
        /// File containing the status object
        file: PathBuf,
    },
    /// Delete treatments by remote id
    DeleteTreatments {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Forget confirmed treatment progress
    ResetCheckpoint,
    /// Read newline-delimited device input from stdin and upload continuously
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths).context("failed to load configuration")?;

    let level = parse_level(cli.log_level.as_deref().unwrap_or(&config.log_level));
    init_logging(&paths, level.as_str()).context("failed to initialize logging")?;

    match cli.command {
        Commands::CheckAuth => check_auth(&config, &paths).await,
        Commands::PushEvents { file, source } => push_events(&config, &paths, &file, &source).await,
        Commands::PushStatus { file } => push_status(&config, &paths, &file).await,
        Commands::DeleteTreatments { ids } => {
            let manager = app::build_manager(&config, &paths, false)?;
            manager.delete_treatments_by_id(&ids).await?;
            println!("Deleted {} treatment(s)", ids.len());
            Ok(())
        }
        Commands::ResetCheckpoint => {
            let store = JsonFileCheckpointStore::new(paths.checkpoint_file());
            store.save(None)?;
            println!("Checkpoint cleared: {}", store.path().display());
            Ok(())
        }
        Commands::Run => {
            let manager = app::build_manager(&config, &paths, true)?;
            app::run(manager, config.flush_interval()).await
        }
    }
}

async fn check_auth(config: &Config, paths: &Paths) -> Result<()> {
    let manager = app::build_manager(config, paths, false)?;
    match manager.check_auth().await {
        Ok(()) => {
            println!("Credentials accepted by {}", config.site_url);
            Ok(())
        }
        Err(UploadError::Unauthorized) => bail!("API secret rejected by {}", config.site_url),
        Err(e) => Err(e).context("authentication check failed"),
    }
}

async fn push_events(config: &Config, paths: &Paths, file: &Path, source: &str) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let events: Vec<TimestampedPumpEvent> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of pump events", file.display()))?;

    let manager = app::build_manager(config, paths, false)?;
    let queued = manager.process_pump_events(&events, source).await;
    let report = app::flush_until_idle(&manager).await;
    if !report.is_success() {
        bail!("treatment upload failed: {:?}", report.treatments);
    }

    println!("Uploaded {} treatment(s) from {} event(s)", queued.len(), events.len());
    println!("{}", serde_json::to_string_pretty(&manager.checkpoint().await)?);
    Ok(())
}

async fn push_status(config: &Config, paths: &Paths, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let status: Map<String, Value> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON object", file.display()))?;

    let manager = app::build_manager(config, paths, false)?;
    manager
        .upload_device_status(input::device_status(status, Utc::now()))
        .await;
    let report = app::flush_until_idle(&manager).await;
    if !report.is_success() {
        bail!("device status upload failed: {:?}", report.device_statuses);
    }

    println!("Device status uploaded");
    Ok(())
}
