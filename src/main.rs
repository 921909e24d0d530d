use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use waymark::config::{DataLayout, PipelineConfig};
use waymark::errors::PipelineResult;
use waymark::fetch::Fetcher;
use waymark::loader;
use waymark::notify::{Notifier, TracingNotifier};
use waymark::overlay::{GroupingEngine, MemoryOverlay};
use waymark::transform::Transformer;

/// Owner id stamped on every overlay entry and group this tool creates.
const OWNER_ID: &str = "waymark";

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    /// Working directory for datasets, the line file and the overlay store
    #[clap(short, long, global = true, default_value = ".")]
    data_dir: PathBuf,
    /// Config file; defaults to geojson_config.json inside the data dir
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every configured map × marker dataset
    Fetch,
    /// Convert the downloaded datasets into waypoint lines
    Transform,
    /// Create overlay waypoints from the line file
    Load,
    /// Group overlay waypoints that share a name
    Group,
    /// Fetch, transform and load in sequence
    Run,
    /// Write the default configuration
    Init {
        #[clap(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    let layout = DataLayout::new(&args.data_dir);
    let config_path = args.config.unwrap_or_else(|| layout.config_file());
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);

    match args.command {
        Commands::Init { force } => {
            if config_path.exists() && !force {
                info!(
                    "Config {} already exists, use --force to overwrite",
                    config_path.display()
                );
            } else {
                PipelineConfig::default().save(&config_path)?;
                info!("Wrote default configuration to {}", config_path.display());
            }
        }
        Commands::Fetch => {
            let config = PipelineConfig::load_or_init(&config_path)?;
            finish(fetch(&config, &layout, notifier).await)?;
        }
        Commands::Transform => {
            let config = PipelineConfig::load_or_init(&config_path)?;
            finish(transform(&config, &layout, notifier.as_ref()))?;
        }
        Commands::Load => {
            finish(load(&layout, notifier.as_ref()))?;
        }
        Commands::Group => {
            finish(group(&layout, notifier.as_ref()))?;
        }
        Commands::Run => {
            let config = PipelineConfig::load_or_init(&config_path)?;
            finish(run(&config, &layout, notifier).await)?;
        }
    }

    Ok(())
}

/// A missing input ends the command with a warning, any other error fails it.
fn finish(result: PipelineResult<()>) -> Result<()> {
    match result {
        Err(err) if !err.is_fatal() => {
            warn!("Nothing to do: {}", err);
            Ok(())
        }
        other => Ok(other?),
    }
}

async fn run(
    config: &PipelineConfig,
    layout: &DataLayout,
    notifier: Arc<dyn Notifier>,
) -> PipelineResult<()> {
    fetch(config, layout, notifier.clone()).await?;
    transform(config, layout, notifier.as_ref())?;
    load(layout, notifier.as_ref())
}

async fn fetch(
    config: &PipelineConfig,
    layout: &DataLayout,
    notifier: Arc<dyn Notifier>,
) -> PipelineResult<()> {
    let fetcher = Fetcher::from_config(config, layout.dataset_dir(), notifier).await?;
    let summary = fetcher
        .fetch_all(&config.maps, &config.markers(), &config.categories)
        .await;
    info!(
        "Fetched {}/{} datasets ({} errors)",
        summary.succeeded, summary.attempted, summary.errors
    );
    Ok(())
}

fn transform(
    config: &PipelineConfig,
    layout: &DataLayout,
    notifier: &dyn Notifier,
) -> PipelineResult<()> {
    let report = Transformer::new(config, notifier)
        .transform_to_file(&layout.dataset_dir(), &layout.waypoints_file())?;
    info!(
        "{} files scanned, {} failed, {} features skipped",
        report.files_scanned, report.files_failed, report.features_skipped
    );
    Ok(())
}

fn load(layout: &DataLayout, notifier: &dyn Notifier) -> PipelineResult<()> {
    let report = loader::load_waypoints(&layout.waypoints_file(), notifier)?;
    let mut overlay = MemoryOverlay::load(&layout.overlay_file())?;
    let created = loader::import_waypoints(&mut overlay, OWNER_ID, &report.waypoints)?;
    overlay.save(&layout.overlay_file())?;
    info!(
        "Created {} overlay waypoints in {}",
        created.len(),
        layout.overlay_file().display()
    );
    Ok(())
}

fn group(layout: &DataLayout, notifier: &dyn Notifier) -> PipelineResult<()> {
    let mut overlay = MemoryOverlay::load(&layout.overlay_file())?;
    let result = GroupingEngine::new(OWNER_ID).group_duplicates(&mut overlay)?;
    overlay.save(&layout.overlay_file())?;
    notifier.notify(
        "Waypoints Grouped",
        &format!(
            "Created {} groups for {} waypoints",
            result.groups_created, result.entries_moved
        ),
    );
    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!(
            "reqwest=warn,hyper=warn,{}",
            log_level
        )))
        .without_time()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark::errors::PipelineError;
    use waymark::notify::RecordingNotifier;

    #[test]
    fn test_missing_input_finishes_cleanly() {
        let result = finish(Err(PipelineError::MissingInput("waypoints.txt".into())));
        assert!(result.is_ok());
    }

    #[test]
    fn test_setup_failure_fails_the_command() {
        let result = finish(Err(PipelineError::Setup("geojson_data".into())));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_without_line_file_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let layout = DataLayout::new(dir.path());
        let notifier = RecordingNotifier::default();

        let result = load(&layout, &notifier);

        assert!(matches!(result, Err(PipelineError::MissingInput(_))));
        assert!(finish(result).is_ok());
        assert!(!layout.overlay_file().exists());
    }
}
