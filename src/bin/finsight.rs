//! # Finsight CLI
//!
//! Analyze a PDF from the command line, either inline or through the task
//! queue, and print the outcome as JSON.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use finsight_core::config::ConfigManager;
use finsight_core::logging::init_tracing;
use finsight_core::orchestration::AnalysisSystem;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "finsight")]
#[command(about = "Analyze financial documents")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration directory (default: $FINSIGHT_CONFIG_DIR or ./config)
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one PDF document
    Analyze {
        /// Path to a .pdf file
        file: PathBuf,

        /// Question to answer about the document
        #[arg(short, long, default_value = "")]
        query: String,

        #[arg(short, long, value_enum, default_value_t = Mode::Sync)]
        mode: Mode,

        /// How long to wait for a queued task, in seconds
        #[arg(long, default_value_t = 600)]
        wait_seconds: u64,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Run the pipeline inline
    Sync,
    /// Submit through the queue and poll the task record
    Async,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_manager = ConfigManager::load_from_directory(cli.config_dir)
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Config => {
            eprintln!(
                "environment: {} ({})",
                config_manager.environment(),
                config_manager.config_directory().display()
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&config_manager.debug_config())?
            );
            Ok(())
        }
        Commands::Analyze {
            file,
            query,
            mode,
            wait_seconds,
        } => {
            ensure_pdf_path(&file)?;
            let system = AnalysisSystem::bootstrap(config_manager.config()).await?;
            let outcome = analyze(&system, &file, &query, mode, wait_seconds).await;
            system.shutdown().await?;
            outcome
        }
    }
}

async fn analyze(
    system: &AnalysisSystem,
    file: &Path,
    query: &str,
    mode: Mode,
    wait_seconds: u64,
) -> anyhow::Result<()> {
    let source = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))?;
    let service = system.service();

    match mode {
        Mode::Sync => {
            let result = service.analyze_document_sync(&source, bytes.as_slice(), query).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Mode::Async => {
            let task_id = service
                .analyze_document_async(&source, bytes.as_slice(), query)
                .await?;
            info!("Submitted task {}", task_id);

            let deadline = tokio::time::Instant::now() + Duration::from_secs(wait_seconds);
            let task = loop {
                let task = service.get_task(task_id).await?;
                if task.is_terminal() {
                    break task;
                }
                if tokio::time::Instant::now() >= deadline {
                    bail!("task {task_id} still {} after {wait_seconds}s", task.status());
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            };
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
    }

    Ok(())
}

/// The loader only understands PDF; anything else is rejected before it is
/// opened
fn ensure_pdf_path(path: &Path) -> anyhow::Result<()> {
    let is_pdf = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
    if !is_pdf {
        bail!("{} is not a .pdf file", path.display());
    }
    Ok(())
}
