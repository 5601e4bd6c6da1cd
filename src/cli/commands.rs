//! CLI commands implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::client::{DesignApiClient, ImageFormat};
use crate::config::{settings_path, store_path, Settings};
use crate::dedup::{DedupScope, DuplicateDetector};
use crate::images::ImageRetriever;
use crate::ingest::{CancelFlag, IngestReport, IngestionOrchestrator};
use crate::pacer::CallPacer;
use crate::repository::{JsonSlideStore, SlideRepository};

#[derive(Parser)]
#[command(name = "slidevault")]
#[command(about = "Slide library ingestion and deduplication")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true, env = "SLIDEVAULT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and settings file
    Init,

    /// Ingest slide candidates from a design document
    Ingest {
        /// Document id in the design tool
        document_id: String,
        /// Ingest only these node ids (needed when the API rejects the
        /// full document as too large)
        #[arg(short, long, value_delimiter = ',')]
        nodes: Vec<String>,
        /// Minimum classifier score for a candidate (overrides settings)
        #[arg(long)]
        min_score: Option<u32>,
        /// Request vector exports instead of compressed rasters
        #[arg(long)]
        high_fidelity: bool,
    },

    /// Find near-duplicate slides in the stored corpus
    Duplicates {
        /// Similarity threshold, 0.0 to 1.0 (overrides settings)
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Scan the whole corpus instead of drafts only
        #[arg(long)]
        all: bool,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(|| PathBuf::from(".slidevault"));
    let settings = Settings::load(&settings_path(&data_dir))?;

    match cli.command {
        Commands::Init => cmd_init(&data_dir, &settings),
        Commands::Ingest {
            document_id,
            nodes,
            min_score,
            high_fidelity,
        } => cmd_ingest(&data_dir, settings, &document_id, nodes, min_score, high_fidelity).await,
        Commands::Duplicates { threshold, all } => {
            cmd_duplicates(&data_dir, &settings, threshold, all).await
        }
    }
}

fn cmd_init(data_dir: &Path, settings: &Settings) -> anyhow::Result<()> {
    let path = settings_path(data_dir);
    settings.save(&path)?;
    println!(
        "{} settings written to {}",
        style("ok").green().bold(),
        path.display()
    );
    println!(
        "set {} or add an api.token entry before ingesting",
        style(crate::config::TOKEN_ENV_VAR).yellow()
    );
    Ok(())
}

async fn cmd_ingest(
    data_dir: &Path,
    settings: Settings,
    document_id: &str,
    nodes: Vec<String>,
    min_score: Option<u32>,
    high_fidelity: bool,
) -> anyhow::Result<()> {
    let tokens = settings.token_provider();
    let api = Arc::new(DesignApiClient::new(&settings.api.base_url, tokens)?);
    let repo = Arc::new(JsonSlideStore::open(store_path(data_dir))?);

    let format = if high_fidelity {
        ImageFormat::Svg
    } else {
        settings
            .ingest
            .image_format
            .parse()
            .unwrap_or(ImageFormat::Jpg)
    };
    let pacer = CallPacer::new(Duration::from_millis(settings.ingest.call_interval_ms));
    let retriever = ImageRetriever::new(api.clone(), pacer.clone(), settings.ingest.image_scales.clone())
        .with_format(format);

    let orchestrator = IngestionOrchestrator::new(
        api,
        repo,
        retriever,
        min_score.unwrap_or(settings.ingest.min_score),
    );

    // Ctrl-C aborts between candidates; completed drafts are kept.
    let cancel = CancelFlag::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupt received, finishing current candidate...");
            cancel_on_signal.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("valid progress template"),
    );
    spinner.set_message(format!("ingesting {}", document_id));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let selected = (!nodes.is_empty()).then_some(nodes.as_slice());
    let result = orchestrator.ingest(document_id, selected, &cancel).await;
    spinner.finish_and_clear();

    let report = result?;
    print_ingest_report(document_id, &report);

    let stats = pacer.stats().await;
    println!(
        "{} external calls, {:.1}s spent pacing",
        stats.total_calls,
        stats.total_waited.as_secs_f64()
    );
    Ok(())
}

fn print_ingest_report(document_id: &str, report: &IngestReport) {
    if report.cancelled {
        println!("{} ingestion of {} cancelled", style("!").yellow().bold(), document_id);
    } else {
        println!("{} ingested {}", style("ok").green().bold(), document_id);
    }
    println!(
        "  {} created, {} updated, {} skipped (of {} candidates)",
        style(report.created_count).green(),
        style(report.updated_count).cyan(),
        report.skipped_count,
        report.candidate_count
    );
    if !report.per_node_errors.is_empty() {
        println!("  {} node errors:", style(report.per_node_errors.len()).red());
        for error in &report.per_node_errors {
            println!("    {} {}", style(&error.node_id).dim(), error.reason);
        }
    }
}

async fn cmd_duplicates(
    data_dir: &Path,
    settings: &Settings,
    threshold: Option<f64>,
    all: bool,
) -> anyhow::Result<()> {
    let repo = JsonSlideStore::open(store_path(data_dir))?;
    let slides = repo.list_all().await?;

    let scope = if all { DedupScope::All } else { DedupScope::Drafts };
    let detector = DuplicateDetector::new(threshold.unwrap_or(settings.dedup.threshold));
    let report = detector.detect(&slides, scope);

    println!(
        "{} slides scanned, {} duplicate groups",
        report.stats.total_slides,
        style(report.stats.group_count).bold()
    );
    for (index, group) in report.groups.iter().enumerate() {
        println!(
            "{} (max similarity {:.0}%)",
            style(format!("group {}", index + 1)).bold(),
            group.max_similarity * 100.0
        );
        for member in &group.members {
            println!(
                "  {:>4.0}%  {}  {}",
                member.similarity * 100.0,
                style(&member.slide_id).dim(),
                member.title
            );
        }
    }
    Ok(())
}
