//! Card scanner
//!
//! Watches a camera for trading cards placed under it, reads each card's
//! printed set code and collector number, looks the card up in the TCGdex
//! catalog and appends it to a local collection.

mod capture;
mod catalog;
mod config;
mod logging;
mod ocr;
mod paths;
mod records;
mod report;
mod retry;
mod session;
mod vision;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::ocr::{IdentifierResolver, Resolution};
use crate::records::RecordStore;
use crate::session::{EndReason, ScanOptions};

#[derive(Parser)]
#[command(name = "cardscan", version, about = "Catalogue trading cards from a camera feed")]
struct Cli {
    /// Config file (default: ./config.json, then the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scanning session
    Scan {
        /// Number of capture cycles (overrides session.max_cycles)
        #[arg(long)]
        cycles: Option<u32>,
        /// No sound cues
        #[arg(long)]
        quiet: bool,
        /// Do not write preview.jpg during motion detection
        #[arg(long)]
        no_preview: bool,
    },
    /// Count identical cards and write the report files
    Report,
    /// Resolve a line of card text without the camera
    Resolve {
        /// Text as the OCR would return it
        text: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_path) = AppConfig::discover(cli.config.as_deref())?;
    let log_path = logging::init(&config.logging.level)?;
    match &config_path {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }
    info!("Logging to {}", log_path.display());

    match cli.command {
        Commands::Scan {
            cycles,
            quiet,
            no_preview,
        } => scan(&config, cycles, quiet, no_preview),
        Commands::Report => report(&config),
        Commands::Resolve { text } => resolve(&config, &text),
    }
}

fn scan(config: &AppConfig, cycles: Option<u32>, quiet: bool, no_preview: bool) -> Result<()> {
    let options = ScanOptions {
        max_cycles: cycles,
        preview: !no_preview,
        cues: !quiet,
    };
    let summary = session::run_scan(config, &options)?;

    println!(
        "Recorded {} of {} cards ({} skipped). Collection: {}",
        summary.stats.recorded,
        summary.stats.cycles,
        summary.stats.skipped,
        summary.store_path.display()
    );

    match summary.end_reason {
        EndReason::CaptureFailed(_) | EndReason::ServiceFailures(_) => {
            Err(anyhow!("Session aborted: {}", summary.end_reason))
        }
        _ => Ok(()),
    }
}

fn report(config: &AppConfig) -> Result<()> {
    let output_dir = &config.output.dir;
    std::fs::create_dir_all(output_dir).context("Failed to create output directory")?;
    let store = RecordStore::new(&paths::get_record_store_path(output_dir));

    let (outputs, total) = report::generate_report(&store, output_dir)?;
    if total == 0 {
        warn!("The collection is empty");
    }

    println!("{} cards counted", total);
    println!("  {}", outputs.csv.display());
    println!("  {}", outputs.xlsx.display());
    if let Some(chart) = &outputs.chart {
        println!("  {}", chart.display());
    }
    Ok(())
}

fn resolve(config: &AppConfig, text: &str) -> Result<()> {
    let resolver = IdentifierResolver::new(&config.sets).context("Invalid set token table")?;
    println!("Set code matches: {:?}", resolver.set_code_matches(text));

    match resolver.resolve(text) {
        Resolution::Resolved(id) => println!(
            "{} {} -> {}-{}",
            id.set_code, id.card_number, id.resolved_set_id, id.card_id
        ),
        Resolution::Skip(reason) => println!("Skip: {}", reason),
    }
    Ok(())
}
