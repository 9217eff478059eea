//! Session runner: builds the pipeline from configuration and drives the
//! state machine until the session ends.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::capture::open_source;
use crate::catalog::{CatalogLookup, TcgdexClient};
use crate::config::AppConfig;
use crate::ocr::{build_recognizer, IdentifierResolver, TextExtractor};
use crate::paths;
use crate::records::RecordSink;
use crate::retry::RetryPolicy;
use crate::session::controls::{spawn_stdin_listener, OperatorControls};
use crate::session::cues::{CuePlayer, SilentCues, SoundCues};
use crate::session::state::{EndReason, Pipeline, SessionContext, SessionSettings, SessionStats};
use crate::vision::{CardIsolator, MotionDetector};

/// Command-line overrides for one scanning session.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_cycles: Option<u32>,
    pub preview: bool,
    pub cues: bool,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub stats: SessionStats,
    pub end_reason: EndReason,
    pub elapsed: Duration,
    pub store_path: PathBuf,
}

pub fn run_scan(config: &AppConfig, options: &ScanOptions) -> Result<SessionSummary> {
    let output_dir = &config.output.dir;
    paths::ensure_directories(output_dir).context("Failed to create output directories")?;

    let retry = RetryPolicy::from_config(&config.retry);
    let recognizer = build_recognizer(&config.ocr, retry.timeout).context("Failed to set up OCR")?;
    let resolver = IdentifierResolver::new(&config.sets).context("Invalid set token table")?;
    let catalog =
        TcgdexClient::new(&config.catalog.base_url, retry.timeout).context("Failed to set up catalog client")?;

    let store_path = paths::get_record_store_path(output_dir);
    let sink = RecordSink::open(&store_path, &paths::get_spreadsheet_path(output_dir))?;

    let cues: Box<dyn CuePlayer> = if options.cues && config.cues.enabled {
        Box::new(SoundCues::new(config.cues.clone()))
    } else {
        Box::new(SilentCues)
    };

    let controls = Arc::new(OperatorControls::new());
    if config.session.operator_keys {
        spawn_stdin_listener(controls.clone());
        info!("Press Enter to capture manually, q then Enter to quit");
    }

    let mut motion = config.motion.clone();
    motion.preview = motion.preview && options.preview;
    let detector = MotionDetector::new(motion, controls, Some(paths::get_preview_path(output_dir)));

    let source = open_source(&config.camera).context("Failed to open camera")?;

    let pipeline = Pipeline {
        detector,
        isolator: CardIsolator::new(config.isolator.clone()),
        extractor: TextExtractor::new(recognizer, retry.clone()),
        resolver,
        catalog: CatalogLookup::new(Box::new(catalog), retry),
        sink,
        cues,
    };
    let settings = SessionSettings {
        max_cycles: options.max_cycles.unwrap_or(config.session.max_cycles),
        max_service_failures: config.session.max_service_failures.max(1),
        captures_dir: config
            .output
            .save_captures
            .then(|| paths::get_captures_dir(output_dir)),
        manual_retry: config.session.operator_keys,
    };

    info!(
        "Starting session: up to {} cards from {}",
        settings.max_cycles,
        source.describe()
    );
    info!("Records: {}", store_path.display());

    let mut ctx = SessionContext::new(source, pipeline, settings);
    loop {
        match ctx.step() {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => {
                error!("Session ended: {:#}", e);
                break;
            }
        }
    }

    let summary = SessionSummary {
        stats: ctx.stats.clone(),
        end_reason: ctx.end_reason.clone().unwrap_or(EndReason::SourceClosed),
        elapsed: ctx.start_time.elapsed(),
        store_path,
    };
    // Releases the camera
    drop(ctx);

    info!(
        "Session summary: {} cycles, {} recorded, {} skipped in {:.1}s ({})",
        summary.stats.cycles,
        summary.stats.recorded,
        summary.stats.skipped,
        summary.elapsed.as_secs_f32(),
        summary.end_reason
    );
    Ok(summary)
}
