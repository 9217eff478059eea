//! Scanning session state machine.
//!
//! One cycle runs AwaitingCard → Capturing → Isolating → Extracting →
//! Resolving → LookingUp → Recording, returning to AwaitingCard. Any stage
//! failing diverts to Skipping, which signals the operator and arms a manual
//! capture for the next cycle.

use anyhow::{anyhow, Result};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::capture::{Frame, FrameSource};
use crate::catalog::{CatalogLookup, LookupError};
use crate::ocr::{IdentifierResolver, OcrError, Resolution, ResolvedIdentifier, SkipReason, TextExtractor};
use crate::records::{RecordSink, ResolvedRecord};
use crate::session::cues::{Cue, CuePlayer};
use crate::vision::{CardIsolator, CroppedCard, IsolateError, MotionDetector};

/// Why a cycle produced no record.
#[derive(Debug)]
pub enum SkipCause {
    NoCard(IsolateError),
    Ocr(OcrError),
    Unresolved { reason: SkipReason, text: String },
    Lookup(LookupError),
    Record(String),
}

impl SkipCause {
    fn is_service_failure(&self) -> bool {
        match self {
            SkipCause::Ocr(e) => e.is_service_failure(),
            SkipCause::Lookup(e) => e.is_service_failure(),
            _ => false,
        }
    }
}

impl fmt::Display for SkipCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipCause::NoCard(e) => write!(f, "{}", e),
            SkipCause::Ocr(e) => write!(f, "{}", e),
            SkipCause::Unresolved { reason, .. } => write!(f, "{}", reason),
            SkipCause::Lookup(e) => write!(f, "{}", e),
            SkipCause::Record(msg) => write!(f, "failed to record card: {}", msg),
        }
    }
}

#[derive(Debug)]
pub enum SessionState {
    AwaitingCard,
    Capturing,
    Isolating(Frame),
    Extracting(CroppedCard),
    Resolving(String),
    LookingUp(ResolvedIdentifier),
    Recording(ResolvedRecord),
    Skipping(SkipCause),
    SessionComplete,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::AwaitingCard => write!(f, "Awaiting card"),
            SessionState::Capturing => write!(f, "Capturing"),
            SessionState::Isolating(_) => write!(f, "Isolating card"),
            SessionState::Extracting(_) => write!(f, "Extracting text"),
            SessionState::Resolving(_) => write!(f, "Resolving identifier"),
            SessionState::LookingUp(id) => write!(f, "Looking up {}-{}", id.resolved_set_id, id.card_id),
            SessionState::Recording(record) => write!(f, "Recording {}", record.name),
            SessionState::Skipping(cause) => write!(f, "Skipping: {}", cause),
            SessionState::SessionComplete => write!(f, "Session complete"),
        }
    }
}

/// How the session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    CycleLimit,
    SourceClosed,
    Cancelled,
    CaptureFailed(String),
    ServiceFailures(u32),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::CycleLimit => write!(f, "cycle limit reached"),
            EndReason::SourceClosed => write!(f, "frame source closed"),
            EndReason::Cancelled => write!(f, "cancelled by operator"),
            EndReason::CaptureFailed(msg) => write!(f, "camera read failed: {}", msg),
            EndReason::ServiceFailures(n) => write!(f, "{} consecutive service failures", n),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub cycles: u32,
    pub recorded: u32,
    pub skipped: u32,
}

/// The stages a session drives, in pipeline order.
pub struct Pipeline {
    pub detector: MotionDetector,
    pub isolator: CardIsolator,
    pub extractor: TextExtractor,
    pub resolver: IdentifierResolver,
    pub catalog: CatalogLookup,
    pub sink: RecordSink,
    pub cues: Box<dyn CuePlayer>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_cycles: u32,
    pub max_service_failures: u32,
    /// Where capture and crop images are saved, if anywhere
    pub captures_dir: Option<PathBuf>,
    /// A skip hands the next capture to the operator; needs operator input
    pub manual_retry: bool,
}

pub struct SessionContext {
    pub state: SessionState,
    source: Box<dyn FrameSource>,
    pipeline: Pipeline,
    settings: SessionSettings,
    /// Current cycle number (1-based)
    pub current_cycle: u32,
    /// Next capture bypasses motion detection
    manual_next: bool,
    service_failures: u32,
    capture_stem: Option<String>,
    pub stats: SessionStats,
    pub end_reason: Option<EndReason>,
    pub start_time: Instant,
}

impl SessionContext {
    pub fn new(source: Box<dyn FrameSource>, pipeline: Pipeline, settings: SessionSettings) -> Self {
        Self {
            state: SessionState::AwaitingCard,
            source,
            pipeline,
            settings,
            current_cycle: 0,
            manual_next: false,
            service_failures: 0,
            capture_stem: None,
            stats: SessionStats::default(),
            end_reason: None,
            start_time: Instant::now(),
        }
    }

    pub fn manual_next(&self) -> bool {
        self.manual_next
    }

    /// Advances the state machine by one step.
    ///
    /// Returns `Ok(true)` while the session continues and `Ok(false)` once it is
    /// complete. Errors end the session as well.
    pub fn step(&mut self) -> Result<bool> {
        let state = std::mem::replace(&mut self.state, SessionState::SessionComplete);

        let next = match state {
            SessionState::AwaitingCard => {
                if self.current_cycle >= self.settings.max_cycles {
                    info!(
                        "Session complete: {} cycles in {:.1}s",
                        self.current_cycle,
                        self.start_time.elapsed().as_secs_f32()
                    );
                    self.end_reason = Some(EndReason::CycleLimit);
                    SessionState::SessionComplete
                } else {
                    self.current_cycle += 1;
                    self.stats.cycles = self.current_cycle;
                    info!(
                        "Cycle {}/{}: Waiting for new card...",
                        self.current_cycle, self.settings.max_cycles
                    );
                    SessionState::Capturing
                }
            }

            SessionState::Capturing => match self.pipeline.detector.detect(self.source.as_mut(), self.manual_next) {
                Ok(Some(frame)) => {
                    self.save_capture(&frame);
                    SessionState::Isolating(frame)
                }
                Ok(None) => {
                    let reason = if self.pipeline.detector.is_cancelled() {
                        EndReason::Cancelled
                    } else {
                        EndReason::SourceClosed
                    };
                    info!("Ending session: {}", reason);
                    self.end_reason = Some(reason);
                    SessionState::SessionComplete
                }
                Err(e) => {
                    self.end_reason = Some(EndReason::CaptureFailed(e.to_string()));
                    return Err(anyhow!("Camera read failed: {}", e));
                }
            },

            SessionState::Isolating(frame) => match self.pipeline.isolator.isolate(&frame) {
                Ok(card) => {
                    info!(
                        x = card.bbox.x,
                        y = card.bbox.y,
                        width = card.bbox.width,
                        height = card.bbox.height,
                        "Card isolated"
                    );
                    self.save_crop(&card);
                    SessionState::Extracting(card)
                }
                Err(e) => SessionState::Skipping(SkipCause::NoCard(e)),
            },

            SessionState::Extracting(card) => match self.pipeline.extractor.extract(&card.image) {
                Ok(text) => {
                    self.service_failures = 0;
                    info!(text = %text, "Text extracted");
                    SessionState::Resolving(text)
                }
                Err(e) => SessionState::Skipping(SkipCause::Ocr(e)),
            },

            SessionState::Resolving(text) => match self.pipeline.resolver.resolve(&text) {
                Resolution::Resolved(id) => {
                    info!(
                        set_code = %id.set_code,
                        card_number = %id.card_number,
                        "Resolved {}-{}",
                        id.resolved_set_id,
                        id.card_id
                    );
                    SessionState::LookingUp(id)
                }
                Resolution::Skip(reason) => SessionState::Skipping(SkipCause::Unresolved { reason, text }),
            },

            SessionState::LookingUp(id) => {
                match self.pipeline.catalog.lookup(&id.resolved_set_id, &id.card_id) {
                    Ok(card) => {
                        self.service_failures = 0;
                        info!(
                            id = %card.id,
                            name = %card.name,
                            category = %card.category,
                            kind = card.types_or_trainer_type.as_deref().unwrap_or("-"),
                            "Card found"
                        );
                        SessionState::Recording(ResolvedRecord::new(&id, card))
                    }
                    Err(e) => SessionState::Skipping(SkipCause::Lookup(e)),
                }
            }

            SessionState::Recording(record) => match self.pipeline.sink.append(&record) {
                Ok(()) => {
                    self.stats.recorded += 1;
                    self.manual_next = false;
                    self.pipeline.cues.play(Cue::Success);
                    info!(
                        "Cycle {}/{}: Recorded {} ({} {})",
                        self.current_cycle, self.settings.max_cycles, record.name, record.set_code, record.card_number
                    );
                    SessionState::AwaitingCard
                }
                Err(e) => SessionState::Skipping(SkipCause::Record(format!("{:#}", e))),
            },

            SessionState::Skipping(cause) => {
                match &cause {
                    SkipCause::Unresolved { reason, text } => {
                        warn!(raw_text = ?text, "Skipping card: {}", reason)
                    }
                    other => warn!("Skipping card: {}", other),
                }
                self.stats.skipped += 1;
                self.manual_next = self.settings.manual_retry;
                self.pipeline.cues.play(Cue::Failure);
                if self.manual_next {
                    info!("Next capture is manual: present the card and press Enter");
                }

                if cause.is_service_failure() {
                    self.service_failures += 1;
                    if self.service_failures >= self.settings.max_service_failures {
                        error!("Remote service failed {} times in a row", self.service_failures);
                        self.end_reason = Some(EndReason::ServiceFailures(self.service_failures));
                        return Err(anyhow!(
                            "Giving up after {} consecutive service failures",
                            self.service_failures
                        ));
                    }
                }
                SessionState::AwaitingCard
            }

            SessionState::SessionComplete => return Ok(false),
        };

        let running = !matches!(next, SessionState::SessionComplete);
        self.state = next;
        Ok(running)
    }

    fn save_capture(&mut self, frame: &Frame) {
        let Some(dir) = &self.settings.captures_dir else {
            return;
        };
        let stem = format!("{:03}_{}", self.current_cycle, frame.captured_at.format("%Y%m%d_%H%M%S"));
        let path = dir.join(format!("{}_capture.jpg", stem));
        match frame.image.save(&path) {
            Ok(()) => info!("Capture saved to {}", path.display()),
            Err(e) => warn!("Failed to save capture {}: {}", path.display(), e),
        }
        self.capture_stem = Some(stem);
    }

    fn save_crop(&self, card: &CroppedCard) {
        let (Some(dir), Some(stem)) = (&self.settings.captures_dir, &self.capture_stem) else {
            return;
        };
        let path = dir.join(format!("{}_card.jpg", stem));
        if let Err(e) = card.image.save(&path) {
            warn!("Failed to save card crop {}: {}", path.display(), e);
        }
    }
}
