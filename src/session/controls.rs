//! Operator controls: manual capture and cancel.
//!
//! Requests are latched in atomics and consumed by the motion detector.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

#[derive(Debug, Default)]
pub struct OperatorControls {
    manual: AtomicBool,
    cancel: AtomicBool,
}

impl OperatorControls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_manual_capture(&self) {
        self.manual.store(true, Ordering::SeqCst);
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Consumes a pending manual-capture request.
    pub fn take_manual_capture(&self) -> bool {
        self.manual.swap(false, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKey {
    Capture,
    Cancel,
}

/// Maps one line of operator input to a control.
///
/// An empty line, `c` or `s` captures; `q`, `quit` or `esc` cancels.
pub fn parse_key(line: &str) -> Option<OperatorKey> {
    match line.trim().to_ascii_lowercase().as_str() {
        "" | "c" | "s" => Some(OperatorKey::Capture),
        "q" | "quit" | "esc" | "\u{1b}" => Some(OperatorKey::Cancel),
        _ => None,
    }
}

pub fn apply_key(controls: &OperatorControls, key: OperatorKey) {
    match key {
        OperatorKey::Capture => {
            info!("Manual capture requested");
            controls.request_manual_capture();
        }
        OperatorKey::Cancel => {
            info!("Cancel requested");
            controls.request_cancel();
        }
    }
}

/// Reads operator commands from stdin until cancel or end of input.
pub fn spawn_stdin_listener(controls: Arc<OperatorControls>) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_key(&line) {
                Some(key) => {
                    apply_key(&controls, key);
                    if key == OperatorKey::Cancel {
                        break;
                    }
                }
                None => debug!(input = %line, "ignored operator input"),
            }
        }
    })
}
