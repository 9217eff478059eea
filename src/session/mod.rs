//! Scanning session.
//!
//! This module provides:
//! - The per-card state machine (`SessionContext`)
//! - Operator controls for manual capture and cancel
//! - Audible cues on success and failure
//! - The runner that wires configuration into a live session

pub mod controls;
pub mod cues;
pub mod runner;
pub mod state;

pub use runner::{run_scan, ScanOptions};
pub use state::EndReason;
