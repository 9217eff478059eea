//! Image analysis for the capture pipeline.
//!
//! This module provides:
//! - Pixel operations on OpenCV matrices (difference, blur, threshold, dilation)
//! - Outer contour extraction and clamped bounding boxes
//! - Motion-triggered capture against a centred region of interest
//! - Card isolation by largest contour
//! - Preview rendering of what the detector sees

pub mod contour;
pub mod isolate;
pub mod motion;
pub mod ops;
pub mod preview;

pub use isolate::{CardIsolator, CroppedCard, IsolateError};
pub use motion::MotionDetector;
