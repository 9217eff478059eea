//! Frame acquisition from the camera.
//!
//! This module provides:
//! - The `Frame` type handed down the pipeline
//! - The `FrameSource` trait owned by a scanning session
//! - HTTP still-image and MJPEG camera sources, local camera devices, and a
//!   directory replay source

pub mod device;
pub mod http;
pub mod replay;

use chrono::{DateTime, Local};
use image::RgbImage;

use crate::config::{CameraConfig, CameraMode};

pub use device::DeviceCamera;
pub use http::{MjpegCamera, SnapshotCamera};
pub use replay::ReplaySource;

/// One camera frame with its capture time.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub captured_at: DateTime<Local>,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Local::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to open camera {0}: {1}")]
    Open(String, String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("stream read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
    #[error("frame processing failed: {0}")]
    Vision(#[from] opencv::Error),
}

/// A device producing frames on demand.
///
/// `Ok(None)` means the device has closed and no further frames will come.
/// Implementations release the device when dropped.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Short human-readable description for status lines.
    fn describe(&self) -> String;
}

/// Opens the frame source selected by the camera configuration.
pub fn open_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
    let source: Box<dyn FrameSource> = match config.mode {
        CameraMode::Snapshot => Box::new(SnapshotCamera::open(config)?),
        CameraMode::Mjpeg => Box::new(MjpegCamera::open(config)?),
        CameraMode::Replay => Box::new(ReplaySource::open(&config.replay_dir)?),
        CameraMode::Device => Box::new(DeviceCamera::open(config.device_index)?),
    };
    tracing::info!(source = %source.describe(), "camera opened");
    Ok(source)
}
