//! Local camera devices through OpenCV's video capture.

use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use tracing::{info, warn};

use super::{CaptureError, Frame, FrameSource};
use crate::vision::ops::bgr_mat_to_rgb;

/// A camera attached to this machine, addressed by index.
pub struct DeviceCamera {
    index: i32,
    capture: VideoCapture,
    frames: u64,
}

impl DeviceCamera {
    pub fn open(index: i32) -> Result<Self, CaptureError> {
        let name = format!("device {}", index);
        let capture = VideoCapture::new(index, videoio::CAP_ANY)
            .map_err(|e| CaptureError::Open(name.clone(), e.to_string()))?;
        let opened = capture
            .is_opened()
            .map_err(|e| CaptureError::Open(name.clone(), e.to_string()))?;
        if !opened {
            return Err(CaptureError::Open(name, "device not available".to_string()));
        }
        Ok(Self {
            index,
            capture,
            frames: 0,
        })
    }
}

impl FrameSource for DeviceCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut mat = Mat::default();
        if !self.capture.read(&mut mat)? || mat.empty() {
            return Ok(None);
        }
        let image = bgr_mat_to_rgb(&mat)?;
        self.frames += 1;
        Ok(Some(Frame::new(image)))
    }

    fn describe(&self) -> String {
        format!("camera device {}", self.index)
    }
}

impl Drop for DeviceCamera {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!(index = self.index, error = %e, "failed to release camera device");
        }
        info!(index = self.index, frames = self.frames, "camera device released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_fails_to_open() {
        match DeviceCamera::open(9999) {
            Err(CaptureError::Open(name, _)) => assert_eq!(name, "device 9999"),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("device 9999 should not exist"),
        }
    }
}
