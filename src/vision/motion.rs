//! Motion-triggered capture.
//!
//! Consecutive frames are differenced, blurred, thresholded and dilated; the
//! outer contours of what remains are the moving regions. A region large
//! enough to not be noise whose box starts inside the ROI triggers a capture.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use image::RgbImage;

use super::contour::{find_external_contours, BoundingBox};
use super::ops::{abs_diff, dilate, gaussian_blur, rgb_to_mat, threshold, to_gray, ThresholdMode};
use super::preview::write_preview;
use crate::capture::{CaptureError, Frame, FrameSource};
use crate::config::MotionConfig;
use crate::session::controls::OperatorControls;

/// Region of interest, inclusive on every edge, in frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Roi {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl Roi {
    /// ROI of `half_width` x `half_height` around the centre of a frame.
    pub fn centered(frame_width: u32, frame_height: u32, half_width: u32, half_height: u32) -> Self {
        let cx = (frame_width / 2) as i64;
        let cy = (frame_height / 2) as i64;
        Self {
            x1: cx - half_width as i64,
            y1: cy - half_height as i64,
            x2: cx + half_width as i64,
            y2: cy + half_height as i64,
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        self.x1 <= x && x <= self.x2 && self.y1 <= y && y <= self.y2
    }

    /// The ROI as a drawable box, clamped to the frame.
    pub fn to_box(&self, frame_width: u32, frame_height: u32) -> BoundingBox {
        BoundingBox::clamped(
            self.x1,
            self.y1,
            self.x2 - self.x1 + 1,
            self.y2 - self.y1 + 1,
            frame_width,
            frame_height,
        )
    }
}

/// Result of comparing one frame pair.
#[derive(Clone, Debug, Default)]
pub struct MotionScan {
    /// Boxes of contours above the area threshold
    pub candidates: Vec<BoundingBox>,
    /// First candidate whose top-left corner lies in the ROI
    pub trigger: Option<BoundingBox>,
}

/// Compares two frames and reports moving regions.
pub fn scan_pair(prev: &RgbImage, next: &RgbImage, roi: &Roi, config: &MotionConfig) -> opencv::Result<MotionScan> {
    let Some(diff) = abs_diff(&rgb_to_mat(prev)?, &rgb_to_mat(next)?)? else {
        return Ok(MotionScan::default());
    };
    let gray = to_gray(&diff)?;
    let blurred = gaussian_blur(&gray, config.blur_kernel)?;
    let mask = threshold(&blurred, config.diff_threshold, ThresholdMode::Binary)?;
    let dilated = dilate(&mask, config.dilate_iterations)?;

    let (width, height) = next.dimensions();
    let mut scan = MotionScan::default();

    for contour in find_external_contours(&dilated)? {
        if contour.area()? < config.min_contour_area {
            continue;
        }
        let bbox = contour.bounding_box(width, height)?;
        if scan.trigger.is_none() && roi.contains(bbox.x as i64, bbox.y as i64) {
            scan.trigger = Some(bbox);
        }
        scan.candidates.push(bbox);
    }

    Ok(scan)
}

/// Watches a frame source and returns one capture per detected card.
pub struct MotionDetector {
    config: MotionConfig,
    controls: Arc<OperatorControls>,
    preview_path: Option<PathBuf>,
}

impl MotionDetector {
    pub fn new(config: MotionConfig, controls: Arc<OperatorControls>, preview_path: Option<PathBuf>) -> Self {
        let preview_path = if config.preview { preview_path } else { None };
        Self {
            config,
            controls,
            preview_path,
        }
    }

    pub fn roi_for(&self, frame_width: u32, frame_height: u32) -> Roi {
        Roi::centered(
            frame_width,
            frame_height,
            self.config.roi_half_width,
            self.config.roi_half_height,
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.controls.is_cancelled()
    }

    /// Blocks until a capture frame is available.
    ///
    /// Returns `Ok(None)` when the operator cancels or the source closes. With
    /// `manual_override` set, motion detection is bypassed and the frame is
    /// taken when the operator requests it.
    pub fn detect(&self, source: &mut dyn FrameSource, manual_override: bool) -> Result<Option<Frame>, CaptureError> {
        if self.controls.is_cancelled() {
            return Ok(None);
        }
        if manual_override {
            return self.await_manual_capture(source);
        }

        let Some(mut prev) = source.next_frame()? else {
            return Ok(None);
        };
        let Some(mut next) = source.next_frame()? else {
            return Ok(None);
        };
        let roi = self.roi_for(prev.width(), prev.height());
        debug!(?roi, "motion detection armed");
        let mut evaluated: u64 = 0;

        loop {
            if self.controls.is_cancelled() {
                info!("Capture cancelled by operator");
                return Ok(None);
            }
            if self.controls.take_manual_capture() {
                info!("Manual capture");
                return source.next_frame();
            }

            let scan = scan_pair(&prev.image, &next.image, &roi, &self.config)?;
            evaluated += 1;

            if let Some(path) = &self.preview_path {
                let every = self.config.preview_every.max(1) as u64;
                if scan.trigger.is_some() || evaluated % every == 0 {
                    write_preview(path, &prev.image, &roi, &scan);
                }
            }

            if let Some(trigger) = scan.trigger {
                info!(
                    x = trigger.x,
                    y = trigger.y,
                    width = trigger.width,
                    height = trigger.height,
                    "Motion detected! Waiting for card to settle..."
                );
                std::thread::sleep(Duration::from_millis(self.config.settle_delay_ms));
                return source.next_frame();
            }

            prev = next;
            next = match source.next_frame()? {
                Some(frame) => frame,
                None => return Ok(None),
            };
        }
    }

    /// Keeps the source drained until the operator asks for a capture.
    fn await_manual_capture(&self, source: &mut dyn FrameSource) -> Result<Option<Frame>, CaptureError> {
        info!("Waiting for manual capture (press Enter)");
        let poll = Duration::from_millis(self.config.manual_poll_ms);

        loop {
            if self.controls.is_cancelled() {
                info!("Capture cancelled by operator");
                return Ok(None);
            }
            if self.controls.take_manual_capture() {
                info!("Manual capture");
                return source.next_frame();
            }
            if source.next_frame()?.is_none() {
                return Ok(None);
            }
            std::thread::sleep(poll);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::collections::VecDeque;

    const W: u32 = 320;
    const H: u32 = 320;

    fn test_config() -> MotionConfig {
        MotionConfig {
            settle_delay_ms: 0,
            manual_poll_ms: 5,
            preview: false,
            ..MotionConfig::default()
        }
    }

    fn blank() -> RgbImage {
        RgbImage::from_pixel(W, H, Rgb([20, 20, 20]))
    }

    fn with_block(x: u32, y: u32, w: u32, h: u32) -> RgbImage {
        let mut img = blank();
        for py in y..y + h {
            for px in x..x + w {
                img.put_pixel(px, py, Rgb([230, 230, 230]));
            }
        }
        img
    }

    struct ScriptedSource {
        frames: VecDeque<RgbImage>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<RgbImage>) -> Self {
            Self {
                frames: frames.into(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
            Ok(self.frames.pop_front().map(Frame::new))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[test]
    fn test_roi_centered() {
        let roi = Roi::centered(640, 480, 50, 100);
        assert_eq!(roi, Roi { x1: 270, y1: 140, x2: 370, y2: 340 });
        assert!(roi.contains(270, 340));
        assert!(!roi.contains(269, 200));
    }

    #[test]
    fn test_motion_inside_roi_triggers() {
        let config = test_config();
        let roi = Roi::centered(W, H, 50, 100);
        // Block starts just inside the ROI's top-left region
        let scan = scan_pair(&blank(), &with_block(130, 80, 80, 80), &roi, &config).unwrap();

        let trigger = scan.trigger.expect("expected a trigger");
        assert!(roi.contains(trigger.x as i64, trigger.y as i64));
        assert!(trigger.fits_within(W, H));
    }

    #[test]
    fn test_motion_outside_roi_never_triggers() {
        let config = test_config();
        let roi = Roi::centered(W, H, 50, 100);
        // Large block entirely in the bottom-right corner
        let scan = scan_pair(&blank(), &with_block(240, 240, 70, 70), &roi, &config).unwrap();

        assert_eq!(scan.candidates.len(), 1);
        assert!(scan.trigger.is_none());
    }

    #[test]
    fn test_small_motion_is_noise() {
        let config = test_config();
        let roi = Roi::centered(W, H, 50, 100);
        let scan = scan_pair(&blank(), &with_block(150, 150, 8, 8), &roi, &config).unwrap();

        assert!(scan.candidates.is_empty());
        assert!(scan.trigger.is_none());
    }

    #[test]
    fn test_detect_returns_frame_after_trigger() {
        let detector = MotionDetector::new(test_config(), Arc::new(OperatorControls::new()), None);
        let capture = with_block(130, 80, 80, 80);
        let mut source = ScriptedSource::new(vec![blank(), blank(), capture.clone(), capture]);

        let frame = detector.detect(&mut source, false).unwrap().unwrap();
        // The returned frame is read after the trigger pair
        assert_eq!(frame.image.get_pixel(150, 100), &Rgb([230, 230, 230]));
        assert!(source.frames.is_empty());
    }

    #[test]
    fn test_detect_none_when_source_closes() {
        let detector = MotionDetector::new(test_config(), Arc::new(OperatorControls::new()), None);
        let mut source = ScriptedSource::new(vec![blank(), blank(), blank()]);
        assert!(detector.detect(&mut source, false).unwrap().is_none());
    }

    #[test]
    fn test_manual_override_takes_frame_on_request() {
        let controls = Arc::new(OperatorControls::new());
        controls.request_manual_capture();
        let detector = MotionDetector::new(test_config(), controls.clone(), None);
        let mut source = ScriptedSource::new(vec![blank(), blank()]);

        assert!(detector.detect(&mut source, true).unwrap().is_some());
        assert_eq!(source.frames.len(), 1);
        assert!(!controls.take_manual_capture());
    }

    #[test]
    fn test_manual_override_waits_for_operator() {
        let detector = MotionDetector::new(test_config(), Arc::new(OperatorControls::new()), None);
        let capture = with_block(130, 80, 80, 80);
        let mut source = ScriptedSource::new(vec![capture.clone(), capture.clone(), capture]);

        // No request arrives, so every frame is drained and nothing is returned
        assert!(detector.detect(&mut source, true).unwrap().is_none());
        assert!(source.frames.is_empty());
    }

    #[test]
    fn test_manual_override_cancelled_while_waiting() {
        let controls = Arc::new(OperatorControls::new());
        let detector = MotionDetector::new(test_config(), controls.clone(), None);
        let mut source = ScriptedSource::new(vec![blank(); 200]);

        let canceller = {
            let controls = controls.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                controls.request_cancel();
            })
        };
        assert!(detector.detect(&mut source, true).unwrap().is_none());
        canceller.join().unwrap();
        assert!(!source.frames.is_empty());
    }

    #[test]
    fn test_request_during_manual_wait_is_not_reused() {
        let controls = Arc::new(OperatorControls::new());
        controls.request_manual_capture();
        let detector = MotionDetector::new(test_config(), controls.clone(), None);
        let capture = with_block(130, 80, 80, 80);
        let mut source = ScriptedSource::new(vec![blank(), blank(), blank(), blank(), capture.clone(), capture]);

        assert!(detector.detect(&mut source, true).unwrap().is_some());
        // The next armed cycle runs motion detection instead of a manual grab
        let frame = detector.detect(&mut source, false).unwrap().unwrap();
        assert_eq!(frame.image.get_pixel(150, 100), &Rgb([230, 230, 230]));
    }

    #[test]
    fn test_cancel_returns_none() {
        let controls = Arc::new(OperatorControls::new());
        controls.request_cancel();
        let detector = MotionDetector::new(test_config(), controls, None);
        let mut source = ScriptedSource::new(vec![blank(), with_block(130, 80, 80, 80)]);

        assert!(detector.detect(&mut source, false).unwrap().is_none());
    }
}
