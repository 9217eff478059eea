//! Annotated preview of the motion detector's view.
//!
//! Draws the ROI and candidate contour boxes onto a copy of the frame. The
//! preview is written to disk for the operator and never feeds back into
//! detection.

use image::{Rgb, RgbImage};
use std::path::Path;

use super::contour::BoundingBox;
use super::motion::{MotionScan, Roi};

pub const COLOR_ROI: Rgb<u8> = Rgb([0, 0, 255]); // Blue
pub const COLOR_CANDIDATE: Rgb<u8> = Rgb([0, 255, 0]); // Green
pub const COLOR_TRIGGER: Rgb<u8> = Rgb([255, 0, 0]); // Red

/// Renders ROI and contour boxes onto a copy of `frame`.
pub fn render_preview(frame: &RgbImage, roi: &Roi, scan: &MotionScan) -> RgbImage {
    let mut img = frame.clone();
    let roi_box = roi.to_box(img.width(), img.height());
    draw_rect(&mut img, &roi_box, COLOR_ROI, 2);

    for candidate in &scan.candidates {
        draw_rect(&mut img, candidate, COLOR_CANDIDATE, 2);
    }
    if let Some(trigger) = &scan.trigger {
        draw_rect(&mut img, trigger, COLOR_TRIGGER, 3);
    }

    img
}

/// Renders and saves the preview; failures are logged only.
pub fn write_preview(path: &Path, frame: &RgbImage, roi: &Roi, scan: &MotionScan) {
    let img = render_preview(frame, roi, scan);
    if let Err(e) = img.save(path) {
        tracing::warn!(path = %path.display(), error = %e, "could not write preview");
    }
}

/// Draws a rectangle outline, clipped to the image.
pub fn draw_rect(img: &mut RgbImage, rect: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    if rect.is_empty() {
        return;
    }
    let (img_w, img_h) = img.dimensions();
    let mut put = |px: u32, py: u32| {
        if px < img_w && py < img_h {
            img.put_pixel(px, py, color);
        }
    };

    for t in 0..thickness.min(rect.height) {
        for dx in 0..rect.width {
            put(rect.x + dx, rect.y + t);
            put(rect.x + dx, rect.y + rect.height - 1 - t);
        }
    }
    for t in 0..thickness.min(rect.width) {
        for dy in 0..rect.height {
            put(rect.x + t, rect.y + dy);
            put(rect.x + rect.width - 1 - t, rect.y + dy);
        }
    }
}
