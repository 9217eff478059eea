//! Pixel operations shared by the motion detector and the card isolator.
//!
//! Frames travel through the pipeline as `RgbImage`; they are copied into an
//! OpenCV `Mat` here and processed with `imgproc`.

use image::{GrayImage, RgbImage};
use opencv::core::{self, Mat, Point, Scalar, Size};
use opencv::imgproc;
use opencv::prelude::*;

/// How `threshold` maps intensities to the binary mask.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThresholdMode {
    /// Pixels above the cutoff become foreground (255)
    Binary,
    /// Pixels above the cutoff become background (0)
    BinaryInverted,
}

impl ThresholdMode {
    fn flag(self) -> i32 {
        match self {
            ThresholdMode::Binary => imgproc::THRESH_BINARY,
            ThresholdMode::BinaryInverted => imgproc::THRESH_BINARY_INV,
        }
    }
}

fn mat_from_bytes(width: u32, height: u32, typ: i32, bytes: &[u8]) -> opencv::Result<Mat> {
    let mut mat = Mat::new_rows_cols_with_default(height as i32, width as i32, typ, Scalar::all(0.0))?;
    mat.data_bytes_mut()?.copy_from_slice(bytes);
    Ok(mat)
}

/// Copies an RGB image into a 3-channel `Mat` (channel order stays RGB).
pub fn rgb_to_mat(img: &RgbImage) -> opencv::Result<Mat> {
    mat_from_bytes(img.width(), img.height(), core::CV_8UC3, img.as_raw())
}

/// Copies a single-channel image into a `Mat`.
pub fn gray_to_mat(img: &GrayImage) -> opencv::Result<Mat> {
    mat_from_bytes(img.width(), img.height(), core::CV_8UC1, img.as_raw())
}

/// Converts a BGR camera frame into an `RgbImage`.
pub fn bgr_mat_to_rgb(frame: &Mat) -> opencv::Result<RgbImage> {
    let mut rgb = Mat::default();
    imgproc::cvt_color(frame, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;
    let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
    RgbImage::from_raw(width, height, rgb.data_bytes()?.to_vec())
        .ok_or_else(|| opencv::Error::new(core::StsUnmatchedSizes, "frame buffer does not match its size"))
}

#[cfg(test)]
pub fn mat_to_gray(mat: &Mat) -> opencv::Result<GrayImage> {
    GrayImage::from_raw(mat.cols() as u32, mat.rows() as u32, mat.data_bytes()?.to_vec())
        .ok_or_else(|| opencv::Error::new(core::StsUnmatchedSizes, "mask buffer does not match its size"))
}

/// Per-channel absolute difference of two equally sized frames.
///
/// Returns `None` when the dimensions differ.
pub fn abs_diff(a: &Mat, b: &Mat) -> opencv::Result<Option<Mat>> {
    if a.size()? != b.size()? {
        return Ok(None);
    }
    let mut out = Mat::default();
    core::absdiff(a, b, &mut out)?;
    Ok(Some(out))
}

/// Single-channel intensity image of an RGB `Mat`.
pub fn to_gray(img: &Mat) -> opencv::Result<Mat> {
    let mut gray = Mat::default();
    imgproc::cvt_color(img, &mut gray, imgproc::COLOR_RGB2GRAY, 0)?;
    Ok(gray)
}

/// Gaussian blur with a square odd kernel; sigma is derived from the size.
pub fn gaussian_blur(img: &Mat, kernel: u32) -> opencv::Result<Mat> {
    let k = kernel as i32;
    let mut out = Mat::default();
    imgproc::gaussian_blur(img, &mut out, Size::new(k, k), 0.0, 0.0, core::BORDER_DEFAULT)?;
    Ok(out)
}

/// Binary threshold: the output holds only 0 and 255.
pub fn threshold(img: &Mat, cutoff: u8, mode: ThresholdMode) -> opencv::Result<Mat> {
    let mut out = Mat::default();
    imgproc::threshold(img, &mut out, cutoff as f64, 255.0, mode.flag())?;
    Ok(out)
}

/// Dilates foreground with a 3x3 square element, `iterations` times.
pub fn dilate(img: &Mat, iterations: u32) -> opencv::Result<Mat> {
    let anchor = Point::new(-1, -1);
    let element = imgproc::get_structuring_element(imgproc::MORPH_RECT, Size::new(3, 3), anchor)?;
    let mut out = Mat::default();
    imgproc::dilate(
        img,
        &mut out,
        &element,
        anchor,
        iterations as i32,
        core::BORDER_CONSTANT,
        imgproc::morphology_default_border_value()?,
    )?;
    Ok(out)
}
