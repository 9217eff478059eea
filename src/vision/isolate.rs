//! Card isolation: crop the captured frame down to the card.

use image::RgbImage;

use super::contour::{find_external_contours, BoundingBox, Contour};
use super::ops::{rgb_to_mat, threshold, to_gray, ThresholdMode};
use crate::capture::Frame;
use crate::config::{IsolatorConfig, Polarity};

#[derive(Debug, thiserror::Error)]
pub enum IsolateError {
    #[error("no card found: thresholded frame has no contours")]
    NoCardFound,
    #[error("card isolation failed: {0}")]
    Vision(#[from] opencv::Error),
}

/// The card region cut out of a captured frame.
#[derive(Debug, Clone)]
pub struct CroppedCard {
    pub image: RgbImage,
    pub bbox: BoundingBox,
}

pub struct CardIsolator {
    config: IsolatorConfig,
}

impl CardIsolator {
    pub fn new(config: IsolatorConfig) -> Self {
        Self { config }
    }

    /// Bounding box of the largest contour, clamped to the image.
    pub fn locate(&self, image: &RgbImage) -> Result<BoundingBox, IsolateError> {
        let mode = match self.config.polarity {
            Polarity::LightBackground => ThresholdMode::BinaryInverted,
            Polarity::DarkBackground => ThresholdMode::Binary,
        };
        let gray = to_gray(&rgb_to_mat(image)?)?;
        let mask = threshold(&gray, self.config.threshold, mode)?;

        let mut largest: Option<(f64, Contour)> = None;
        for contour in find_external_contours(&mask)? {
            let area = contour.area()?;
            if largest.as_ref().is_none_or(|(best, _)| area > *best) {
                largest = Some((area, contour));
            }
        }
        let (_, card) = largest.ok_or(IsolateError::NoCardFound)?;

        Ok(card.bounding_box(image.width(), image.height())?)
    }

    pub fn isolate(&self, frame: &Frame) -> Result<CroppedCard, IsolateError> {
        let bbox = self.locate(&frame.image)?;
        let image =
            image::imageops::crop_imm(&frame.image, bbox.x, bbox.y, bbox.width, bbox.height).to_image();
        Ok(CroppedCard { image, bbox })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn white_frame_with_card(w: u32, h: u32, card: (u32, u32, u32, u32)) -> Frame {
        let mut img = RgbImage::from_pixel(w, h, Rgb([255, 255, 255]));
        let (x, y, cw, ch) = card;
        for py in y..y + ch {
            for px in x..x + cw {
                img.put_pixel(px, py, Rgb([180, 150, 60]));
            }
        }
        Frame::new(img)
    }

    #[test]
    fn test_crops_card_on_light_background() {
        let isolator = CardIsolator::new(IsolatorConfig::default());
        let frame = white_frame_with_card(200, 300, (40, 60, 63, 88));

        let cropped = isolator.isolate(&frame).unwrap();
        assert_eq!(cropped.bbox, BoundingBox { x: 40, y: 60, width: 63, height: 88 });
        assert_eq!(cropped.image.dimensions(), (63, 88));
        assert_eq!(cropped.image.get_pixel(0, 0), &Rgb([180, 150, 60]));
    }

    #[test]
    fn test_largest_contour_wins() {
        let isolator = CardIsolator::new(IsolatorConfig::default());
        let mut frame = white_frame_with_card(200, 200, (100, 100, 80, 90));
        for py in 5..15 {
            for px in 5..15 {
                frame.image.put_pixel(px, py, Rgb([0, 0, 0]));
            }
        }

        let bbox = isolator.locate(&frame.image).unwrap();
        assert_eq!(bbox, BoundingBox { x: 100, y: 100, width: 80, height: 90 });
    }

    #[test]
    fn test_card_touching_edge_is_clamped() {
        let isolator = CardIsolator::new(IsolatorConfig::default());
        let frame = white_frame_with_card(120, 120, (50, 30, 70, 90));

        let bbox = isolator.locate(&frame.image).unwrap();
        assert!(bbox.fits_within(120, 120));
        assert_eq!(bbox, BoundingBox { x: 50, y: 30, width: 70, height: 90 });
    }

    #[test]
    fn test_blank_frame_is_no_card() {
        let isolator = CardIsolator::new(IsolatorConfig::default());
        let frame = Frame::new(RgbImage::from_pixel(50, 50, Rgb([255, 255, 255])));
        assert!(matches!(isolator.isolate(&frame), Err(IsolateError::NoCardFound)));
    }

    #[test]
    fn test_dark_background_polarity() {
        let isolator = CardIsolator::new(IsolatorConfig {
            threshold: 100,
            polarity: Polarity::DarkBackground,
        });
        let mut img = RgbImage::from_pixel(100, 100, Rgb([10, 10, 10]));
        for py in 20..70 {
            for px in 30..60 {
                img.put_pixel(px, py, Rgb([240, 240, 240]));
            }
        }

        let bbox = isolator.locate(&img).unwrap();
        assert_eq!(bbox, BoundingBox { x: 30, y: 20, width: 30, height: 50 });
    }
}
