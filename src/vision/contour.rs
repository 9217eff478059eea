//! Outer contours of foreground regions in a binary mask.

use opencv::core::{Mat, Point, Vector};
use opencv::imgproc;

/// Axis-aligned box that always lies inside the frame it was computed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Clamps a raw rectangle to a `frame_width` x `frame_height` frame.
    pub fn clamped(x: i64, y: i64, width: i64, height: i64, frame_width: u32, frame_height: u32) -> Self {
        let fw = frame_width as i64;
        let fh = frame_height as i64;
        let x = x.clamp(0, fw);
        let y = y.clamp(0, fh);
        let width = width.clamp(0, fw - x);
        let height = height.clamp(0, fh - y);
        Self {
            x: x as u32,
            y: y as u32,
            width: width as u32,
            height: height as u32,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[cfg(test)]
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x as u64 + self.width as u64 <= frame_width as u64
            && self.y as u64 + self.height as u64 <= frame_height as u64
    }
}

/// Closed boundary of one foreground component.
#[derive(Debug)]
pub struct Contour {
    points: Vector<Point>,
}

impl Contour {
    /// Enclosed area of the boundary polygon.
    pub fn area(&self) -> opencv::Result<f64> {
        imgproc::contour_area(&self.points, false)
    }

    /// Smallest upright box containing every boundary point, clamped to the frame.
    pub fn bounding_box(&self, frame_width: u32, frame_height: u32) -> opencv::Result<BoundingBox> {
        let rect = imgproc::bounding_rect(&self.points)?;
        Ok(BoundingBox::clamped(
            rect.x as i64,
            rect.y as i64,
            rect.width as i64,
            rect.height as i64,
            frame_width,
            frame_height,
        ))
    }
}

/// Finds the outer contour of every foreground (non-zero) component.
pub fn find_external_contours(mask: &Mat) -> opencv::Result<Vec<Contour>> {
    let mut contours: Vector<Vector<Point>> = Vector::new();
    imgproc::find_contours(
        mask,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
        Point::new(0, 0),
    )?;
    Ok(contours.into_iter().map(|points| Contour { points }).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::ops::gray_to_mat;
    use image::{GrayImage, Luma};

    fn mask_with_rects(width: u32, height: u32, rects: &[(u32, u32, u32, u32)]) -> GrayImage {
        let mut mask = GrayImage::new(width, height);
        for &(x, y, w, h) in rects {
            for py in y..y + h {
                for px in x..x + w {
                    mask.put_pixel(px, py, Luma([255]));
                }
            }
        }
        mask
    }

    fn contours_of(mask: &GrayImage) -> Vec<Contour> {
        find_external_contours(&gray_to_mat(mask).unwrap()).unwrap()
    }

    #[test]
    fn test_rectangle_contour() {
        let contours = contours_of(&mask_with_rects(10, 10, &[(1, 1, 3, 3)]));

        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area().unwrap(), 4.0);
        assert_eq!(
            contours[0].bounding_box(10, 10).unwrap(),
            BoundingBox { x: 1, y: 1, width: 3, height: 3 }
        );
    }

    #[test]
    fn test_hole_is_enclosed_in_area() {
        // 20x20 ring, 2 pixels thick
        let mut mask = mask_with_rects(30, 30, &[(5, 5, 20, 20)]);
        for y in 7..23 {
            for x in 7..23 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        let contours = contours_of(&mask);

        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area().unwrap(), 19.0 * 19.0);
    }

    #[test]
    fn test_separate_components() {
        let mut contours = contours_of(&mask_with_rects(40, 20, &[(1, 1, 5, 5), (20, 10, 10, 6)]));
        contours.sort_by(|a, b| a.area().unwrap().total_cmp(&b.area().unwrap()));

        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].area().unwrap(), 16.0);
        assert_eq!(contours[1].area().unwrap(), 45.0);
        assert_eq!(
            contours[1].bounding_box(40, 20).unwrap(),
            BoundingBox { x: 20, y: 10, width: 10, height: 6 }
        );
    }

    #[test]
    fn test_diagonal_pixels_are_one_component() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(1, 1, Luma([255]));
        mask.put_pixel(2, 2, Luma([255]));
        mask.put_pixel(3, 3, Luma([255]));
        let contours = contours_of(&mask);

        assert_eq!(contours.len(), 1);
        assert_eq!(
            contours[0].bounding_box(5, 5).unwrap(),
            BoundingBox { x: 1, y: 1, width: 3, height: 3 }
        );
    }

    #[test]
    fn test_single_pixel_and_empty_mask() {
        let mut mask = GrayImage::new(5, 5);
        assert!(contours_of(&mask).is_empty());

        mask.put_pixel(2, 2, Luma([255]));
        let contours = contours_of(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area().unwrap(), 0.0);
    }

    #[test]
    fn test_component_on_frame_edge() {
        let contours = contours_of(&mask_with_rects(12, 12, &[(6, 0, 6, 12)]));

        assert_eq!(contours.len(), 1);
        let bbox = contours[0].bounding_box(12, 12).unwrap();
        assert_eq!(bbox, BoundingBox { x: 6, y: 0, width: 6, height: 12 });
        assert!(bbox.fits_within(12, 12));
    }

    #[test]
    fn test_clamped_box_stays_in_frame() {
        let b = BoundingBox::clamped(-5, 90, 50, 40, 100, 100);
        assert_eq!(b, BoundingBox { x: 0, y: 90, width: 50, height: 10 });
        assert!(b.fits_within(100, 100));

        let outside = BoundingBox::clamped(150, 10, 20, 20, 100, 100);
        assert!(outside.is_empty());
        assert!(outside.fits_within(100, 100));
    }
}
