//! Annotation overlays for recognition output frames.
//!
//! Draws face boxes and a status strip directly on an `image::RgbImage`,
//! used by the watch loop when writing snapshot files.

use crate::types::BoundingBox;
use image::{Rgb, RgbImage};

/// Box color for a recognized face.
pub const MATCH_COLOR: Rgb<u8> = Rgb([40, 200, 90]);
/// Box color for an unrecognized face.
pub const UNKNOWN_COLOR: Rgb<u8> = Rgb([220, 60, 40]);

const BORDER_THICKNESS: u32 = 2;
const STATUS_STRIP_HEIGHT: u32 = 6;

/// Draw a face bounding box with a solid status strip above it.
///
/// Coordinates are clamped to the image bounds; a box partially or fully
/// outside the frame draws only its visible portion.
pub fn draw_face_box(img: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    let x0 = bbox.x.max(0.0) as u32;
    let y0 = bbox.y.max(0.0) as u32;
    let x1 = ((bbox.x + bbox.width).max(0.0) as u32).min(w - 1);
    let y1 = ((bbox.y + bbox.height).max(0.0) as u32).min(h - 1);

    if x0 >= w || y0 >= h || x1 <= x0 || y1 <= y0 {
        return;
    }

    // put_pixel panics out of bounds, so every write goes through a bounds check
    let mut put = |img: &mut RgbImage, x: u32, y: u32| {
        if x < w && y < h {
            img.put_pixel(x, y, color);
        }
    };

    // Border
    for t in 0..BORDER_THICKNESS {
        for x in x0..=x1 {
            put(img, x, y0 + t);
            put(img, x, y1.saturating_sub(t));
        }
        for y in y0..=y1 {
            put(img, x0 + t, y);
            put(img, x1.saturating_sub(t), y);
        }
    }

    // Solid strip above the box marking match status
    let strip_top = y0.saturating_sub(STATUS_STRIP_HEIGHT);
    for y in strip_top..y0 {
        for x in x0..=x1 {
            put(img, x, y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox {
            x, y, width: w, height: h, confidence: 0.9, landmarks: None,
        }
    }

    #[test]
    fn test_draw_inside_bounds() {
        let mut img = RgbImage::new(100, 100);
        draw_face_box(&mut img, &bbox(20.0, 20.0, 40.0, 40.0), MATCH_COLOR);

        // Top-left border pixel painted
        assert_eq!(*img.get_pixel(20, 20), MATCH_COLOR);
        // Box interior untouched
        assert_eq!(*img.get_pixel(40, 40), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_clamps_overflowing_box() {
        let mut img = RgbImage::new(64, 64);
        // Box extends well past the right and bottom edges
        draw_face_box(&mut img, &bbox(50.0, 50.0, 200.0, 200.0), UNKNOWN_COLOR);
        assert_eq!(*img.get_pixel(50, 50), UNKNOWN_COLOR);
        assert_eq!(*img.get_pixel(63, 63), UNKNOWN_COLOR);
    }

    #[test]
    fn test_draw_fully_outside_is_noop() {
        let mut img = RgbImage::new(32, 32);
        draw_face_box(&mut img, &bbox(100.0, 100.0, 10.0, 10.0), MATCH_COLOR);
        assert!(img.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_draw_negative_origin() {
        let mut img = RgbImage::new(32, 32);
        // Box starting off-screen top-left draws its visible part without panicking
        draw_face_box(&mut img, &bbox(-10.0, -10.0, 20.0, 20.0), MATCH_COLOR);
        assert_eq!(*img.get_pixel(0, 0), MATCH_COLOR);
    }

    #[test]
    fn test_status_strip_above_box() {
        let mut img = RgbImage::new(100, 100);
        draw_face_box(&mut img, &bbox(30.0, 30.0, 20.0, 20.0), MATCH_COLOR);
        // Strip occupies rows just above the box
        assert_eq!(*img.get_pixel(35, 27), MATCH_COLOR);
    }
}
