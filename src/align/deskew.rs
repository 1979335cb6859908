use crate::align::AlignStrategy;
use crate::error::{OmrError, Result};
use crate::models::Point;
use crate::utils::binarization::otsu_binarize;
use crate::utils::geometry::{min_area_rect, normalize_quarter_turn};
use crate::utils::grayscale::to_gray_image;
use crate::utils::warp::rotate_about_center;
use image::RgbImage;
use tracing::debug;

/// Row extremes of the dark (Otsu foreground) pixels.
///
/// The leftmost and rightmost dark pixel of every row span the same convex
/// hull as the full pixel set.
fn foreground_extremes(image: &RgbImage) -> Vec<Point> {
    let gray = to_gray_image(image);
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    let binary = otsu_binarize(&gray, width, height);

    let mut points = Vec::new();
    for y in 0..height {
        let first = (0..width).find(|&x| binary.get(x, y));
        let Some(left) = first else {
            continue;
        };
        let right = (left..width).rev().find(|&x| binary.get(x, y)).unwrap_or(left);
        points.push(Point::new(left as f32, y as f32));
        if right != left {
            points.push(Point::new(right as f32, y as f32));
        }
    }
    points
}

/// Tilt of the printed content in degrees, in `(-45, 45]`.
///
/// Positive values mean the content is turned clockwise on screen.
pub fn estimate_skew(image: &RgbImage) -> Option<f32> {
    let points = foreground_extremes(image);
    let rect = min_area_rect(&points)?;
    Some(normalize_quarter_turn(rect.angle))
}

/// Rotate the sheet so its content is level. Returns the rotated image and
/// the tilt that was removed. Dimensions are preserved.
pub fn deskew(image: &RgbImage) -> Result<(RgbImage, f32)> {
    let angle = estimate_skew(image).ok_or_else(|| {
        OmrError::alignment(AlignStrategy::Deskew, "no foreground pixels to measure")
    })?;
    debug!(angle, "estimated skew");
    Ok((rotate_about_center(image, angle), angle))
}
