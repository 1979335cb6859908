use crate::config::LayoutConfig;
use crate::detector::contour::external_contours;
use crate::models::{BoundingBox, Point};
use image::GrayImage;
use std::f32::consts::PI;
use tracing::debug;

/// Bubble-shaped region found on the binarized key sheet
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleCandidate {
    /// Centre of the bounding box
    pub center: Point,
    /// Bounding box in canonical coordinates
    pub bbox: BoundingBox,
    /// Contour area
    pub area: f32,
    /// Isoperimetric ratio `4*pi*area/perimeter^2` (1 for a perfect disc)
    pub circularity: f32,
}

/// Isoperimetric circularity, 0 for a degenerate perimeter
pub fn circularity(area: f32, perimeter: f32) -> f32 {
    if perimeter <= 0.0 {
        return 0.0;
    }
    4.0 * PI * area / (perimeter * perimeter)
}

/// Find bubble candidates among the top-level regions of `mask`.
///
/// Returns candidates sorted by `(cy, cx)`.
pub fn detect_bubbles(mask: &GrayImage, config: &LayoutConfig) -> Vec<BubbleCandidate> {
    let shapes = external_contours(mask);
    let total = shapes.len();

    let mut candidates: Vec<BubbleCandidate> = shapes
        .into_iter()
        .filter_map(|shape| {
            let area = shape.area();
            if area < config.min_area || area > config.max_area {
                return None;
            }
            let circ = circularity(area, shape.perimeter());
            if circ < config.min_circularity {
                return None;
            }
            let bbox = shape.bounding_box();
            let (cx, cy) = bbox.center();
            Some(BubbleCandidate {
                center: Point::new(cx, cy),
                bbox,
                area,
                circularity: circ,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.center
            .y
            .total_cmp(&b.center.y)
            .then(a.center.x.total_cmp(&b.center.x))
    });

    debug!(
        contours = total,
        bubbles = candidates.len(),
        "bubble candidates filtered"
    );
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    #[test]
    fn test_circularity() {
        let r = 10.0f32;
        assert!((circularity(PI * r * r, 2.0 * PI * r) - 1.0).abs() < 1e-5);
        assert_eq!(circularity(10.0, 0.0), 0.0);
    }

    #[test]
    fn keeps_discs_and_rejects_bars() {
        let mut mask = GrayImage::new(300, 200);
        draw_filled_circle_mut(&mut mask, (200, 50), 18, Luma([255]));
        draw_filled_circle_mut(&mut mask, (60, 52), 18, Luma([255]));
        // Long thin bar: right area, poor circularity
        draw_filled_rect_mut(&mut mask, Rect::at(20, 140).of_size(200, 6), Luma([255]));
        // Speck below min area
        draw_filled_rect_mut(&mut mask, Rect::at(280, 180).of_size(3, 3), Luma([255]));

        let bubbles = detect_bubbles(&mask, &LayoutConfig::default());
        assert_eq!(bubbles.len(), 2);
        // Sorted by y first: (200, 50) comes before (60, 52)
        assert!((bubbles[0].center.x - 200.5).abs() < 1.0);
        assert!((bubbles[1].center.x - 60.5).abs() < 1.0);
        assert_eq!(bubbles[0].bbox.width, 37);
        assert!(bubbles.iter().all(|b| b.circularity >= 0.65));
    }
}
