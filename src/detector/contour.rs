use crate::models::{BoundingBox, Point};
use crate::utils::geometry::{arc_length, polygon_area};
use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};

/// Outer border of one connected foreground region
#[derive(Debug, Clone)]
pub struct Shape {
    /// Border pixels in tracing order
    pub points: Vec<Point>,
    /// Whether the region sits inside another region's hole
    pub nested: bool,
}

impl Shape {
    /// Polygon area enclosed by the border
    pub fn area(&self) -> f32 {
        polygon_area(&self.points)
    }

    /// Closed border length
    pub fn perimeter(&self) -> f32 {
        arc_length(&self.points)
    }

    /// Tight integer bounding box (inclusive pixel extent)
    pub fn bounding_box(&self) -> BoundingBox {
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if self.points.is_empty() {
            return BoundingBox::new(0, 0, 0, 0);
        }
        BoundingBox::new(
            min_x as i32,
            min_y as i32,
            (max_x - min_x) as i32 + 1,
            (max_y - min_y) as i32 + 1,
        )
    }
}

/// Outer borders of every foreground region (non-zero pixels), including
/// regions nested inside holes of other regions
pub fn outer_contours(mask: &GrayImage) -> Vec<Shape> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer))
        .map(|c| Shape {
            nested: c.parent.is_some(),
            points: c.points.into_iter().map(Point::from).collect(),
        })
        .collect()
}

/// Outer borders of the top-level regions only
pub fn external_contours(mask: &GrayImage) -> Vec<Shape> {
    outer_contours(mask)
        .into_iter()
        .filter(|s| !s.nested)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    fn framed() -> GrayImage {
        // A square frame with a solid block inside its hole
        let mut mask = GrayImage::new(100, 100);
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(80, 80), Luma([255]));
        draw_filled_rect_mut(&mut mask, Rect::at(20, 20).of_size(60, 60), Luma([0]));
        draw_filled_rect_mut(&mut mask, Rect::at(40, 40).of_size(20, 20), Luma([255]));
        mask
    }

    #[test]
    fn external_skips_nested_regions() {
        let mask = framed();
        assert_eq!(outer_contours(&mask).len(), 2);

        let external = external_contours(&mask);
        assert_eq!(external.len(), 1);
        assert_eq!(external[0].bounding_box(), BoundingBox::new(10, 10, 80, 80));
    }

    #[test]
    fn shape_measures() {
        let mask = framed();
        let inner = outer_contours(&mask)
            .into_iter()
            .find(|s| s.nested)
            .unwrap();
        // Border through pixel centres of a 20x20 block
        assert!((inner.area() - 361.0).abs() < 1.0);
        assert!((inner.perimeter() - 76.0).abs() < 1.0);
    }
}
