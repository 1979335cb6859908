//! Image resampling: perspective warps and rotations
//!
//! Both operations use inverse mapping: every output pixel is projected back
//! into the source image and sampled there. Rows are filled in parallel.

use crate::models::Point;
use crate::utils::geometry::PerspectiveTransform;
use image::RgbImage;
use rayon::prelude::*;

fn pixel(image: &RgbImage, x: i64, y: i64) -> [f32; 3] {
    let p = image.get_pixel(x as u32, y as u32);
    [p[0] as f32, p[1] as f32, p[2] as f32]
}

/// Bilinear sample, pixels outside the image read as black
fn sample_bilinear(image: &RgbImage, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let fetch = |px: i64, py: i64| -> [f32; 3] {
        if px < 0 || py < 0 || px >= w || py >= h {
            [0.0; 3]
        } else {
            pixel(image, px, py)
        }
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Cubic convolution weight (Keys kernel, a = -0.75)
fn cubic_weight(t: f32) -> f32 {
    const A: f32 = -0.75;
    let t = t.abs();
    if t <= 1.0 {
        ((A + 2.0) * t - (A + 3.0)) * t * t + 1.0
    } else if t < 2.0 {
        ((A * t - 5.0 * A) * t + 8.0 * A) * t - 4.0 * A
    } else {
        0.0
    }
}

/// Bicubic sample with edge-replicated borders
fn sample_bicubic(image: &RgbImage, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let wx: [f32; 4] = std::array::from_fn(|i| cubic_weight(fx - (i as f32 - 1.0)));
    let wy: [f32; 4] = std::array::from_fn(|j| cubic_weight(fy - (j as f32 - 1.0)));

    let mut acc = [0.0f32; 3];
    for (j, wyj) in wy.iter().enumerate() {
        let py = (y0 + j as i64 - 1).clamp(0, h - 1);
        for (i, wxi) in wx.iter().enumerate() {
            let px = (x0 + i as i64 - 1).clamp(0, w - 1);
            let p = pixel(image, px, py);
            let weight = wxi * wyj;
            for c in 0..3 {
                acc[c] += p[c] * weight;
            }
        }
    }
    acc.map(|v| v.round().clamp(0.0, 255.0) as u8)
}

/// Warp the quadrilateral `corners` (TL, TR, BR, BL) of `image` onto a
/// `width x height` rectangle. Returns `None` for a degenerate quad.
pub fn warp_perspective(
    image: &RgbImage,
    corners: &[Point; 4],
    width: u32,
    height: u32,
) -> Option<RgbImage> {
    if width == 0 || height == 0 || image.width() == 0 || image.height() == 0 {
        return None;
    }

    let (w, h) = ((width - 1) as f32, (height - 1) as f32);
    let target = [
        Point::new(0.0, 0.0),
        Point::new(w, 0.0),
        Point::new(w, h),
        Point::new(0.0, h),
    ];
    // Maps output coordinates back into the source photo.
    let inverse = PerspectiveTransform::from_points(&target, corners)?;

    let mut out = RgbImage::new(width, height);
    out.par_chunks_mut(width as usize * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let rgb = match inverse.transform_xy(x as f64, y as f64) {
                    Some((sx, sy)) => sample_bilinear(image, sx, sy),
                    None => [0; 3],
                };
                px.copy_from_slice(&rgb);
            }
        });

    Some(out)
}

/// Rotate `image` counter-clockwise (as displayed) by `angle` degrees about
/// its centre. Dimensions are preserved, borders replicate the edge pixels.
pub fn rotate_about_center(image: &RgbImage, angle: f32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let (sin, cos) = (angle as f64).to_radians().sin_cos();
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);

    let mut out = RgbImage::new(width, height);
    out.par_chunks_mut(width as usize * 3)
        .enumerate()
        .for_each(|(y, row)| {
            let dy = y as f64 - cy;
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let dx = x as f64 - cx;
                let sx = cx + dx * cos - dy * sin;
                let sy = cy + dx * sin + dy * cos;
                px.copy_from_slice(&sample_bicubic(image, sx, sy));
            }
        });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    #[test]
    fn identity_warp_keeps_pixels() {
        let mut img = RgbImage::from_pixel(40, 30, Rgb([200, 200, 200]));
        draw_filled_rect_mut(&mut img, Rect::at(10, 5).of_size(6, 6), Rgb([10, 20, 30]));
        let corners = [
            Point::new(0.0, 0.0),
            Point::new(39.0, 0.0),
            Point::new(39.0, 29.0),
            Point::new(0.0, 29.0),
        ];
        let out = warp_perspective(&img, &corners, 40, 30).unwrap();
        assert_eq!(out.get_pixel(12, 7), &Rgb([10, 20, 30]));
        assert_eq!(out.get_pixel(30, 20), &Rgb([200, 200, 200]));
    }

    #[test]
    fn warp_outputs_requested_size() {
        let img = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
        let corners = [
            Point::new(5.0, 3.0),
            Point::new(60.0, 8.0),
            Point::new(58.0, 61.0),
            Point::new(2.0, 55.0),
        ];
        let out = warp_perspective(&img, &corners, 100, 140).unwrap();
        assert_eq!(out.dimensions(), (100, 140));
    }

    #[test]
    fn degenerate_quad_is_rejected() {
        let img = RgbImage::new(10, 10);
        let corners = [Point::new(3.0, 3.0); 4];
        assert!(warp_perspective(&img, &corners, 10, 10).is_none());
    }

    #[test]
    fn zero_rotation_is_identity() {
        let img = RgbImage::from_fn(21, 17, |x, y| Rgb([(x * 10) as u8, (y * 12) as u8, 7]));
        assert_eq!(rotate_about_center(&img, 0.0), img);
    }

    #[test]
    fn quarter_turn_moves_corner_content() {
        let mut img = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        // Dark block right of centre
        draw_filled_rect_mut(&mut img, Rect::at(28, 18).of_size(6, 4), Rgb([0, 0, 0]));
        let out = rotate_about_center(&img, 90.0);
        assert_eq!(out.dimensions(), (40, 40));
        // Counter-clockwise on screen: right of centre moves above centre.
        assert!(out.get_pixel(20, 10)[0] < 60);
        assert!(out.get_pixel(30, 20)[0] > 200);
    }

    #[test]
    fn cubic_weights_partition_unity() {
        for f in [0.0f32, 0.25, 0.5, 0.9] {
            let sum: f32 = (0..4).map(|i| cubic_weight(f - (i as f32 - 1.0))).sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }
}
