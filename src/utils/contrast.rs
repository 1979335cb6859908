//! Contrast-limited adaptive histogram equalization (CLAHE)
//!
//! The image is split into a `tiles x tiles` grid. Every tile gets its own
//! clipped-histogram lookup table and each pixel is mapped through a bilinear
//! blend of the four nearest tile tables, which removes the block seams of
//! plain tiled equalization.

use image::GrayImage;
use rayon::prelude::*;

struct TileGrid {
    cols: usize,
    rows: usize,
    tile_w: f32,
    tile_h: f32,
    luts: Vec<[u8; 256]>,
}

impl TileGrid {
    fn lut(&self, col: usize, row: usize) -> &[u8; 256] {
        &self.luts[row * self.cols + col]
    }
}

fn tile_bounds(index: usize, count: usize, len: usize) -> (usize, usize) {
    (index * len / count, (index + 1) * len / count)
}

fn build_lut(gray: &GrayImage, x0: usize, x1: usize, y0: usize, y1: usize, clip: f32) -> [u8; 256] {
    let mut histogram = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[gray.get_pixel(x as u32, y as u32)[0] as usize] += 1;
        }
    }

    let area = ((x1 - x0) * (y1 - y0)).max(1) as u32;
    let limit = ((clip * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for count in histogram.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    // Redistribute the clipped mass evenly, remainder spread with a stride.
    let bonus = excess / 256;
    let residual = (excess % 256) as usize;
    for count in histogram.iter_mut() {
        *count += bonus;
    }
    if residual > 0 {
        let step = (256 / residual).max(1);
        for i in (0..256).step_by(step).take(residual) {
            histogram[i] += 1;
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    for (value, count) in histogram.iter().enumerate() {
        cdf += count;
        lut[value] = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

fn build_grid(gray: &GrayImage, tiles: u32, clip_limit: f32) -> TileGrid {
    let (width, height) = (gray.width() as usize, gray.height() as usize);
    let cols = (tiles as usize).clamp(1, width.max(1));
    let rows = (tiles as usize).clamp(1, height.max(1));

    let luts = (0..rows * cols)
        .into_par_iter()
        .map(|i| {
            let (x0, x1) = tile_bounds(i % cols, cols, width);
            let (y0, y1) = tile_bounds(i / cols, rows, height);
            build_lut(gray, x0, x1, y0, y1, clip_limit)
        })
        .collect();

    TileGrid {
        cols,
        rows,
        tile_w: width as f32 / cols as f32,
        tile_h: height as f32 / rows as f32,
        luts,
    }
}

/// Neighbouring tile indices and the weight of the second one.
fn neighbours(pos: f32, tile: f32, count: usize) -> (usize, usize, f32) {
    let f = (pos + 0.5) / tile - 0.5;
    let lo = f.floor();
    let weight = f - lo;
    let last = count as isize - 1;
    let a = (lo as isize).clamp(0, last) as usize;
    let b = (lo as isize + 1).clamp(0, last) as usize;
    (a, b, weight)
}

/// Apply CLAHE with the given clip limit and tile grid size.
pub fn clahe(gray: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let grid = build_grid(gray, tiles, clip_limit);
    let mut out = GrayImage::new(width, height);

    out.par_chunks_mut(width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            let (ty0, ty1, wy) = neighbours(y as f32, grid.tile_h, grid.rows);
            for (x, px) in row.iter_mut().enumerate() {
                let (tx0, tx1, wx) = neighbours(x as f32, grid.tile_w, grid.cols);
                let v = gray.get_pixel(x as u32, y as u32)[0] as usize;

                let top = grid.lut(tx0, ty0)[v] as f32 * (1.0 - wx) + grid.lut(tx1, ty0)[v] as f32 * wx;
                let bottom =
                    grid.lut(tx0, ty1)[v] as f32 * (1.0 - wx) + grid.lut(tx1, ty1)[v] as f32 * wx;
                *px = (top * (1.0 - wy) + bottom * wy).round().clamp(0.0, 255.0) as u8;
            }
        });

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn uniform_white_stays_white() {
        let img = GrayImage::from_pixel(64, 48, Luma([255]));
        let out = clahe(&img, 2.0, 8);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn dark_ink_stays_darker_than_paper() {
        let mut img = GrayImage::from_pixel(80, 80, Luma([230]));
        for y in 30..50 {
            for x in 30..50 {
                img.put_pixel(x, y, Luma([20]));
            }
        }
        let out = clahe(&img, 2.0, 8);
        assert!(out.get_pixel(40, 40)[0] < out.get_pixel(5, 5)[0]);
        assert!(out.get_pixel(40, 40)[0] < 128);
    }

    #[test]
    fn preserves_dimensions_for_tiny_images() {
        let img = GrayImage::from_pixel(3, 2, Luma([100]));
        assert_eq!(clahe(&img, 2.0, 8).dimensions(), (3, 2));
    }
}
