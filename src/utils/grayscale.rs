//! RGB to luminance conversion
//!
//! Y = 0.299*R + 0.587*G + 0.114*B, computed in fixed point as
//! Y = (77*R + 150*G + 29*B + 128) >> 8. The weights sum to 256, so pure
//! white maps to 255 and pure black to 0.

use image::{GrayImage, RgbImage};
use rayon::prelude::*;

const COEF_R: u32 = 77;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32 + 128) >> 8).min(255) as u8
}

/// Convert raw RGB bytes into a pre-allocated luminance buffer.
///
/// Rows are converted in parallel. Returns the number of pixels written,
/// which is 0 when either buffer is too small.
pub fn rgb_to_grayscale_with_buffer(
    rgb: &[u8],
    width: usize,
    height: usize,
    output: &mut [u8],
) -> usize {
    let pixel_count = width * height;
    if width == 0 || rgb.len() < pixel_count * 3 || output.len() < pixel_count {
        return 0;
    }

    output[..pixel_count]
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let row_start = y * width * 3;
            for (x, out) in row.iter_mut().enumerate() {
                let idx = row_start + x * 3;
                *out = luma(rgb[idx], rgb[idx + 1], rgb[idx + 2]);
            }
        });

    pixel_count
}

/// Convert an RGB image into a grayscale image
pub fn to_gray_image(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut gray = GrayImage::new(width, height);
    rgb_to_grayscale_with_buffer(
        image.as_raw(),
        width as usize,
        height as usize,
        &mut gray,
    );
    gray
}
