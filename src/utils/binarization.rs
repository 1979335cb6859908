use crate::config::BinarizeConfig;
use crate::models::BitMatrix;
use crate::utils::contrast::clahe;
use crate::utils::grayscale::to_gray_image;
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::open;

/// Convert grayscale image to binary using Otsu's thresholding method
/// Returns a BitMatrix where true = black, false = white
pub fn otsu_binarize(gray: &[u8], width: usize, height: usize) -> BitMatrix {
    let threshold = calculate_otsu_threshold(gray);
    let mut binary = BitMatrix::new(width, height);

    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            let is_black = gray[idx] < threshold;
            binary.set(x, y, is_black);
        }
    }

    binary
}

/// Calculate Otsu's optimal threshold
pub(crate) fn calculate_otsu_threshold(gray: &[u8]) -> u8 {
    // Build histogram
    let mut histogram = [0u32; 256];
    for &pixel in gray {
        histogram[pixel as usize] += 1;
    }

    let total_pixels = gray.len() as f64;
    let mut max_variance = 0.0;
    let mut optimal_threshold = 128u8;

    for threshold in 0..=255u32 {
        let mut class1_pixels = 0u64;
        let mut class1_sum = 0u64;
        let mut class2_pixels = 0u64;
        let mut class2_sum = 0u64;

        for intensity in 0..=255u32 {
            let count = histogram[intensity as usize] as u64;
            if intensity < threshold {
                class1_pixels += count;
                class1_sum += count * intensity as u64;
            } else {
                class2_pixels += count;
                class2_sum += count * intensity as u64;
            }
        }

        if class1_pixels == 0 || class2_pixels == 0 {
            continue;
        }

        let class1_mean = class1_sum as f64 / class1_pixels as f64;
        let class2_mean = class2_sum as f64 / class2_pixels as f64;

        let weight1 = class1_pixels as f64 / total_pixels;
        let weight2 = class2_pixels as f64 / total_pixels;

        let variance = weight1 * weight2 * (class1_mean - class2_mean).powi(2);

        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = threshold as u8;
        }
    }

    optimal_threshold
}

/// Gaussian sigma matching a square smoothing window of `block_size` pixels
fn sigma_for_block(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Inverted adaptive threshold against a Gaussian-weighted local mean.
///
/// A pixel is foreground (255) when it is at least `c` below the weighted
/// mean of its `block_size` neighbourhood, so ink on paper comes out white.
pub fn adaptive_gaussian_binarize(gray: &GrayImage, block_size: u32, c: i32) -> GrayImage {
    let mean = gaussian_blur_f32(gray, sigma_for_block(block_size));
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let src = gray.get_pixel(x, y)[0] as i32;
        let threshold = mean.get_pixel(x, y)[0] as i32 - c;
        if src <= threshold { Luma([255]) } else { Luma([0]) }
    })
}

/// Full sheet binarization as a mask image (255 = ink).
///
/// grayscale, CLAHE, light blur, inverted adaptive threshold, then an
/// opening that removes speckles thinner than the opening radius.
pub fn sheet_mask(image: &RgbImage, config: &BinarizeConfig) -> GrayImage {
    let gray = to_gray_image(image);
    if gray.width() == 0 || gray.height() == 0 {
        return gray;
    }

    let equalized = clahe(&gray, config.clahe_clip_limit, config.clahe_tiles);
    let smoothed = gaussian_blur_f32(&equalized, config.blur_sigma);
    let mask = adaptive_gaussian_binarize(&smoothed, config.block_size, config.c);

    if config.open_radius > 0 {
        open(&mask, Norm::LInf, config.open_radius)
    } else {
        mask
    }
}

/// Full sheet binarization as a [`BitMatrix`] (`true` = ink)
pub fn sheet_binarize(image: &RgbImage, config: &BinarizeConfig) -> BitMatrix {
    BitMatrix::from_mask(&sheet_mask(image, config))
}
