use crate::error::{OmrError, Result};
use crate::models::BitMatrix;
use image::{DynamicImage, GenericImageView, RgbImage};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions picked up when grading a directory
pub const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

fn max_dim_from_env() -> Option<u32> {
    match env::var("OMR_MAX_DIM") {
        Ok(value) => match value.trim().parse::<u32>() {
            Ok(0) => None,
            Ok(v) => Some(v),
            Err(_) => None,
        },
        Err(_) => None,
    }
}

fn to_rgb_limited(img: DynamicImage) -> RgbImage {
    if let Some(max_dim) = max_dim_from_env() {
        let (orig_w, orig_h) = img.dimensions();
        if orig_w.max(orig_h) > max_dim {
            return img
                .resize(max_dim, max_dim, image::imageops::FilterType::Triangle)
                .to_rgb8();
        }
    }
    img.to_rgb8()
}

/// Load an image file as RGB.
///
/// Photos larger than `OMR_MAX_DIM` pixels on their long side are
/// downscaled first.
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let path = path.as_ref();
    let img = image::open(path).map_err(|source| OmrError::ImageDecode {
        path: path.display().to_string(),
        source,
    })?;
    Ok(to_rgb_limited(img))
}

/// Decode an in-memory encoded image as RGB
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage> {
    let img = image::load_from_memory(bytes).map_err(|source| OmrError::ImageDecode {
        path: "<memory>".to_string(),
        source,
    })?;
    Ok(to_rgb_limited(img))
}

/// Sheet name derived from a file path (its stem)
pub fn sheet_name<P: AsRef<Path>>(path: P) -> String {
    path.as_ref()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.as_ref().display().to_string())
}

/// Sheet names for files found below `root`: the relative path without its
/// extension, using `/` between directories. Files that would still share a
/// name (`x.png` next to `x.jpg`) keep their extension.
pub fn sheet_names<P: AsRef<Path>>(root: P, paths: &[PathBuf]) -> Vec<String> {
    let relative = |path: &PathBuf, keep_extension: bool| {
        let rel = path.strip_prefix(root.as_ref()).unwrap_or(path);
        let rel = if keep_extension {
            rel.to_path_buf()
        } else {
            rel.with_extension("")
        };
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    };

    let stems: Vec<String> = paths.iter().map(|p| relative(p, false)).collect();
    stems
        .iter()
        .zip(paths)
        .map(|(stem, path)| {
            if stems.iter().filter(|other| *other == stem).count() > 1 {
                relative(path, true)
            } else {
                stem.clone()
            }
        })
        .collect()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// All image files below `root`, sorted by path
pub fn collect_images<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let mut stack = vec![root.as_ref().to_path_buf()];
    let mut images = Vec::new();

    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)?.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if is_image(&path) {
                images.push(path);
            }
        }
    }

    images.sort();
    Ok(images)
}

/// Summary statistics for a binary matrix.
#[derive(Debug, Clone, Copy)]
pub struct BinaryStats {
    /// Count of ink pixels.
    pub ink_pixels: usize,
    /// Total pixels in the matrix.
    pub total_pixels: usize,
    /// Ratio of ink pixels to total pixels.
    pub ink_ratio: f64,
}

/// Compute ink pixel stats for a binarization map.
pub fn binary_stats(binary: &BitMatrix) -> BinaryStats {
    let ink = binary.count_ones();
    let total = binary.width() * binary.height();
    let ratio = if total == 0 {
        0.0
    } else {
        ink as f64 / total as f64
    };
    BinaryStats {
        ink_pixels: ink,
        total_pixels: total,
        ink_ratio: ratio,
    }
}
