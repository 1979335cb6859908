//! Utility functions for image processing
//!
//! This module provides the pixel-level building blocks of the grader:
//! - Grayscale conversion (RGB to luminance)
//! - Contrast equalization (CLAHE)
//! - Binarization (Otsu and adaptive Gaussian, full sheet pipeline)
//! - Geometry (perspective transforms, polygons, hulls, rotated rectangles)
//! - Warping (perspective warp, rotation about the centre)

/// Otsu, adaptive thresholding and the sheet binarization pipeline
pub mod binarization;
/// Local contrast equalization
pub mod contrast;
/// Perspective transforms, polygons and rotated rectangles
pub mod geometry;
/// RGB to luminance conversion
pub mod grayscale;
/// Image warping and rotation
pub mod warp;
