//! Shape detection on binarized sheets
//!
//! - Contour extraction and shape measurements
//! - Bubble candidates (filled or ring-shaped circles)
//! - Square fiducial markers with a 4x4 bit payload

/// Bubble candidates filtered by size and circularity
pub mod bubble;
/// Outer contours of a binary mask
pub mod contour;
/// Fiducial marker dictionary and detection
pub mod marker;
