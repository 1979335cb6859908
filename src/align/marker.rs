use crate::align::AlignStrategy;
use crate::config::AlignConfig;
use crate::detector::marker::{DetectedMarker, MarkerDictionary, detect_markers};
use crate::error::{OmrError, Result};
use crate::models::Point;
use crate::utils::warp::warp_perspective;
use image::RgbImage;

/// Marker ids at the sheet's TL, TR, BR and BL corners
pub const CORNER_IDS: [usize; 4] = [0, 1, 2, 3];

/// Reference points (each marker's own top-left corner) for the corner ids
fn reference_points(markers: &[DetectedMarker]) -> Result<[Point; 4]> {
    let mut points = [Point::default(); 4];
    for (slot, id) in CORNER_IDS.iter().enumerate() {
        let marker = markers.iter().find(|m| m.id == *id).ok_or_else(|| {
            OmrError::alignment(
                AlignStrategy::Marker,
                format!(
                    "fewer than four markers detected ({} found, id {} missing)",
                    markers.len(),
                    id
                ),
            )
        })?;
        points[slot] = marker.corners[0];
    }
    Ok(points)
}

/// Warp the sheet so the four marker reference points land on the
/// corners of the canonical rectangle
pub fn align_with_markers(image: &RgbImage, config: &AlignConfig) -> Result<RgbImage> {
    let markers = detect_markers(image, &MarkerDictionary::default(), config);
    let corners = reference_points(&markers)?;

    warp_perspective(
        image,
        &corners,
        config.canonical_width,
        config.canonical_height,
    )
    .ok_or_else(|| OmrError::alignment(AlignStrategy::Marker, "marker corners are degenerate"))
}
