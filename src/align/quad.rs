use crate::align::AlignStrategy;
use crate::config::AlignConfig;
use crate::detector::contour::external_contours;
use crate::error::{OmrError, Result};
use crate::models::Point;
use crate::utils::geometry::{approximate_polygon, order_points};
use crate::utils::grayscale::to_gray_image;
use crate::utils::warp::warp_perspective;
use image::RgbImage;
use imageproc::distance_transform::Norm;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::dilate;
use tracing::debug;

/// Locate the sheet outline: the first of the largest edge contours whose
/// polygon approximation has four vertices, ordered TL, TR, BR, BL
pub fn find_sheet_quad(image: &RgbImage, config: &AlignConfig) -> Option<[Point; 4]> {
    let gray = to_gray_image(image);
    if gray.width() == 0 || gray.height() == 0 {
        return None;
    }
    let blurred = gaussian_blur_f32(&gray, config.blur_sigma);
    let mut edges = canny(&blurred, config.canny_low, config.canny_high);
    if config.edge_dilation > 0 {
        edges = dilate(&edges, Norm::LInf, config.edge_dilation);
    }

    let mut shapes: Vec<_> = external_contours(&edges)
        .into_iter()
        .map(|shape| (shape.area(), shape))
        .collect();
    shapes.sort_by(|a, b| b.0.total_cmp(&a.0));

    for (area, shape) in shapes.into_iter().take(config.max_quad_candidates) {
        let epsilon = config.approx_epsilon_ratio * shape.perimeter();
        let approx = approximate_polygon(&shape.points, epsilon);
        debug!(area, vertices = approx.len(), "sheet outline candidate");
        if approx.len() == 4 {
            return Some(order_points(&[approx[0], approx[1], approx[2], approx[3]]));
        }
    }
    None
}

/// Warp the detected sheet outline onto the canonical rectangle
pub fn align_with_quad(image: &RgbImage, config: &AlignConfig) -> Result<RgbImage> {
    let corners = find_sheet_quad(image, config).ok_or_else(|| {
        OmrError::alignment(
            AlignStrategy::ContourQuad,
            "no four-sided contour among the largest outlines",
        )
    })?;

    warp_perspective(
        image,
        &corners,
        config.canonical_width,
        config.canonical_height,
    )
    .ok_or_else(|| OmrError::alignment(AlignStrategy::ContourQuad, "sheet outline is degenerate"))
}
