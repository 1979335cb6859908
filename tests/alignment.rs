mod common;

use common::{config, marker_page, padded_marker_page, render_sheet, sheet_on_desk};
use image::{Rgb, RgbImage};
use rust_omr::align::deskew::estimate_skew;
use rust_omr::models::Point;
use rust_omr::utils::warp::{rotate_about_center, warp_perspective};
use rust_omr::{AlignMode, AlignStrategy, Aligner};

fn aligner() -> Aligner {
    Aligner::new(config().align)
}

#[test]
fn markers_define_the_canonical_frame() {
    let page = marker_page();
    for mode in [AlignMode::Aruco, AlignMode::AutoFallback] {
        let result = aligner().align(&page, mode);
        assert!(result.success);
        assert_eq!(result.strategy_used, AlignStrategy::Marker);
        assert_eq!(result.image.dimensions(), (1000, 1400));
        // Marker 0's border starts at the top-left corner of the output
        assert!(result.image.get_pixel(5, 5)[0] < 60);
        // The page between the markers is paper
        assert!(result.image.get_pixel(500, 700)[0] > 200);
    }
}

fn assert_marker_aligned(photo: &RgbImage, label: &str) {
    let result = aligner().align(photo, AlignMode::Aruco);
    assert!(result.success, "{label}: markers not found");
    assert_eq!(result.strategy_used, AlignStrategy::Marker, "{label}");
    assert_eq!(result.image.dimensions(), (1000, 1400), "{label}");
    assert!(result.image.get_pixel(500, 700)[0] > 200, "{label}");
}

#[test]
fn markers_survive_small_tilts() {
    let page = padded_marker_page();
    for angle in [0.5f32, 1.0, 1.5, 2.0, 3.5, 5.0] {
        for tilt in [angle, -angle] {
            let photo = rotate_about_center(&page, tilt);
            assert_marker_aligned(&photo, &format!("tilt {tilt}"));
        }
    }
}

#[test]
fn markers_survive_perspective() {
    let page = padded_marker_page();
    // Photographed from below and to the left: the top edge recedes
    let quad = [
        Point::new(150.0, 120.0),
        Point::new(1480.0, 220.0),
        Point::new(1420.0, 1900.0),
        Point::new(100.0, 1820.0),
    ];
    let photo = warp_perspective(&page, &quad, 1600, 2000).unwrap();
    assert_marker_aligned(&photo, "perspective");
}

#[test]
fn sheet_outline_is_used_when_markers_are_missing() {
    let photo = sheet_on_desk();

    let markers_only = aligner().align(&photo, AlignMode::Aruco);
    assert!(!markers_only.success);
    assert_eq!(markers_only.image, photo);

    for mode in [AlignMode::Auto, AlignMode::AutoFallback] {
        let result = aligner().align(&photo, mode);
        assert!(result.success);
        assert_eq!(result.strategy_used, AlignStrategy::ContourQuad);
        assert_eq!(result.image.dimensions(), (1000, 1400));
        assert!(result.image.get_pixel(500, 700)[0] > 200);
    }
}

#[test]
fn failed_alignment_returns_the_input_untouched() {
    let blank = RgbImage::from_pixel(320, 240, Rgb([255, 255, 255]));
    for mode in [AlignMode::Aruco, AlignMode::Auto, AlignMode::AutoFallback] {
        let result = aligner().align(&blank, mode);
        assert!(!result.success);
        assert_eq!(result.strategy_used, AlignStrategy::None);
        assert_eq!(result.image, blank);
    }
}

#[test]
fn deskew_levels_a_tilted_sheet() {
    let level = render_sheet(&[&[0], &[1], &[2], &[3], &[4]]);
    let tilted = rotate_about_center(&level, -4.0);
    let skew = estimate_skew(&tilted).unwrap();
    assert!((skew - 4.0).abs() < 1.0, "estimated skew {skew}");

    let result = aligner().align(&tilted, AlignMode::AutoFallback);
    assert!(result.success);
    assert_eq!(result.strategy_used, AlignStrategy::Deskew);
    assert_eq!(result.image.dimensions(), level.dimensions());
    let residual = estimate_skew(&result.image).unwrap();
    assert!(residual.abs() < 1.0, "residual skew {residual}");
}
