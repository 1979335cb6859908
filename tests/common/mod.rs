#![allow(dead_code)]

use image::{Luma, Rgb, RgbImage, imageops};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;
use rust_omr::OmrConfig;
use rust_omr::detector::marker::render_marker;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const OPTIONS: usize = 5;
pub const BUBBLE_RADIUS: i32 = 30;
pub const RING_WIDTH: i32 = 3;

const PAPER: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0, 0, 0]);

static TEMP_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Centre of option `option` of question `question` (both 0-based)
pub fn bubble_center(question: usize, option: usize) -> (i32, i32) {
    (140 + 80 * option as i32, 100 + 100 * question as i32)
}

/// Render a level answer sheet: one row of five ring bubbles per question,
/// with the listed options of each question filled in.
pub fn render_sheet(marks: &[&[usize]]) -> RgbImage {
    let height = 100 * marks.len() as u32 + 100;
    let mut img = RgbImage::from_pixel(600, height, PAPER);
    for (question, filled) in marks.iter().enumerate() {
        for option in 0..OPTIONS {
            let center = bubble_center(question, option);
            draw_filled_circle_mut(&mut img, center, BUBBLE_RADIUS, INK);
            if !filled.contains(&option) {
                draw_filled_circle_mut(&mut img, center, BUBBLE_RADIUS - RING_WIDTH, PAPER);
            }
        }
    }
    img
}

/// Settings for synthetic sheets. Marks are solid discs, so the local mean
/// window is widened to keep their centres inked.
pub fn config() -> OmrConfig {
    let mut config = OmrConfig::default();
    config.layout.binarize.block_size = 75;
    config
}

/// A white sheet photographed on a dark desk, slightly rotated
pub fn sheet_on_desk() -> RgbImage {
    let mut img = RgbImage::from_pixel(500, 640, Rgb([40, 40, 40]));
    let sheet = [
        PixelPoint::new(70, 50),
        PixelPoint::new(440, 80),
        PixelPoint::new(420, 600),
        PixelPoint::new(50, 570),
    ];
    draw_polygon_mut(&mut img, &sheet, Rgb([250, 250, 250]));
    img
}

/// Marker cell size in pixels; markers are six cells wide
pub const MARKER_CELL: u32 = 14;

/// A white 1200x1600 page with markers 0..3 at the TL, TR, BR, BL corners,
/// each 50 px from the page edges
pub fn marker_page() -> RgbImage {
    let side = 6 * MARKER_CELL as i64;
    let (w, h) = (1200i64, 1600i64);
    let origins = [
        (50, 50),
        (w - 50 - side, 50),
        (w - 50 - side, h - 50 - side),
        (50, h - 50 - side),
    ];
    let mut gray = image::GrayImage::from_pixel(w as u32, h as u32, Luma([255]));
    for (id, (x, y)) in origins.into_iter().enumerate() {
        if let Some(marker) = render_marker(id, MARKER_CELL) {
            imageops::overlay(&mut gray, &marker, x, y);
        }
    }
    RgbImage::from_fn(w as u32, h as u32, |x, y| {
        let v = gray.get_pixel(x, y)[0];
        Rgb([v, v, v])
    })
}

/// The marker page centred on a 1600x2000 white canvas, leaving room to tilt
/// or warp it without pushing a marker out of frame
pub fn padded_marker_page() -> RgbImage {
    let mut canvas = RgbImage::from_pixel(1600, 2000, PAPER);
    imageops::overlay(&mut canvas, &marker_page(), 200, 200);
    canvas
}

pub fn temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX epoch")
        .as_nanos();
    let sequence = TEMP_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let path = std::env::temp_dir().join(format!("rust_omr_{tag}_{nanos}_{sequence}"));
    std::fs::create_dir_all(&path).expect("failed to create temp dir");
    path
}
