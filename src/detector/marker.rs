//! Square fiducial markers with a 4x4 bit payload
//!
//! A marker is a 6x6 grid of square cells: the outer ring of cells is black
//! and the inner 4x4 cells carry the code (white = 1), read row by row from
//! the marker's own top-left corner, most significant bit first.

use crate::config::AlignConfig;
use crate::detector::contour::outer_contours;
use crate::models::Point;
use crate::utils::binarization::{adaptive_gaussian_binarize, calculate_otsu_threshold};
use crate::utils::geometry::{PerspectiveTransform, approximate_polygon, is_convex};
use crate::utils::grayscale::to_gray_image;
use image::{GrayImage, Luma, RgbImage};
use tracing::debug;

/// Cells per side including the black border
const GRID: usize = 6;
/// Payload bits per side
const BITS: usize = 4;
const THRESH_BLOCK: u32 = 35;
const THRESH_C: i32 = 7;
const APPROX_RATIO: f32 = 0.03;
/// Minimum contrast between the darkest and lightest cell means
const MIN_CELL_CONTRAST: u8 = 30;

/// Codes of the 4x4 dictionary, indexed by marker id
const DICT_4X4: [u16; 4] = [0xB532, 0x0F9A, 0x332D, 0x9946];

/// A decoded marker
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedMarker {
    /// Dictionary id
    pub id: usize,
    /// Corners clockwise, starting at the marker's own top-left corner
    pub corners: [Point; 4],
    /// Number of payload bits that differed from the dictionary code
    pub hamming: u32,
}

/// Dictionary of marker codes
#[derive(Debug, Clone)]
pub struct MarkerDictionary {
    codes: Vec<u16>,
}

impl Default for MarkerDictionary {
    fn default() -> Self {
        Self::four_by_four()
    }
}

impl MarkerDictionary {
    /// The four-marker 4x4 dictionary (ids 0 to 3)
    pub fn four_by_four() -> Self {
        Self {
            codes: DICT_4X4.to_vec(),
        }
    }

    /// Code of marker `id`
    pub fn code(&self, id: usize) -> Option<u16> {
        self.codes.get(id).copied()
    }

    /// Number of markers in the dictionary
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// True for an empty dictionary
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Closest code within `max_hamming` flipped bits
    pub fn identify(&self, bits: u16, max_hamming: u32) -> Option<(usize, u32)> {
        self.codes
            .iter()
            .enumerate()
            .map(|(id, code)| (id, (code ^ bits).count_ones()))
            .filter(|&(_, distance)| distance <= max_hamming)
            .min_by_key(|&(_, distance)| distance)
    }

    /// Render marker `id` as a grayscale image of `6 * cell_px` pixels per side
    pub fn render(&self, id: usize, cell_px: u32) -> Option<GrayImage> {
        let code = self.code(id)?;
        let cell_px = cell_px.max(1);
        let side = GRID as u32 * cell_px;
        Some(GrayImage::from_fn(side, side, |x, y| {
            let (col, row) = ((x / cell_px) as usize, (y / cell_px) as usize);
            if row == 0 || col == 0 || row == GRID - 1 || col == GRID - 1 {
                return Luma([0]);
            }
            let bit = (row - 1) * BITS + (col - 1);
            if (code >> (15 - bit)) & 1 == 1 {
                Luma([255])
            } else {
                Luma([0])
            }
        }))
    }
}

/// Render marker `id` of the default dictionary
pub fn render_marker(id: usize, cell_px: u32) -> Option<GrayImage> {
    MarkerDictionary::default().render(id, cell_px)
}

/// Sort four corners clockwise on screen around their centroid
fn clockwise(quad: &[Point]) -> [Point; 4] {
    let cx = quad.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = quad.iter().map(|p| p.y).sum::<f32>() / 4.0;
    let mut corners = [quad[0], quad[1], quad[2], quad[3]];
    // y points down, so increasing atan2 turns clockwise on screen
    corners.sort_by(|a, b| {
        (a.y - cy)
            .atan2(a.x - cx)
            .total_cmp(&(b.y - cy).atan2(b.x - cx))
    });
    corners
}

/// Mean intensity of the central part of every grid cell
fn sample_cells(gray: &GrayImage, corners: &[Point; 4]) -> Option<[u8; GRID * GRID]> {
    let g = GRID as f32;
    let unit = [
        Point::new(0.0, 0.0),
        Point::new(g, 0.0),
        Point::new(g, g),
        Point::new(0.0, g),
    ];
    let transform = PerspectiveTransform::from_points(&unit, corners)?;
    let (w, h) = (gray.width() as i64, gray.height() as i64);

    let mut cells = [0u8; GRID * GRID];
    for row in 0..GRID {
        for col in 0..GRID {
            let mut sum = 0u32;
            let mut count = 0u32;
            for sy in [0.3f64, 0.5, 0.7] {
                for sx in [0.3f64, 0.5, 0.7] {
                    let (px, py) = transform.transform_xy(col as f64 + sx, row as f64 + sy)?;
                    let (px, py) = (px.round() as i64, py.round() as i64);
                    if px < 0 || py < 0 || px >= w || py >= h {
                        return None;
                    }
                    sum += gray.get_pixel(px as u32, py as u32)[0] as u32;
                    count += 1;
                }
            }
            cells[row * GRID + col] = (sum / count) as u8;
        }
    }
    Some(cells)
}

/// Read the payload of a sampled grid, `None` when the border is not black
fn read_bits(cells: &[u8; GRID * GRID]) -> Option<u16> {
    let min = cells.iter().copied().min().unwrap_or(0);
    let max = cells.iter().copied().max().unwrap_or(0);
    if max.saturating_sub(min) < MIN_CELL_CONTRAST {
        return None;
    }
    let threshold = calculate_otsu_threshold(cells);

    let mut bits = 0u16;
    for row in 0..GRID {
        for col in 0..GRID {
            let white = cells[row * GRID + col] >= threshold;
            let border = row == 0 || col == 0 || row == GRID - 1 || col == GRID - 1;
            if border {
                if white {
                    return None;
                }
            } else {
                bits = (bits << 1) | white as u16;
            }
        }
    }
    Some(bits)
}

/// Try every rotation of the quad and decode the first one that matches
fn decode_quad(
    gray: &GrayImage,
    quad: &[Point; 4],
    dictionary: &MarkerDictionary,
    max_hamming: u32,
) -> Option<DetectedMarker> {
    for k in 0..4 {
        let rotated: [Point; 4] = std::array::from_fn(|i| quad[(i + k) % 4]);
        let Some(cells) = sample_cells(gray, &rotated) else {
            continue;
        };
        let Some(bits) = read_bits(&cells) else {
            continue;
        };
        if let Some((id, hamming)) = dictionary.identify(bits, max_hamming) {
            return Some(DetectedMarker {
                id,
                corners: rotated,
                hamming,
            });
        }
    }
    None
}

/// Detect dictionary markers in a photo.
///
/// At most one marker is returned per id (the one with the longest outline).
pub fn detect_markers(
    image: &RgbImage,
    dictionary: &MarkerDictionary,
    config: &AlignConfig,
) -> Vec<DetectedMarker> {
    let gray = to_gray_image(image);
    if gray.width() < GRID as u32 || gray.height() < GRID as u32 {
        return Vec::new();
    }
    let mask = adaptive_gaussian_binarize(&gray, THRESH_BLOCK, THRESH_C);

    let mut found: Vec<(f32, DetectedMarker)> = Vec::new();
    for shape in outer_contours(&mask) {
        let perimeter = shape.perimeter();
        if perimeter < config.marker_min_perimeter {
            continue;
        }
        let approx = approximate_polygon(&shape.points, APPROX_RATIO * perimeter);
        if approx.len() != 4 || !is_convex(&approx) {
            continue;
        }
        let quad = clockwise(&approx);
        let Some(marker) = decode_quad(&gray, &quad, dictionary, config.marker_max_hamming) else {
            continue;
        };

        match found.iter_mut().find(|(_, m)| m.id == marker.id) {
            Some(slot) if slot.0 < perimeter => *slot = (perimeter, marker),
            Some(_) => {}
            None => found.push((perimeter, marker)),
        }
    }

    let mut markers: Vec<DetectedMarker> = found.into_iter().map(|(_, m)| m).collect();
    markers.sort_by_key(|m| m.id);
    debug!(
        ids = ?markers.iter().map(|m| m.id).collect::<Vec<_>>(),
        "markers decoded"
    );
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, imageops};

    fn canvas_with_marker(id: usize, x: i64, y: i64) -> RgbImage {
        let marker = render_marker(id, 12).unwrap();
        let mut gray = GrayImage::from_pixel(240, 200, Luma([255]));
        imageops::overlay(&mut gray, &marker, x, y);
        RgbImage::from_fn(240, 200, |px, py| {
            let v = gray.get_pixel(px, py)[0];
            Rgb([v, v, v])
        })
    }

    #[test]
    fn render_has_black_border() {
        let img = render_marker(0, 10).unwrap();
        assert_eq!(img.dimensions(), (60, 60));
        assert_eq!(img.get_pixel(5, 5)[0], 0);
        assert_eq!(img.get_pixel(55, 30)[0], 0);
        // First payload bit of 0xB532 is 1 (white)
        assert_eq!(img.get_pixel(15, 15)[0], 255);
        assert!(render_marker(9, 10).is_none());
    }

    #[test]
    fn identify_tolerates_one_flipped_bit() {
        let dict = MarkerDictionary::default();
        assert_eq!(dict.identify(0x0F9A, 1), Some((1, 0)));
        assert_eq!(dict.identify(0x0F9A ^ 0x0010, 1), Some((1, 1)));
        assert_eq!(dict.identify(0x0F9A ^ 0x0011, 1), None);
    }

    #[test]
    fn detects_upright_marker_with_top_left_first() {
        let image = canvas_with_marker(2, 50, 40);
        let markers = detect_markers(&image, &MarkerDictionary::default(), &AlignConfig::default());
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].id, 2);
        let tl = markers[0].corners[0];
        assert!((tl.x - 50.0).abs() <= 2.0 && (tl.y - 40.0).abs() <= 2.0);
    }

    #[test]
    fn detects_rotated_marker_and_reports_its_own_corner() {
        let marker = render_marker(3, 12).unwrap();
        let rotated = imageops::rotate90(&marker);
        let mut gray = GrayImage::from_pixel(240, 200, Luma([255]));
        imageops::overlay(&mut gray, &rotated, 60, 50);
        let image = RgbImage::from_fn(240, 200, |px, py| {
            let v = gray.get_pixel(px, py)[0];
            Rgb([v, v, v])
        });

        let markers = detect_markers(&image, &MarkerDictionary::default(), &AlignConfig::default());
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].id, 3);
        // A clockwise quarter turn moves the marker's top-left to the top-right.
        let tl = markers[0].corners[0];
        assert!((tl.x - (60.0 + 71.0)).abs() <= 2.0 && (tl.y - 50.0).abs() <= 2.0);
    }

    #[test]
    fn blank_page_has_no_markers() {
        let image = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        assert!(detect_markers(&image, &MarkerDictionary::default(), &AlignConfig::default()).is_empty());
    }
}
