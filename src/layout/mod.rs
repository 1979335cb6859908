//! Unsupervised layout learning from the key sheet
//!
//! The aligned key is binarized, bubble-shaped regions are collected, grouped
//! into rows by their centre y and every row is cut into questions of
//! `options_per_question` bubbles. Question ids run 1, 2, 3... in row-then-
//! chunk order.

/// Row clustering of bubble candidates
pub mod rows;

use crate::config::LayoutConfig;
use crate::detector::bubble::{BubbleCandidate, detect_bubbles};
use crate::error::{OmrError, Result};
use crate::models::{BitMatrix, Layout, QuestionLayout};
use crate::utils::binarization::sheet_mask;
use image::RgbImage;
use rows::cluster_rows;
use tracing::info;

/// Everything the learner produced for one key sheet
#[derive(Debug, Clone)]
pub struct LearnedLayout {
    /// Question template (possibly empty)
    pub layout: Layout,
    /// Binarization map the bubbles were found on
    pub binarization: BitMatrix,
    /// Bubble candidates that passed the shape filter
    pub candidates: usize,
    /// Rows formed before dropping short rows
    pub rows: usize,
}

/// Cut clustered bubbles into questions.
///
/// Returns the layout and the number of rows formed.
pub fn layout_from_candidates(
    candidates: &[BubbleCandidate],
    config: &LayoutConfig,
) -> Result<(Layout, usize)> {
    config.validate()?;
    let options = config.options_per_question;
    let rows = cluster_rows(candidates, config.row_tolerance);
    let row_count = rows.len();

    let mut questions = Vec::new();
    let mut next_id = 1u32;
    for row in rows.into_iter().filter(|row| row.len() >= options) {
        for chunk in row.into_items().chunks_exact(options) {
            questions.push(QuestionLayout {
                question_id: next_id,
                option_boxes: chunk.iter().map(|b| b.bbox).collect(),
            });
            next_id += 1;
        }
    }

    Ok((Layout::new(questions, config.option_labels())?, row_count))
}

/// Learn the layout without checking that any question was found
pub fn learn_layout_unchecked(aligned_key: &RgbImage, config: &LayoutConfig) -> Result<LearnedLayout> {
    config.validate()?;
    let mask = sheet_mask(aligned_key, &config.binarize);
    let candidates = detect_bubbles(&mask, config);
    let (layout, rows) = layout_from_candidates(&candidates, config)?;

    info!(
        candidates = candidates.len(),
        rows,
        questions = layout.len(),
        "layout learned from key"
    );

    Ok(LearnedLayout {
        layout,
        binarization: BitMatrix::from_mask(&mask),
        candidates: candidates.len(),
        rows,
    })
}

/// Learn the layout of an aligned key sheet.
///
/// Fails with [`OmrError::LayoutLearning`] when no question survives.
pub fn learn_layout(aligned_key: &RgbImage, config: &LayoutConfig) -> Result<(Layout, BitMatrix)> {
    let learned = learn_layout_unchecked(aligned_key, config)?;
    if learned.layout.is_empty() {
        return Err(OmrError::LayoutLearning {
            candidates: learned.candidates,
            rows: learned.rows,
        });
    }
    Ok((learned.layout, learned.binarization))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, Point};
    use image::Rgb;

    fn bubble(cx: f32, cy: f32) -> BubbleCandidate {
        BubbleCandidate {
            center: Point::new(cx, cy),
            bbox: BoundingBox::new(cx as i32 - 10, cy as i32 - 10, 20, 20),
            area: 300.0,
            circularity: 0.9,
        }
    }

    fn config(options: usize) -> LayoutConfig {
        LayoutConfig {
            options_per_question: options,
            ..LayoutConfig::default()
        }
    }

    #[test]
    fn chunks_rows_and_numbers_questions() {
        let mut candidates = Vec::new();
        // Row 1: two questions side by side plus one stray bubble
        for i in 0..7 {
            candidates.push(bubble(50.0 + 40.0 * i as f32, 100.0));
        }
        // Row 2: too short, dropped
        candidates.push(bubble(50.0, 200.0));
        // Row 3: one question
        for i in 0..3 {
            candidates.push(bubble(50.0 + 40.0 * i as f32, 300.0));
        }

        let (layout, rows) = layout_from_candidates(&candidates, &config(3)).unwrap();
        assert_eq!(rows, 3);
        let ids: Vec<u32> = layout.questions().iter().map(|q| q.question_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(layout.questions()[1].option_boxes[0].x, 50 + 40 * 3 - 10);
        assert_eq!(layout.questions()[2].option_boxes[0].y, 290);
        assert_eq!(layout.option_labels(), &["A", "B", "C"]);
    }

    #[test]
    fn zero_options_per_question_is_rejected() {
        let candidates = vec![bubble(50.0, 100.0), bubble(90.0, 100.0)];
        let err = layout_from_candidates(&candidates, &config(0)).unwrap_err();
        assert!(matches!(err, OmrError::Config { .. }));
    }

    #[test]
    fn blank_key_is_a_learning_failure() {
        let key = RgbImage::from_pixel(300, 400, Rgb([255, 255, 255]));
        let err = learn_layout(&key, &LayoutConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            OmrError::LayoutLearning {
                candidates: 0,
                rows: 0
            }
        ));

        let learned = learn_layout_unchecked(&key, &LayoutConfig::default()).unwrap();
        assert!(learned.layout.is_empty());
    }
}
