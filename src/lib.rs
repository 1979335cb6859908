//! RustOMR - optical mark recognition for multiple-choice answer sheets
//!
//! Photographed sheets are aligned to a canonical frame, the bubble layout is
//! learned from a key sheet, marks are read by fill ratio and every student
//! sheet is scored against the key.
//!
//! ```no_run
//! use rust_omr::{Grader, tools::load_rgb};
//!
//! let key = load_rgb("key.jpg")?;
//! let session = Grader::new().session(&key)?;
//! let outcome = session.grade(&load_rgb("student.jpg")?, "student");
//! if let Some(row) = outcome.summary_row() {
//!     println!("{}: {:.1}%", row.student, row.score);
//! }
//! # Ok::<(), rust_omr::OmrError>(())
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Sheet alignment strategies and the fallback chain
pub mod align;
/// Answer comparison and scoring
pub mod compare;
/// Stage configuration and environment overrides
pub mod config;
/// Contour, bubble and marker detection
pub mod detector;
/// Error type shared by all stages
pub mod error;
/// CSV/JSON writers and the debug overlay
pub mod export;
/// Mark extraction
pub mod extract;
/// Layout learning from the key sheet
pub mod layout;
/// Core data structures (BitMatrix, Layout, answers, ...)
pub mod models;
/// Grading sessions and batch driver
pub mod pipeline;
/// Image loading and directory helpers
pub mod tools;
/// Image utilities (grayscale, binarization, contrast, geometry, warp)
pub mod utils;

pub use align::{AlignMode, AlignStrategy, Aligner, AlignmentResult};
pub use compare::{MultiPolicy, compare, compare_extraction};
pub use config::OmrConfig;
pub use error::{OmrError, Result};
pub use extract::{Extraction, extract};
pub use layout::learn_layout;
pub use models::{
    AnswerMap, BitMatrix, BoundingBox, ComparisonResult, KeyAnswer, KeyMap, Layout, Outcome,
    Point,
};
pub use pipeline::{GradingSession, SheetMeta, SheetOutcome, StudentResult, SummaryRow};

use image::RgbImage;

/// Grader with a configuration and alignment mode
#[derive(Debug, Clone, Default)]
pub struct Grader {
    config: OmrConfig,
    mode: AlignMode,
}

impl Grader {
    /// Create a grader with default settings and the full fallback chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a grader whose settings come from `OMR_*` environment variables
    pub fn from_env() -> Self {
        Self {
            config: OmrConfig::from_env(),
            mode: AlignMode::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: OmrConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a specific alignment mode
    pub fn with_mode(mut self, mode: AlignMode) -> Self {
        self.mode = mode;
        self
    }

    /// Configuration in use
    pub fn config(&self) -> &OmrConfig {
        &self.config
    }

    /// Alignment mode in use
    pub fn mode(&self) -> AlignMode {
        self.mode
    }

    /// Align one sheet
    pub fn align(&self, image: &RgbImage) -> AlignmentResult {
        align::align(image, self.mode, &self.config.align)
    }

    /// Align a key sheet and learn its layout
    pub fn learn_layout(&self, key_image: &RgbImage) -> Result<Layout> {
        let aligned = self.align(key_image);
        if !aligned.success {
            return Err(OmrError::alignment(
                aligned.strategy_used,
                format!("key sheet could not be aligned with mode {}", self.mode),
            ));
        }
        learn_layout(&aligned.image, &self.config.layout).map(|(layout, _)| layout)
    }

    /// Start a grading session from a key sheet
    pub fn session(&self, key_image: &RgbImage) -> Result<GradingSession> {
        GradingSession::from_key(key_image, &self.config, self.mode)
    }

    /// Grade a single student sheet against a key sheet
    pub fn grade_one(&self, key_image: &RgbImage, student: &RgbImage) -> Result<ComparisonResult> {
        let session = self.session(key_image)?;
        match session.grade(student, "student") {
            SheetOutcome::Graded(result) => Ok(result.comparison),
            SheetOutcome::Skipped { reason, .. } => {
                Err(OmrError::alignment(AlignStrategy::None, reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn builder_keeps_settings() {
        let grader = Grader::new().with_mode(AlignMode::Auto);
        assert_eq!(grader.mode(), AlignMode::Auto);
        assert_eq!(grader.config().align.canonical_width, 1000);
    }

    #[test]
    fn blank_image_passes_through_unaligned() {
        let blank = RgbImage::from_pixel(120, 160, Rgb([255, 255, 255]));
        let result = Grader::new().align(&blank);
        assert!(!result.success);
        assert_eq!(result.strategy_used, AlignStrategy::None);
        assert_eq!(result.image, blank);
        assert!(Grader::new().learn_layout(&blank).is_err());
    }
}
