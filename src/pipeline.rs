//! Grading sessions: one key sheet, many student sheets
//!
//! A session aligns the key once, learns the bubble layout from it and reads
//! the key answers. Every student sheet is then aligned, read with the frozen
//! layout and compared against the key. Sheets are independent, so batches
//! are graded in parallel; results keep input order.

use crate::align::{AlignMode, AlignStrategy, Aligner, AlignmentResult};
use crate::compare::{compare_extraction, key_from_answers};
use crate::config::OmrConfig;
use crate::error::{OmrError, Result};
use crate::extract::extract;
use crate::layout::learn_layout;
use crate::models::{AnswerMap, BubbleMetric, ComparisonResult, KeyMap, Layout};
use crate::tools::{collect_images, decode_rgb, load_rgb, sheet_name, sheet_names};
use crate::utils::binarization::sheet_binarize;
use image::RgbImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Report metadata passed through to the writers untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetMeta {
    /// Exam name
    pub name: String,
    /// Subject
    pub subject: String,
    /// Class or group
    pub class: String,
    /// School
    pub school: String,
    /// Exam date, free-form
    pub date: String,
}

/// Everything read from one graded student sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResult {
    /// Sheet name (path below the batch directory, without extension)
    pub name: String,
    /// Strategy that aligned the sheet
    pub strategy: AlignStrategy,
    /// Answers read from the sheet
    pub answers: AnswerMap,
    /// Comparison against the key
    pub comparison: ComparisonResult,
    /// Fill statistics per question
    pub metrics: BTreeMap<u32, BubbleMetric>,
}

/// Result of grading one sheet of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SheetOutcome {
    /// The sheet was aligned, read and compared
    Graded(StudentResult),
    /// The sheet could not be graded
    Skipped {
        /// Sheet name
        name: String,
        /// Why it was skipped
        reason: String,
    },
}

impl SheetOutcome {
    /// Name of the sheet
    pub fn name(&self) -> &str {
        match self {
            Self::Graded(result) => &result.name,
            Self::Skipped { name, .. } => name,
        }
    }

    /// The graded result, if any
    pub fn graded(&self) -> Option<&StudentResult> {
        match self {
            Self::Graded(result) => Some(result),
            Self::Skipped { .. } => None,
        }
    }

    /// Summary line of a graded sheet
    pub fn summary_row(&self) -> Option<SummaryRow> {
        self.graded().map(SummaryRow::from)
    }
}

/// One line of the class summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SummaryRow {
    pub student: String,
    pub score: f64,
    pub correct: usize,
    pub wrong: usize,
    pub blank: usize,
    pub multi: usize,
    pub total: usize,
}

impl From<&StudentResult> for SummaryRow {
    fn from(result: &StudentResult) -> Self {
        let c = &result.comparison;
        Self {
            student: result.name.clone(),
            score: c.score_percent,
            correct: c.correct_count,
            wrong: c.wrong_count,
            blank: c.blank_count,
            multi: c.multi_count,
            total: c.total,
        }
    }
}

/// Load an answer key file such as `{"1": "A", "2": ["B", "C"]}`
pub fn load_answer_key<P: AsRef<Path>>(path: P) -> Result<KeyMap> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Frozen state shared by every student sheet of a grading run
#[derive(Debug, Clone)]
pub struct GradingSession {
    config: OmrConfig,
    mode: AlignMode,
    aligner: Aligner,
    layout: Layout,
    key_answers: AnswerMap,
    key: KeyMap,
    key_strategy: AlignStrategy,
}

impl GradingSession {
    /// Align the key sheet, learn its layout and read its answers.
    ///
    /// Fails when the key cannot be aligned or no question is found on it.
    pub fn from_key(key_image: &RgbImage, config: &OmrConfig, mode: AlignMode) -> Result<Self> {
        config.validate()?;
        let aligner = Aligner::new(config.align.clone());

        let aligned = aligner.align(key_image, mode);
        if !aligned.success {
            return Err(OmrError::alignment(
                aligned.strategy_used,
                format!("key sheet could not be aligned with mode {mode}"),
            ));
        }

        let (layout, binarization) = learn_layout(&aligned.image, &config.layout)?;
        let extraction = extract(&aligned.image, &layout, Some(&binarization), &config.extract);
        let key = key_from_answers(&extraction.answers);

        info!(
            strategy = %aligned.strategy_used,
            questions = layout.len(),
            "grading session ready"
        );

        Ok(Self {
            config: config.clone(),
            mode,
            aligner,
            layout,
            key_answers: extraction.answers,
            key,
            key_strategy: aligned.strategy_used,
        })
    }

    /// Replace the answers read from the key sheet with an explicit key.
    ///
    /// This is how questions with several accepted options are graded.
    pub fn with_answer_key(mut self, key: KeyMap) -> Self {
        for id in key.keys() {
            if !self.layout.questions().iter().any(|q| q.question_id == *id) {
                warn!(question = id, "answer key names a question absent from the layout");
            }
        }
        self.key = key;
        self
    }

    /// Learned bubble layout
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Key used for grading
    pub fn key(&self) -> &KeyMap {
        &self.key
    }

    /// Answers read from the key sheet
    pub fn key_answers(&self) -> &AnswerMap {
        &self.key_answers
    }

    /// Strategy that aligned the key sheet
    pub fn key_strategy(&self) -> AlignStrategy {
        self.key_strategy
    }

    /// Session configuration
    pub fn config(&self) -> &OmrConfig {
        &self.config
    }

    /// Alignment mode used for every sheet
    pub fn mode(&self) -> AlignMode {
        self.mode
    }

    /// Align a sheet the way graded sheets are aligned
    pub fn align(&self, image: &RgbImage) -> AlignmentResult {
        self.aligner.align(image, self.mode)
    }

    /// Grade one student sheet
    pub fn grade(&self, image: &RgbImage, name: &str) -> SheetOutcome {
        let aligned = self.align(image);
        if !aligned.success {
            warn!(sheet = name, mode = %self.mode, "skipping sheet: alignment failed");
            return SheetOutcome::Skipped {
                name: name.to_string(),
                reason: format!("alignment failed with mode {}", self.mode),
            };
        }

        let binarization = sheet_binarize(&aligned.image, &self.config.layout.binarize);
        let extraction = extract(
            &aligned.image,
            &self.layout,
            Some(&binarization),
            &self.config.extract,
        );
        let comparison = compare_extraction(&extraction, &self.key, self.config.multi_policy);

        info!(
            sheet = name,
            strategy = %aligned.strategy_used,
            score = comparison.score_percent,
            "sheet graded"
        );

        SheetOutcome::Graded(StudentResult {
            name: name.to_string(),
            strategy: aligned.strategy_used,
            answers: extraction.answers,
            comparison,
            metrics: extraction.metrics,
        })
    }

    /// Grade decoded sheets in parallel, keeping input order
    pub fn grade_batch(&self, sheets: Vec<(String, RgbImage)>) -> Vec<SheetOutcome> {
        sheets
            .par_iter()
            .map(|(name, image)| self.grade(image, name))
            .collect()
    }

    /// Decode and grade one encoded sheet, as received from an upload.
    ///
    /// Undecodable bytes become a skipped outcome.
    pub fn grade_bytes(&self, bytes: &[u8], name: &str) -> SheetOutcome {
        match decode_rgb(bytes) {
            Ok(image) => self.grade(&image, name),
            Err(err) => skip_undecodable(name.to_string(), err),
        }
    }

    /// Load and grade image files in parallel, keeping input order.
    ///
    /// Sheets are named after the file stem. Files that fail to decode
    /// become skipped outcomes.
    pub fn grade_paths(&self, paths: &[PathBuf]) -> Vec<SheetOutcome> {
        let names: Vec<String> = paths.iter().map(sheet_name).collect();
        self.grade_named(paths, names)
    }

    /// Grade every image below `root`, sorted by path.
    ///
    /// Sheets are named by their path relative to `root`, so files with the
    /// same stem in different directories stay apart.
    pub fn grade_dir<P: AsRef<Path>>(&self, root: P) -> Result<Vec<(PathBuf, SheetOutcome)>> {
        let paths = collect_images(root.as_ref())?;
        let names = sheet_names(root.as_ref(), &paths);
        let outcomes = self.grade_named(&paths, names);
        Ok(paths.into_iter().zip(outcomes).collect())
    }

    fn grade_named(&self, paths: &[PathBuf], names: Vec<String>) -> Vec<SheetOutcome> {
        paths
            .par_iter()
            .zip(names)
            .map(|(path, name)| match load_rgb(path) {
                Ok(image) => self.grade(&image, &name),
                Err(err) => skip_undecodable(name, err),
            })
            .collect()
    }
}

fn skip_undecodable(name: String, err: OmrError) -> SheetOutcome {
    warn!(sheet = %name, error = %err, "skipping sheet: decode failed");
    SheetOutcome::Skipped {
        name,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyAnswer;
    use image::Rgb;

    fn graded(name: &str, correct: usize, total: usize) -> StudentResult {
        StudentResult {
            name: name.to_string(),
            strategy: AlignStrategy::ContourQuad,
            answers: AnswerMap::new(),
            comparison: ComparisonResult {
                correct_count: correct,
                wrong_count: total - correct,
                total,
                score_percent: 100.0 * correct as f64 / total as f64,
                ..ComparisonResult::default()
            },
            metrics: BTreeMap::new(),
        }
    }

    #[test]
    fn summary_row_mirrors_comparison() {
        let outcome = SheetOutcome::Graded(graded("ana", 3, 4));
        let row = outcome.summary_row().unwrap();
        assert_eq!(row.student, "ana");
        assert_eq!(row.score, 75.0);
        assert_eq!(row.wrong, 1);
        assert_eq!(row.total, 4);

        let skipped = SheetOutcome::Skipped {
            name: "blurry".into(),
            reason: "alignment failed".into(),
        };
        assert_eq!(skipped.name(), "blurry");
        assert!(skipped.summary_row().is_none());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let skipped = SheetOutcome::Skipped {
            name: "x".into(),
            reason: "r".into(),
        };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "r");
    }

    #[test]
    fn blank_key_cannot_start_a_session() {
        let blank = RgbImage::from_pixel(300, 300, Rgb([255, 255, 255]));
        let err = GradingSession::from_key(&blank, &OmrConfig::default(), AlignMode::AutoFallback)
            .unwrap_err();
        assert!(matches!(
            err,
            OmrError::Alignment {
                strategy: AlignStrategy::None,
                ..
            }
        ));
    }

    #[test]
    fn answer_key_file_parses_both_forms() {
        let path = std::env::temp_dir().join(format!(
            "rust_omr_answer_key_{}.json",
            std::process::id()
        ));
        std::fs::write(&path, r#"{"1": "A", "2": ["B", "C"]}"#).unwrap();
        let key = load_answer_key(&path).unwrap();
        assert_eq!(key[&1], KeyAnswer::Single("A".into()));
        assert!(key[&2].accepts("B"));
        let _ = std::fs::remove_file(path);
    }
}
