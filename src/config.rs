//! Per-stage configuration
//!
//! Every stage takes one explicit config value. Defaults reproduce the
//! thresholds the grader was tuned with; `from_env` applies `OMR_*`
//! overrides on top of the defaults, and `OmrConfig::from_json_file` loads a
//! partial JSON document (missing fields keep their defaults).

use crate::compare::MultiPolicy;
use crate::error::{OmrError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn parse_env_f32(name: &str, default: f32) -> f32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<f32>().ok())
        .unwrap_or(default)
}

fn parse_env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn parse_env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

/// Geometry normalization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignConfig {
    /// Width of the canonical rectangle in pixels.
    pub canonical_width: u32,
    /// Height of the canonical rectangle in pixels.
    pub canonical_height: u32,
    /// Gaussian sigma applied before edge detection (5x5 kernel equivalent).
    pub blur_sigma: f32,
    /// Canny hysteresis low threshold.
    pub canny_low: f32,
    /// Canny hysteresis high threshold.
    pub canny_high: f32,
    /// Number of largest contours tested for a quadrilateral.
    pub max_quad_candidates: usize,
    /// Polygon approximation tolerance as a fraction of the perimeter.
    pub approx_epsilon_ratio: f32,
    /// Dilation radius applied to the edge map to close small gaps.
    pub edge_dilation: u8,
    /// Smallest marker outline perimeter considered, in pixels.
    pub marker_min_perimeter: f32,
    /// Maximum number of flipped bits accepted when matching a marker code.
    pub marker_max_hamming: u32,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            canonical_width: 1000,
            canonical_height: 1400,
            blur_sigma: 1.1,
            canny_low: 75.0,
            canny_high: 200.0,
            max_quad_candidates: 5,
            approx_epsilon_ratio: 0.02,
            edge_dilation: 1,
            marker_min_perimeter: 60.0,
            marker_max_hamming: 1,
        }
    }
}

impl AlignConfig {
    /// Defaults with `OMR_CANONICAL_WIDTH` / `OMR_CANONICAL_HEIGHT` applied.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            canonical_width: parse_env_u32("OMR_CANONICAL_WIDTH", d.canonical_width),
            canonical_height: parse_env_u32("OMR_CANONICAL_HEIGHT", d.canonical_height),
            ..d
        }
    }

    /// Reject values the aligner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.canonical_width < 2 || self.canonical_height < 2 {
            return Err(OmrError::config("canonical rectangle must be at least 2x2"));
        }
        if self.blur_sigma <= 0.0 {
            return Err(OmrError::config("blur_sigma must be positive"));
        }
        if self.canny_low > self.canny_high {
            return Err(OmrError::config("canny_low must not exceed canny_high"));
        }
        if self.max_quad_candidates == 0 {
            return Err(OmrError::config("max_quad_candidates must be at least 1"));
        }
        if !(self.approx_epsilon_ratio > 0.0 && self.approx_epsilon_ratio < 1.0) {
            return Err(OmrError::config("approx_epsilon_ratio must be in (0, 1)"));
        }
        Ok(())
    }
}

/// Adaptive binarization used for layout learning and mark extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizeConfig {
    /// CLAHE clip limit (relative to a uniform histogram).
    pub clahe_clip_limit: f32,
    /// CLAHE tile grid size per axis.
    pub clahe_tiles: u32,
    /// Pre-threshold smoothing sigma (3x3 kernel equivalent).
    pub blur_sigma: f32,
    /// Neighbourhood size of the Gaussian-weighted local mean (odd).
    pub block_size: u32,
    /// Constant subtracted from the local mean.
    pub c: i32,
    /// Opening radius in pixels, 0 disables the opening.
    pub open_radius: u8,
}

impl Default for BinarizeConfig {
    fn default() -> Self {
        Self {
            clahe_clip_limit: 2.0,
            clahe_tiles: 8,
            blur_sigma: 0.8,
            block_size: 35,
            c: 10,
            open_radius: 1,
        }
    }
}

impl BinarizeConfig {
    /// Reject values the binarizer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(OmrError::config("block_size must be odd and at least 3"));
        }
        if self.clahe_tiles == 0 {
            return Err(OmrError::config("clahe_tiles must be at least 1"));
        }
        if self.clahe_clip_limit <= 0.0 || self.blur_sigma <= 0.0 {
            return Err(OmrError::config(
                "clahe_clip_limit and blur_sigma must be positive",
            ));
        }
        Ok(())
    }
}

/// Bubble discovery settings for the key sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Options per question (bubbles per question chunk).
    pub options_per_question: usize,
    /// Minimum contour area of a bubble, in square pixels.
    pub min_area: f32,
    /// Maximum contour area of a bubble, in square pixels.
    pub max_area: f32,
    /// Minimum isoperimetric circularity `4*pi*area/perimeter^2`.
    pub min_circularity: f32,
    /// Maximum distance between a bubble centre and a row's mean y.
    pub row_tolerance: f32,
    /// Binarization applied before contour extraction.
    pub binarize: BinarizeConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            options_per_question: 5,
            min_area: 120.0,
            max_area: 5000.0,
            min_circularity: 0.65,
            row_tolerance: 14.0,
            binarize: BinarizeConfig::default(),
        }
    }
}

impl LayoutConfig {
    /// Defaults with `OMR_OPTIONS` / `OMR_ROW_TOLERANCE` applied.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            options_per_question: parse_env_usize("OMR_OPTIONS", d.options_per_question),
            row_tolerance: parse_env_f32("OMR_ROW_TOLERANCE", d.row_tolerance),
            ..d
        }
    }

    /// Reject values the layout learner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.options_per_question == 0 || self.options_per_question > 26 {
            return Err(OmrError::config("options_per_question must be in 1..=26"));
        }
        if self.min_area < 0.0 || self.min_area > self.max_area {
            return Err(OmrError::config("bubble area bounds are inverted"));
        }
        if self.row_tolerance < 0.0 {
            return Err(OmrError::config("row_tolerance must not be negative"));
        }
        self.binarize.validate()
    }

    /// Option labels `A`, `B`, ... for the configured option count.
    pub fn option_labels(&self) -> Vec<String> {
        (0..self.options_per_question.min(26))
            .map(|i| char::from(b'A' + i as u8).to_string())
            .collect()
    }
}

/// Mark decision settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Minimum fill ratio for a bubble to count as marked.
    pub mark_threshold: f32,
    /// Minimum gap between the two fullest bubbles for an unambiguous mark.
    pub ambiguity_gap: f32,
    /// Padding added around each bubble box, as a fraction of its short side.
    pub padding_ratio: f32,
    /// Pixels trimmed from the sampling circle radius.
    pub mask_inset: i32,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            mark_threshold: 0.25,
            ambiguity_gap: 0.08,
            padding_ratio: 0.20,
            mask_inset: 2,
        }
    }
}

impl ExtractConfig {
    /// Defaults with `OMR_MARK_THRESHOLD` / `OMR_AMBIGUITY_GAP` applied.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            mark_threshold: parse_env_f32("OMR_MARK_THRESHOLD", d.mark_threshold),
            ambiguity_gap: parse_env_f32("OMR_AMBIGUITY_GAP", d.ambiguity_gap),
            ..d
        }
    }

    /// Reject values the extractor cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.mark_threshold) {
            return Err(OmrError::config("mark_threshold must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.ambiguity_gap) {
            return Err(OmrError::config("ambiguity_gap must be in [0, 1]"));
        }
        if self.padding_ratio < 0.0 {
            return Err(OmrError::config("padding_ratio must not be negative"));
        }
        Ok(())
    }
}

/// Configuration of a whole grading session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OmrConfig {
    /// Aligner settings.
    pub align: AlignConfig,
    /// Layout learner settings.
    pub layout: LayoutConfig,
    /// Mark extractor settings.
    pub extract: ExtractConfig,
    /// How ambiguous student marks are scored.
    pub multi_policy: MultiPolicy,
}

impl OmrConfig {
    /// Defaults with every `OMR_*` environment override applied.
    pub fn from_env() -> Self {
        Self {
            align: AlignConfig::from_env(),
            layout: LayoutConfig::from_env(),
            extract: ExtractConfig::from_env(),
            multi_policy: MultiPolicy::default(),
        }
    }

    /// Load a (possibly partial) JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every stage.
    pub fn validate(&self) -> Result<()> {
        self.align.validate()?;
        self.layout.validate()?;
        self.extract.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(OmrConfig::default().validate().is_ok());
    }

    #[test]
    fn option_labels_follow_count() {
        let config = LayoutConfig {
            options_per_question: 4,
            ..LayoutConfig::default()
        };
        assert_eq!(config.option_labels(), vec!["A", "B", "C", "D"]);
        assert_eq!(LayoutConfig::default().option_labels().len(), 5);
    }

    #[test]
    fn rejects_inverted_area_bounds() {
        let config = LayoutConfig {
            min_area: 600.0,
            max_area: 100.0,
            ..LayoutConfig::default()
        };
        assert!(matches!(config.validate(), Err(OmrError::Config { .. })));
    }

    #[test]
    fn rejects_even_block_size() {
        let config = BinarizeConfig {
            block_size: 34,
            ..BinarizeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: OmrConfig =
            serde_json::from_str(r#"{"extract": {"mark_threshold": 0.4}}"#).unwrap();
        assert_eq!(config.extract.mark_threshold, 0.4);
        assert_eq!(config.extract.ambiguity_gap, 0.08);
        assert_eq!(config.align.canonical_width, 1000);
        assert_eq!(config.layout.options_per_question, 5);
    }
}
