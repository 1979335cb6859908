//! Geometric normalization of photographed sheets
//!
//! Three strategies bring a photo into the canonical frame:
//! - Marker: four fiducial markers (ids 0 to 3) define the sheet corners
//! - Contour quad: the sheet outline is found as the largest quadrilateral
//! - Deskew: the tilt of the printed content is undone by a rotation
//!
//! An [`AlignMode`] selects one strategy or the fallback chain of all three.

/// Tilt estimation and rotation
pub mod deskew;
/// Fiducial marker strategy
pub mod marker;
/// Sheet outline strategy
pub mod quad;

use crate::config::AlignConfig;
use crate::error::{OmrError, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// One way of producing a canonical image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignStrategy {
    /// Perspective warp between four fiducial markers
    Marker,
    /// Perspective warp of the largest four-sided outline
    ContourQuad,
    /// Rotation that undoes the content tilt
    Deskew,
    /// No alignment; the input is passed through
    None,
}

impl AlignStrategy {
    /// Attempt to produce an aligned image
    pub fn attempt(self, image: &RgbImage, config: &AlignConfig) -> Result<RgbImage> {
        match self {
            Self::Marker => marker::align_with_markers(image, config),
            Self::ContourQuad => quad::align_with_quad(image, config),
            Self::Deskew => deskew::deskew(image).map(|(rotated, _)| rotated),
            Self::None => Ok(image.clone()),
        }
    }

    /// Whether the output has the canonical dimensions
    pub fn is_canonical(self) -> bool {
        matches!(self, Self::Marker | Self::ContourQuad)
    }
}

impl fmt::Display for AlignStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Marker => "marker",
            Self::ContourQuad => "contour_quad",
            Self::Deskew => "deskew",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Which strategies an alignment run may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignMode {
    /// Markers only
    Aruco,
    /// Sheet outline only
    Auto,
    /// Markers, then outline, then deskew
    #[default]
    AutoFallback,
}

impl AlignMode {
    /// Strategies tried in order
    pub fn chain(self) -> &'static [AlignStrategy] {
        match self {
            Self::Aruco => &[AlignStrategy::Marker],
            Self::Auto => &[AlignStrategy::ContourQuad],
            Self::AutoFallback => &[
                AlignStrategy::Marker,
                AlignStrategy::ContourQuad,
                AlignStrategy::Deskew,
            ],
        }
    }
}

impl fmt::Display for AlignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aruco => "aruco",
            Self::Auto => "auto",
            Self::AutoFallback => "auto_fallback",
        };
        f.write_str(name)
    }
}

impl FromStr for AlignMode {
    type Err = OmrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aruco" => Ok(Self::Aruco),
            "auto" => Ok(Self::Auto),
            "auto_fallback" => Ok(Self::AutoFallback),
            other => Err(OmrError::config(format!(
                "unknown alignment mode '{other}' (expected aruco, auto or auto_fallback)"
            ))),
        }
    }
}

/// Outcome of an alignment run.
///
/// When `success` is false, `image` is the unmodified input.
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    /// Aligned image (or the input on failure)
    pub image: RgbImage,
    /// Strategy that produced `image`
    pub strategy_used: AlignStrategy,
    /// Whether any strategy succeeded
    pub success: bool,
}

/// Aligner bound to one configuration
#[derive(Debug, Clone, Default)]
pub struct Aligner {
    config: AlignConfig,
}

impl Aligner {
    /// Create an aligner
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    /// Configuration in use
    pub fn config(&self) -> &AlignConfig {
        &self.config
    }

    /// Run the strategies of `mode` until one succeeds
    pub fn align(&self, image: &RgbImage, mode: AlignMode) -> AlignmentResult {
        for &strategy in mode.chain() {
            debug!(%strategy, "attempting alignment");
            match strategy.attempt(image, &self.config) {
                Ok(aligned) => {
                    info!(
                        %strategy,
                        width = aligned.width(),
                        height = aligned.height(),
                        "sheet aligned"
                    );
                    return AlignmentResult {
                        image: aligned,
                        strategy_used: strategy,
                        success: true,
                    };
                }
                Err(err) => warn!(%strategy, error = %err, "alignment strategy failed"),
            }
        }

        AlignmentResult {
            image: image.clone(),
            strategy_used: AlignStrategy::None,
            success: false,
        }
    }
}

/// Align `image` with the given mode and configuration
pub fn align(image: &RgbImage, mode: AlignMode, config: &AlignConfig) -> AlignmentResult {
    Aligner::new(config.clone()).align(image, mode)
}
