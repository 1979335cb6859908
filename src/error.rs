//! Error types shared by every pipeline stage

use crate::align::AlignStrategy;
use thiserror::Error;

/// Errors produced while grading answer sheets.
///
/// Only [`OmrError::LayoutLearning`] is fatal for a whole grading session;
/// everything else is local to one sheet and is turned into a skipped
/// outcome by the batch driver.
#[derive(Debug, Error)]
pub enum OmrError {
    /// A strategy could not find the geometric cues it needs.
    #[error("{strategy} alignment failed: {reason}")]
    Alignment {
        /// Strategy that was attempted.
        strategy: AlignStrategy,
        /// Human-readable cause.
        reason: String,
    },

    /// The key sheet produced no question-sized row of bubbles.
    #[error("no question rows learned from the key ({candidates} bubble candidates in {rows} rows)")]
    LayoutLearning {
        /// Bubble-shaped regions that passed the shape filter.
        candidates: usize,
        /// Rows formed before the option-count filter.
        rows: usize,
    },

    /// An input could not be decoded into an image.
    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        /// Path (or `<memory>`) of the failing input.
        path: String,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// A configuration value is out of range.
    #[error("invalid configuration: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
    },

    /// Filesystem error while reading inputs or writing results.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl OmrError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn alignment(strategy: AlignStrategy, reason: impl Into<String>) -> Self {
        Self::Alignment {
            strategy,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OmrError>;
