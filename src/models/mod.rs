//! Core data structures shared by every stage

/// Answer maps, key answers and grading outcomes
pub mod answers;
/// Bubble boxes and the learned question layout
pub mod layout;
/// Binarization map storage
pub mod matrix;
/// 2D points
pub mod point;

pub use answers::{
    AnswerMap, BubbleMetric, Classification, ComparisonResult, KeyAnswer, KeyMap, Outcome,
    QuestionOutcome,
};
pub use layout::{BoundingBox, Layout, QuestionLayout};
pub use matrix::BitMatrix;
pub use point::Point;
