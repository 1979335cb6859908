use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Extracted answers: question id to chosen label, `None` for blank or ambiguous
pub type AnswerMap = BTreeMap<u32, Option<String>>;

/// Reference answers keyed by question id
pub type KeyMap = BTreeMap<u32, KeyAnswer>;

/// Accepted answer(s) for one question.
///
/// Serialized untagged: `"A"`, `["B", "C"]` or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyAnswer {
    /// Exactly one correct label
    Single(String),
    /// Any of these labels is correct
    AnyOf(BTreeSet<String>),
    /// The key sheet left this question unmarked; no answer is accepted
    Unmarked,
}

impl KeyAnswer {
    /// Build from an extracted key answer
    pub fn from_extracted(value: Option<&str>) -> Self {
        match value {
            Some(label) if !label.is_empty() => Self::Single(label.to_string()),
            _ => Self::Unmarked,
        }
    }

    /// Whether `label` is an accepted answer
    pub fn accepts(&self, label: &str) -> bool {
        match self {
            Self::Single(expected) => expected == label,
            Self::AnyOf(set) => set.contains(label),
            Self::Unmarked => false,
        }
    }
}

/// Decision taken for one question from its fill ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// No bubble reached the mark threshold
    Blank,
    /// Two bubbles are marked with nearly equal fill
    Multi,
    /// A single bubble is clearly marked
    Marked,
}

/// Fill statistics and decision for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleMetric {
    /// Fill ratio of each option, in label order
    pub fill_ratios: Vec<f32>,
    /// Index of the fullest option (first on ties)
    pub best_index: usize,
    /// Largest fill ratio
    pub best_value: f32,
    /// Runner-up fill ratio, 0 for a single option
    pub second_value: f32,
    /// Threshold the decision used
    pub mark_threshold: f32,
    /// Gap the decision used
    pub ambiguity_gap: f32,
    /// Resulting decision
    pub classification: Classification,
}

/// Per-question grading outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Correct,
    Wrong,
    Blank,
    Multi,
}

/// Key and student values of one graded question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub key_value: KeyAnswer,
    pub student_value: Option<String>,
    pub outcome: Outcome,
}

/// Aggregate comparison of one student against the key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub correct_count: usize,
    pub wrong_count: usize,
    pub blank_count: usize,
    pub multi_count: usize,
    /// Number of key questions graded
    pub total: usize,
    /// `100 * correct / total`, 0 when the key has no question
    pub score_percent: f64,
    pub per_question: BTreeMap<u32, QuestionOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_answer_json_forms() {
        let key: KeyMap = serde_json::from_str(r#"{"1":"A","2":["B","C"],"3":null}"#).unwrap();
        assert_eq!(key[&1], KeyAnswer::Single("A".into()));
        assert!(key[&2].accepts("C"));
        assert!(!key[&2].accepts("A"));
        assert_eq!(key[&3], KeyAnswer::Unmarked);
        assert!(!key[&3].accepts(""));
    }

    #[test]
    fn from_extracted_treats_empty_as_unmarked() {
        assert_eq!(KeyAnswer::from_extracted(Some("")), KeyAnswer::Unmarked);
        assert_eq!(KeyAnswer::from_extracted(None), KeyAnswer::Unmarked);
        assert_eq!(
            KeyAnswer::from_extracted(Some("D")),
            KeyAnswer::Single("D".into())
        );
    }

    #[test]
    fn outcome_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Outcome::Multi).unwrap(), "\"multi\"");
        assert_eq!(
            serde_json::to_string(&Classification::Marked).unwrap(),
            "\"marked\""
        );
    }
}
