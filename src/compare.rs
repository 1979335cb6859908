//! Comparison of student answers against the key

use crate::extract::Extraction;
use crate::models::{
    AnswerMap, ComparisonResult, KeyAnswer, KeyMap, Outcome, QuestionOutcome,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

/// How ambiguous (multi-marked) student answers are scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiPolicy {
    /// Ambiguous answers count as blank; `multi_count` stays zero
    #[default]
    FoldIntoBlank,
    /// Ambiguous answers are reported as [`Outcome::Multi`]
    CountSeparately,
}

/// Turn the answers read from the key sheet into a key map.
///
/// Questions the key left blank or ambiguous become [`KeyAnswer::Unmarked`]:
/// they still count towards the total but accept no answer.
pub fn key_from_answers(answers: &AnswerMap) -> KeyMap {
    answers
        .iter()
        .map(|(&id, value)| {
            let key = KeyAnswer::from_extracted(value.as_deref());
            if key == KeyAnswer::Unmarked {
                warn!(question = id, "key sheet has no clear mark for question");
            }
            (id, key)
        })
        .collect()
}

fn grade(
    student: &AnswerMap,
    key: &KeyMap,
    policy: MultiPolicy,
    multi: &BTreeSet<u32>,
) -> ComparisonResult {
    let mut result = ComparisonResult::default();

    for (&id, key_value) in key {
        let student_value = student
            .get(&id)
            .cloned()
            .flatten()
            .filter(|label| !label.is_empty());

        let outcome = match &student_value {
            None if policy == MultiPolicy::CountSeparately && multi.contains(&id) => {
                Outcome::Multi
            }
            None => Outcome::Blank,
            Some(label) if key_value.accepts(label) => Outcome::Correct,
            Some(_) => Outcome::Wrong,
        };

        match outcome {
            Outcome::Correct => result.correct_count += 1,
            Outcome::Wrong => result.wrong_count += 1,
            Outcome::Blank => result.blank_count += 1,
            Outcome::Multi => result.multi_count += 1,
        }

        result.per_question.insert(
            id,
            QuestionOutcome {
                key_value: key_value.clone(),
                student_value,
                outcome,
            },
        );
    }

    result.total = key.len();
    result.score_percent = if result.total > 0 {
        100.0 * result.correct_count as f64 / result.total as f64
    } else {
        0.0
    };
    result
}

/// Compare an answer map against the key.
///
/// A plain answer map carries no ambiguity information, so unanswered
/// questions are always blank here; use [`compare_extraction`] to let
/// [`MultiPolicy::CountSeparately`] see the extractor's decisions.
pub fn compare(student: &AnswerMap, key: &KeyMap, policy: MultiPolicy) -> ComparisonResult {
    grade(student, key, policy, &BTreeSet::new())
}

/// Compare an extraction against the key, honouring the multi policy
pub fn compare_extraction(
    extraction: &Extraction,
    key: &KeyMap,
    policy: MultiPolicy,
) -> ComparisonResult {
    let multi: BTreeSet<u32> = extraction.multi_questions().collect();
    grade(&extraction.answers, key, policy, &multi)
}
