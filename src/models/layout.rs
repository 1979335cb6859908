use crate::error::{OmrError, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in canonical image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}

impl BoundingBox {
    /// Create a new box
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Centre of the box
    pub fn center(&self) -> (f32, f32) {
        (
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }
}

/// The ordered option boxes of one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionLayout {
    /// 1-based question number in reading order
    pub question_id: u32,
    /// One box per option label, left to right
    pub option_boxes: Vec<BoundingBox>,
}

#[derive(Deserialize)]
struct RawLayout {
    questions: Vec<QuestionLayout>,
    option_labels: Vec<String>,
}

/// Bubble template learned from the key sheet.
///
/// A layout is validated on construction and has no mutating API, so a
/// single instance can be shared by every extraction in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLayout")]
pub struct Layout {
    questions: Vec<QuestionLayout>,
    option_labels: Vec<String>,
}

impl TryFrom<RawLayout> for Layout {
    type Error = OmrError;

    fn try_from(raw: RawLayout) -> Result<Self> {
        Self::new(raw.questions, raw.option_labels)
    }
}

impl Layout {
    /// Build a layout, checking that ids ascend and every question has one
    /// box per label.
    pub fn new(questions: Vec<QuestionLayout>, option_labels: Vec<String>) -> Result<Self> {
        let mut previous = 0u32;
        for q in &questions {
            if q.question_id <= previous {
                return Err(OmrError::config(format!(
                    "question ids must ascend from 1, got {} after {}",
                    q.question_id, previous
                )));
            }
            if q.option_boxes.len() != option_labels.len() {
                return Err(OmrError::config(format!(
                    "question {} has {} boxes for {} labels",
                    q.question_id,
                    q.option_boxes.len(),
                    option_labels.len()
                )));
            }
            previous = q.question_id;
        }
        Ok(Self {
            questions,
            option_labels,
        })
    }

    /// Questions in ascending id order
    pub fn questions(&self) -> &[QuestionLayout] {
        &self.questions
    }

    /// Labels shared by every question
    pub fn option_labels(&self) -> &[String] {
        &self.option_labels
    }

    /// Number of questions
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// True when no question was learned
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["A".into(), "B".into()]
    }

    fn question(id: u32, boxes: usize) -> QuestionLayout {
        QuestionLayout {
            question_id: id,
            option_boxes: (0..boxes)
                .map(|i| BoundingBox::new(i as i32 * 30, 0, 20, 20))
                .collect(),
        }
    }

    #[test]
    fn accepts_well_formed_layout() {
        let layout = Layout::new(vec![question(1, 2), question(2, 2)], labels()).unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.option_labels(), &["A", "B"]);
    }

    #[test]
    fn rejects_box_count_mismatch() {
        assert!(Layout::new(vec![question(1, 3)], labels()).is_err());
    }

    #[test]
    fn rejects_unordered_ids() {
        assert!(Layout::new(vec![question(2, 2), question(1, 2)], labels()).is_err());
        assert!(Layout::new(vec![question(0, 2)], labels()).is_err());
    }

    #[test]
    fn deserialization_enforces_invariants() {
        let ok = r#"{"questions":[{"question_id":1,"option_boxes":[
            {"x":0,"y":0,"width":10,"height":10},{"x":20,"y":0,"width":10,"height":10}]}],
            "option_labels":["A","B"]}"#;
        let layout: Layout = serde_json::from_str(ok).unwrap();
        assert_eq!(layout.questions()[0].option_boxes[1].x, 20);

        let bad = r#"{"questions":[{"question_id":1,"option_boxes":[]}],"option_labels":["A"]}"#;
        assert!(serde_json::from_str::<Layout>(bad).is_err());
    }

    #[test]
    fn box_center() {
        assert_eq!(BoundingBox::new(10, 20, 5, 8).center(), (12.5, 24.0));
    }
}
