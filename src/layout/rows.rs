use crate::detector::bubble::BubbleCandidate;

/// A row of bubbles being assembled, with its running mean centre y
#[derive(Debug, Clone, Default)]
pub struct RowAccumulator {
    sum_y: f32,
    items: Vec<BubbleCandidate>,
}

impl RowAccumulator {
    fn start(candidate: BubbleCandidate) -> Self {
        Self {
            sum_y: candidate.center.y,
            items: vec![candidate],
        }
    }

    /// Mean centre y of the row
    pub fn mean_y(&self) -> f32 {
        if self.items.is_empty() {
            return 0.0;
        }
        self.sum_y / self.items.len() as f32
    }

    fn accepts(&self, candidate: &BubbleCandidate, tolerance: f32) -> bool {
        (self.mean_y() - candidate.center.y).abs() <= tolerance
    }

    fn push(&mut self, candidate: BubbleCandidate) {
        self.sum_y += candidate.center.y;
        self.items.push(candidate);
    }

    /// Bubbles of the row
    pub fn items(&self) -> &[BubbleCandidate] {
        &self.items
    }

    /// Number of bubbles in the row
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True for a row without bubbles
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consume the row, yielding its bubbles
    pub fn into_items(self) -> Vec<BubbleCandidate> {
        self.items
    }
}

/// Group candidates (sorted by `(cy, cx)`) into rows.
///
/// Each candidate joins the first row whose mean y is within `tolerance`,
/// otherwise it starts a new row. Rows come back sorted by mean y with their
/// bubbles sorted left to right.
pub fn cluster_rows(candidates: &[BubbleCandidate], tolerance: f32) -> Vec<RowAccumulator> {
    let mut rows = candidates
        .iter()
        .cloned()
        .fold(Vec::<RowAccumulator>::new(), |mut rows, candidate| {
            match rows.iter_mut().find(|row| row.accepts(&candidate, tolerance)) {
                Some(row) => row.push(candidate),
                None => rows.push(RowAccumulator::start(candidate)),
            }
            rows
        });

    rows.sort_by(|a, b| a.mean_y().total_cmp(&b.mean_y()));
    for row in &mut rows {
        row.items.sort_by(|a, b| a.center.x.total_cmp(&b.center.x));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BoundingBox, Point};

    fn bubble(cx: f32, cy: f32) -> BubbleCandidate {
        BubbleCandidate {
            center: Point::new(cx, cy),
            bbox: BoundingBox::new(cx as i32 - 10, cy as i32 - 10, 20, 20),
            area: 300.0,
            circularity: 0.9,
        }
    }

    #[test]
    fn groups_by_running_mean() {
        let mut candidates = vec![
            bubble(100.0, 50.0),
            bubble(40.0, 52.0),
            bubble(70.0, 61.0),
            bubble(40.0, 120.0),
            bubble(70.0, 118.0),
        ];
        candidates.sort_by(|a, b| a.center.y.total_cmp(&b.center.y));

        let rows = cluster_rows(&candidates, 14.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 3);
        let xs: Vec<f32> = rows[0].items().iter().map(|b| b.center.x).collect();
        assert_eq!(xs, vec![40.0, 70.0, 100.0]);
        assert!((rows[0].mean_y() - 163.0 / 3.0).abs() < 1e-4);
        assert!(rows[1].mean_y() > rows[0].mean_y());
    }

    #[test]
    fn tolerance_is_inclusive() {
        let candidates = vec![bubble(10.0, 100.0), bubble(30.0, 114.0), bubble(50.0, 130.0)];
        let rows = cluster_rows(&candidates, 14.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 2);
    }

    #[test]
    fn empty_input_gives_no_rows() {
        assert!(cluster_rows(&[], 14.0).is_empty());
    }
}
