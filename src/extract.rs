//! Mark extraction: fill ratios per bubble and the per-question decision

use crate::config::{BinarizeConfig, ExtractConfig};
use crate::models::{
    AnswerMap, BitMatrix, BoundingBox, BubbleMetric, Classification, Layout,
};
use crate::utils::binarization::sheet_binarize;
use image::RgbImage;
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::BTreeMap;
use tracing::debug;

/// Answers and metrics of one sheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Chosen label per question, `None` for blank or ambiguous
    pub answers: AnswerMap,
    /// Fill statistics per question
    pub metrics: BTreeMap<u32, BubbleMetric>,
}

impl Extraction {
    /// Questions whose marks were ambiguous
    pub fn multi_questions(&self) -> impl Iterator<Item = u32> + '_ {
        self.metrics
            .iter()
            .filter(|(_, m)| m.classification == Classification::Multi)
            .map(|(id, _)| *id)
    }
}

/// Fraction of foreground pixels inside the circle inscribed in the padded
/// bubble box. Always in `[0, 1]`; an empty circle yields 0.
pub fn fill_ratio(binary: &BitMatrix, bbox: &BoundingBox, config: &ExtractConfig) -> f32 {
    let (width, height) = (binary.width() as i64, binary.height() as i64);
    let short_side = bbox.width.min(bbox.height) as f32;
    let pad = ((short_side * config.padding_ratio) as i64).max(1);

    let xs = (bbox.x as i64 - pad).max(0);
    let ys = (bbox.y as i64 - pad).max(0);
    let xe = (bbox.x as i64 + bbox.width as i64 + pad).min(width);
    let ye = (bbox.y as i64 + bbox.height as i64 + pad).min(height);
    let (pw, ph) = (xe - xs, ye - ys);
    if pw <= 0 || ph <= 0 {
        return 0.0;
    }

    let radius = pw.min(ph) / 2 - config.mask_inset as i64;
    if radius < 0 {
        return 0.0;
    }
    let (cx, cy) = (pw / 2, ph / 2);
    let r2 = radius * radius;

    let mut filled = 0u32;
    let mut total = 0u32;
    for dy in -radius..=radius {
        let py = cy + dy;
        if py < 0 || py >= ph {
            continue;
        }
        for dx in -radius..=radius {
            let px = cx + dx;
            if px < 0 || px >= pw || dx * dx + dy * dy > r2 {
                continue;
            }
            total += 1;
            if binary.get((xs + px) as usize, (ys + py) as usize) {
                filled += 1;
            }
        }
    }

    if total == 0 {
        return 0.0;
    }
    filled as f32 / total as f32
}

/// Apply the two-threshold decision rule to one question's fill ratios
pub fn classify(fill_ratios: Vec<f32>, config: &ExtractConfig) -> BubbleMetric {
    let (best_index, best_value) = fill_ratios.iter().copied().enumerate().fold(
        (0usize, f32::NEG_INFINITY),
        |(bi, bv), (i, v)| if v > bv { (i, v) } else { (bi, bv) },
    );
    let best_value = if fill_ratios.is_empty() { 0.0 } else { best_value };

    let mut sorted = fill_ratios.clone();
    sorted.sort_by(|a, b| b.total_cmp(a));
    let second_value = sorted.get(1).copied().unwrap_or(0.0);

    let classification = if best_value < config.mark_threshold {
        Classification::Blank
    } else if best_value - second_value < config.ambiguity_gap
        && second_value >= config.mark_threshold
    {
        Classification::Multi
    } else {
        Classification::Marked
    };

    BubbleMetric {
        fill_ratios,
        best_index,
        best_value,
        second_value,
        mark_threshold: config.mark_threshold,
        ambiguity_gap: config.ambiguity_gap,
        classification,
    }
}

/// Read every question of `layout` from an aligned sheet.
///
/// Without a binarization map one is computed with the default sheet
/// binarization.
pub fn extract(
    aligned: &RgbImage,
    layout: &Layout,
    binarization: Option<&BitMatrix>,
    config: &ExtractConfig,
) -> Extraction {
    let binary: Cow<'_, BitMatrix> = match binarization {
        Some(map) => Cow::Borrowed(map),
        None => Cow::Owned(sheet_binarize(aligned, &BinarizeConfig::default())),
    };

    let labels = layout.option_labels();
    let per_question: Vec<(u32, Option<String>, BubbleMetric)> = layout
        .questions()
        .par_iter()
        .map(|question| {
            let ratios = question
                .option_boxes
                .iter()
                .map(|bbox| fill_ratio(&binary, bbox, config))
                .collect();
            let metric = classify(ratios, config);
            let answer = match metric.classification {
                Classification::Marked => labels.get(metric.best_index).cloned(),
                Classification::Blank | Classification::Multi => None,
            };
            (question.question_id, answer, metric)
        })
        .collect();

    let mut extraction = Extraction::default();
    for (id, answer, metric) in per_question {
        extraction.answers.insert(id, answer);
        extraction.metrics.insert(id, metric);
    }

    debug!(
        questions = extraction.answers.len(),
        marked = extraction.answers.values().filter(|a| a.is_some()).count(),
        "marks extracted"
    );
    extraction
}
