//! Result writers and the debug overlay

use crate::align::AlignStrategy;
use crate::error::Result;
use crate::models::{BubbleMetric, Classification, Layout, QuestionOutcome};
use crate::pipeline::{SheetMeta, StudentResult, SummaryRow};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

const CSV_HEADER: &str = "student,score,correct,wrong,blank,multi,total";

const MARKED: Rgb<u8> = Rgb([0, 255, 0]);
const MULTI: Rgb<u8> = Rgb([255, 255, 0]);
const BLANK: Rgb<u8> = Rgb([0, 0, 255]);
const OTHER: Rgb<u8> = Rgb([200, 200, 200]);

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write summary rows as CSV to any writer
pub fn write_summary_csv_to<W: Write>(mut out: W, rows: &[SummaryRow]) -> Result<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for row in rows {
        writeln!(
            out,
            "{},{:.1},{},{},{},{},{}",
            csv_field(&row.student),
            row.score,
            row.correct,
            row.wrong,
            row.blank,
            row.multi,
            row.total
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Write the class summary as CSV, score with one decimal
pub fn write_summary_csv<P: AsRef<Path>>(path: P, rows: &[SummaryRow]) -> Result<()> {
    let file = File::create(path)?;
    write_summary_csv_to(BufWriter::new(file), rows)
}

/// Write the class summary as a pretty JSON array
pub fn write_summary_json<P: AsRef<Path>>(path: P, rows: &[SummaryRow]) -> Result<()> {
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, rows)?;
    out.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct StudentReport<'a> {
    meta: &'a SheetMeta,
    student: &'a str,
    strategy: AlignStrategy,
    summary: SummaryRow,
    questions: &'a BTreeMap<u32, QuestionOutcome>,
}

/// Write one student's detailed report: metadata, totals and the
/// per-question table. Missing parent directories are created, so names
/// like `class_a/maria` land in their own subdirectory.
pub fn write_student_json<P: AsRef<Path>>(
    path: P,
    result: &StudentResult,
    meta: &SheetMeta,
) -> Result<()> {
    let report = StudentReport {
        meta,
        student: &result.name,
        strategy: result.strategy,
        summary: SummaryRow::from(result),
        questions: &result.comparison.per_question,
    };
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, &report)?;
    out.flush()?;
    Ok(())
}

/// Ring every bubble of the layout on a copy of the aligned sheet.
///
/// The chosen bubble of each question is drawn green when marked, yellow
/// when ambiguous and blue when blank; the other bubbles are grey.
pub fn render_debug_overlay(
    aligned: &RgbImage,
    layout: &Layout,
    metrics: &BTreeMap<u32, BubbleMetric>,
) -> RgbImage {
    let mut canvas = aligned.clone();

    for question in layout.questions() {
        let metric = metrics.get(&question.question_id);
        for (index, bbox) in question.option_boxes.iter().enumerate() {
            let (cx, cy) = bbox.center();
            let center = (cx.round() as i32, cy.round() as i32);
            let radius = bbox.width.max(bbox.height) / 2;

            match metric {
                Some(m) if m.best_index == index => {
                    let color = match m.classification {
                        Classification::Marked => MARKED,
                        Classification::Multi => MULTI,
                        Classification::Blank => BLANK,
                    };
                    draw_hollow_circle_mut(&mut canvas, center, radius, color);
                    if radius > 1 {
                        draw_hollow_circle_mut(&mut canvas, center, radius - 1, color);
                    }
                }
                _ => draw_hollow_circle_mut(&mut canvas, center, radius, OTHER),
            }
        }
    }

    canvas
}
