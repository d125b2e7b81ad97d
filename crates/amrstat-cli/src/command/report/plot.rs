//! PNG charts
//!
//! Bars and pie sectors are always drawn. Text (titles, axis labels,
//! legends) needs a font registered with [`register_font`]; without one the
//! text is skipped with a warning and the image is still written.

use std::{
    f64::consts::{FRAC_PI_2, TAU},
    fs,
    path::{Path, PathBuf},
};

use amrstat_analysis::{
    report::{Report, ReportItem},
    summary::{Outcome, RankedEntry},
};
use anyhow::Context;
use plotters::{
    coord::Shift,
    prelude::*,
    style::{FontStyle, register_font as register_font_data},
};

use crate::util;

pub(super) const BAR_CHART_FILE: &str = "resistance_bar_chart.png";

const FONT_FAMILY: &str = "sans-serif";
const BAR_COLOR: RGBColor = RGBColor(100, 149, 237);
const PIE_COLORS: [(Outcome, RGBColor); 3] = [
    (Outcome::Susceptible, RGBColor(60, 179, 113)),
    (Outcome::Intermediate, RGBColor(255, 215, 0)),
    (Outcome::Resistant, RGBColor(255, 99, 71)),
];

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub(super) enum PlotError {
    #[display("drawing area error: {_0}")]
    DrawingArea(#[error(not(source))] String),
    #[display("chart configuration error: {_0}")]
    ChartConfig(#[error(not(source))] String),
    #[display("drawing error: {_0}")]
    Drawing(#[error(not(source))] String),
    #[display("nothing to plot")]
    InvalidData,
}

/// Makes the font at `path` available for chart text.
pub(super) fn register_font(path: &Path) -> anyhow::Result<()> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read font file: {}", path.display()))?;
    // Fonts stay registered for the rest of the process.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    register_font_data(FONT_FAMILY, FontStyle::Normal, bytes)
        .map_err(|_| anyhow::anyhow!("Invalid font file: {}", path.display()))
}

/// Writes the ranking bar chart and the outcome pie chart of `drug` under
/// `dir`.
///
/// The pie chart is only written if `drug` is in the report and has
/// isolates.
pub(super) fn save_chart_images(
    dir: &Path,
    report: &Report,
    drug: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create chart directory: {}", dir.display()))?;
    let mut saved = vec![];

    if let Some(summary) = &report.panel_summary {
        let path = dir.join(BAR_CHART_FILE);
        draw_bar_chart(&path, &summary.ranking)
            .with_context(|| format!("Failed to draw chart: {}", path.display()))?;
        saved.push(path);
    }

    match report.item(drug) {
        Some(item) if item.overall.breakdown.total() > 0 => {
            let path = dir.join(format!("{}_pie_chart.png", util::file_slug(drug)));
            draw_pie_chart(&path, item)
                .with_context(|| format!("Failed to draw chart: {}", path.display()))?;
            saved.push(path);
        }
        Some(_) => log::warn!("no isolates for {drug}; pie chart skipped"),
        None => {}
    }

    Ok(saved)
}

/// Horizontal bar per antibiotic, most resistant at the top.
pub(super) fn draw_bar_chart(path: &Path, ranking: &[RankedEntry]) -> Result<(), PlotError> {
    if ranking.is_empty() {
        return Err(PlotError::InvalidData);
    }
    let rows = ranking.len();
    let root = BitMapBackend::new(path, (1200, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .margin_top(70)
        .x_label_area_size(60)
        .y_label_area_size(240)
        .build_cartesian_2d(0.0..100.0, (0..rows).into_segmented())
        .map_err(|e| PlotError::ChartConfig(e.to_string()))?;

    // Row 0 is the bottom of the chart.
    let entry_at = |row: usize| rows.checked_sub(row + 1).and_then(|i| ranking.get(i));
    let mesh = chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(rows)
        .y_label_formatter(&|value: &SegmentValue<usize>| match value {
            SegmentValue::CenterOf(row) => {
                entry_at(*row).map_or(String::new(), |e| e.category.clone())
            }
            _ => String::new(),
        })
        .x_desc("Isolates resistant (%)")
        .label_style((FONT_FAMILY, 18))
        .axis_desc_style((FONT_FAMILY, 20))
        .draw()
        .map_err(|e| PlotError::Drawing(e.to_string()));
    warn_missing_text(path, mesh);

    chart
        .draw_series(ranking.iter().enumerate().map(|(rank, entry)| {
            let row = rows - 1 - rank;
            let mut bar = Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(row)),
                    (entry.percent.clamp(0.0, 100.0), SegmentValue::Exact(row + 1)),
                ],
                BAR_COLOR.filled(),
            );
            bar.set_margin(6, 6, 0, 0);
            bar
        }))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;

    let title = root
        .draw(&Text::new(
            "Resistance by antibiotic",
            (20, 20),
            (FONT_FAMILY, 30).into_font(),
        ))
        .map_err(|e| PlotError::Drawing(e.to_string()));
    warn_missing_text(path, title);

    root.present().map_err(|e| PlotError::DrawingArea(e.to_string()))?;
    Ok(())
}

/// Pie of the S/I/R shares of one item, with a legend.
pub(super) fn draw_pie_chart(path: &Path, item: &ReportItem) -> Result<(), PlotError> {
    let breakdown = &item.overall.breakdown;
    if breakdown.total() == 0 {
        return Err(PlotError::InvalidData);
    }
    let root = BitMapBackend::new(path, (800, 800)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| PlotError::DrawingArea(e.to_string()))?;

    let center = (330, 430);
    let radius = 280.0;
    // Clockwise from twelve o'clock.
    let mut start = -FRAC_PI_2;
    for (outcome, color) in PIE_COLORS {
        let share = breakdown.share(outcome.code()).unwrap_or(0.0);
        let end = start + share / 100.0 * TAU;
        if share > 0.0 {
            root.draw(&Polygon::new(sector(center, radius, start, end), color.filled()))
                .map_err(|e| PlotError::Drawing(e.to_string()))?;
        }
        start = end;
    }

    for (row, (_, color)) in (0..).zip(PIE_COLORS) {
        let top = 640 + row * 36;
        root.draw(&Rectangle::new([(630, top), (654, top + 24)], color.filled()))
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
    }
    warn_missing_text(path, draw_pie_text(&root, item));

    root.present().map_err(|e| PlotError::DrawingArea(e.to_string()))?;
    Ok(())
}

fn draw_pie_text(
    root: &DrawingArea<BitMapBackend<'_>, Shift>,
    item: &ReportItem,
) -> Result<(), PlotError> {
    let title = format!("{}: outcome distribution", item.category);
    root.draw(&Text::new(title, (20, 20), (FONT_FAMILY, 30).into_font()))
        .map_err(|e| PlotError::Drawing(e.to_string()))?;
    for (row, (outcome, _)) in (0..).zip(PIE_COLORS) {
        let percent = item.overall.breakdown.share(outcome.code()).unwrap_or(0.0);
        let label = format!("{outcome} ({percent:.1}%)");
        let top = 640 + row * 36;
        root.draw(&Text::new(label, (662, top), (FONT_FAMILY, 18).into_font()))
            .map_err(|e| PlotError::Drawing(e.to_string()))?;
    }
    Ok(())
}

fn warn_missing_text(path: &Path, result: Result<(), PlotError>) {
    if let Err(err) = result {
        log::warn!(
            "{}: chart text not drawn ({err}); pass --chart-font to label charts",
            path.display()
        );
    }
}

/// Outline of a pie sector in pixels, angles in radians.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn sector(center: (i32, i32), radius: f64, start: f64, end: f64) -> Vec<(i32, i32)> {
    // One vertex per degree of arc.
    let steps = ((end - start).to_degrees().ceil() as usize).max(1);
    let mut points = Vec::with_capacity(steps + 2);
    points.push(center);
    points.extend((0..=steps).map(|step| {
        let angle = start + (end - start) * step as f64 / steps as f64;
        (
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 + (radius * angle.sin()).round() as i32,
        )
    }));
    points
}

#[cfg(test)]
mod tests {
    use amrstat_analysis::{dataset::Dataset, report::ReportBuilder};

    use super::*;

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn study_report() -> Report {
        ReportBuilder::default()
            .build_dataset(&Dataset::study())
            .unwrap()
    }

    fn assert_png(path: &Path) {
        let bytes = fs::read(path).unwrap();
        assert!(
            bytes.starts_with(PNG_SIGNATURE),
            "{} is not a PNG",
            path.display()
        );
    }

    #[test]
    fn test_save_chart_images() {
        let dir = tempfile::tempdir().unwrap();
        let report = study_report();
        let saved = save_chart_images(dir.path(), &report, "Colistin").unwrap();
        assert_eq!(
            saved,
            [
                dir.path().join(BAR_CHART_FILE),
                dir.path().join("colistin_pie_chart.png"),
            ]
        );
        for path in &saved {
            assert_png(path);
        }
    }

    #[test]
    fn test_save_chart_images_skips_unknown_drug() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_chart_images(dir.path(), &study_report(), "Unknown").unwrap();
        assert_eq!(saved, [dir.path().join(BAR_CHART_FILE)]);
    }

    #[test]
    fn test_bar_chart_rejects_empty_ranking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let result = draw_bar_chart(&path, &[]);
        assert!(matches!(result, Err(PlotError::InvalidData)));
        assert!(!path.exists());
    }

    #[test]
    fn test_single_outcome_pie_is_full_circle() {
        let points = sector((0, 0), 10.0, -FRAC_PI_2, -FRAC_PI_2 + TAU);
        assert_eq!(points[0], (0, 0));
        assert_eq!(points[1], (0, -10));
        assert_eq!(*points.last().unwrap(), (0, -10));
        assert!(points.len() >= 2 + 360);
    }
}
