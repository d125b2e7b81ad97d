use std::{
    fmt::{self, Write as _},
    fs,
    path::{Path, PathBuf},
};

use amrstat_analysis::{
    report::{Report, ReportItem},
    summary::{Outcome, RankedEntry},
};
use anyhow::Context;

use crate::util;

/// Width of a full (100%) bar in characters.
pub(super) const BAR_WIDTH: usize = 50;

const BAR_FILL: char = '█';
const OUTCOME_FILLS: [(Outcome, char); 3] = [
    (Outcome::Susceptible, '█'),
    (Outcome::Intermediate, '▒'),
    (Outcome::Resistant, '░'),
];

/// Horizontal bar per antibiotic, most resistant first.
pub(super) fn render_bar_chart(
    ranking: &[RankedEntry],
    width: usize,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for entry in ranking {
        let bar = BAR_FILL.to_string().repeat(scaled(entry.percent, width));
        writeln!(
            out,
            "  {:<26} |{bar:<width$}| {:>5.1}%",
            entry.category, entry.percent
        )?;
    }
    Ok(out)
}

/// Stacked S/I/R bar of one antibiotic with a legend.
pub(super) fn render_distribution(
    item: &ReportItem,
    width: usize,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let Ok(percentages) = &item.overall.percentages else {
        writeln!(out, "  (no isolates)")?;
        return Ok(out);
    };

    let breakdown = &item.overall.breakdown;
    let mut bar = String::new();
    let mut cumulative = 0.0;
    let mut filled = 0;
    for (outcome, fill) in OUTCOME_FILLS {
        cumulative += breakdown.share(outcome.code()).unwrap_or(0.0);
        // Round the running total so segments always add up to `width`.
        let end = scaled(cumulative, width);
        bar.extend(std::iter::repeat_n(fill, end.saturating_sub(filled)));
        filled = filled.max(end);
    }
    writeln!(out, "  |{bar:<width$}|")?;

    for (outcome, fill) in OUTCOME_FILLS {
        let percent = percentages
            .iter()
            .find(|(label, _)| label == outcome.code())
            .map_or(0.0, |(_, p)| *p);
        writeln!(out, "  {fill} {outcome} ({percent:.1}%)")?;
    }
    Ok(out)
}

/// Writes the data behind both charts as CSV files under `dir`.
///
/// The distribution file is only written if `drug` is in the report.
pub(super) fn save_chart_data(
    dir: &Path,
    report: &Report,
    drug: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create chart directory: {}", dir.display()))?;
    let mut saved = vec![];

    if let Some(summary) = &report.panel_summary {
        let csv_path = dir.join("resistance_by_drug.csv");
        let mut csv_content = String::from("antibiotic,percent_resistant\n");
        for entry in &summary.ranking {
            writeln!(
                &mut csv_content,
                "{},{:.1}",
                csv_field(&entry.category),
                entry.percent
            )
            .with_context(|| format!("Failed to write CSV data for {}", entry.category))?;
        }
        fs::write(&csv_path, csv_content)
            .with_context(|| format!("Failed to write CSV file: {}", csv_path.display()))?;
        saved.push(csv_path);
    }

    if let Some(item) = report.item(drug) {
        let csv_path = dir.join(format!("{}_distribution.csv", util::file_slug(drug)));
        let mut csv_content = String::from("outcome,count,percent\n");
        for outcome in Outcome::ALL {
            let count = item.overall.breakdown.count(outcome.code()).unwrap_or(0);
            let percent = item
                .overall
                .percentages
                .as_ref()
                .ok()
                .and_then(|ps| ps.iter().find(|(label, _)| label == outcome.code()))
                .map_or(String::new(), |(_, p)| format!("{p:.1}"));
            writeln!(&mut csv_content, "{outcome},{count},{percent}")
                .with_context(|| format!("Failed to write CSV data for {outcome}"))?;
        }
        fs::write(&csv_path, csv_content)
            .with_context(|| format!("Failed to write CSV file: {}", csv_path.display()))?;
        saved.push(csv_path);
    }

    Ok(saved)
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn scaled(percent: f64, width: usize) -> usize {
    let cells = (percent.clamp(0.0, 100.0) / 100.0 * width as f64).round();
    cells as usize
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use amrstat_analysis::{dataset::Dataset, report::ReportBuilder};

    use super::*;

    fn study_report() -> Report {
        ReportBuilder::default()
            .build_dataset(&Dataset::study())
            .unwrap()
    }

    #[test]
    fn test_bar_chart_scales_to_width() {
        let ranking = [
            RankedEntry {
                category: "Full".to_owned(),
                percent: 100.0,
            },
            RankedEntry {
                category: "Half".to_owned(),
                percent: 50.0,
            },
        ];
        let text = render_bar_chart(&ranking, 10).unwrap();
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines[0].matches(BAR_FILL).count(), 10);
        assert_eq!(lines[1].matches(BAR_FILL).count(), 5);
        assert!(lines[1].ends_with(" 50.0%"));
    }

    #[test]
    fn test_distribution_segments_fill_width() {
        let report = study_report();
        let text = render_distribution(report.item("Colistin").unwrap(), 40).unwrap();
        let bar = text.lines().next().unwrap();
        assert_eq!(bar.chars().filter(|c| "█▒░".contains(*c)).count(), 40);
        assert!(text.contains("Susceptible (91.5%)"));
        assert!(text.contains("Intermediate (5.9%)"));
        assert!(text.contains("Resistant (2.5%)"));
    }

    #[test]
    fn test_save_chart_data() {
        let dir = tempfile::tempdir().unwrap();
        let report = study_report();
        let saved = save_chart_data(dir.path(), &report, "Piperacillin-Tazobactam").unwrap();
        assert_eq!(saved.len(), 2);

        let ranking = fs::read_to_string(dir.path().join("resistance_by_drug.csv")).unwrap();
        let lines = ranking.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "antibiotic,percent_resistant");
        assert_eq!(lines.len(), 1 + 14);
        assert_eq!(*lines.last().unwrap(), "Colistin,2.5");

        let distribution =
            fs::read_to_string(dir.path().join("piperacillin_tazobactam_distribution.csv"))
                .unwrap();
        assert_eq!(
            distribution,
            "outcome,count,percent\nSusceptible,0,0.0\nIntermediate,0,0.0\nResistant,118,100.0\n"
        );
    }

    #[test]
    fn test_save_chart_data_skips_unknown_drug() {
        let dir = tempfile::tempdir().unwrap();
        let saved = save_chart_data(dir.path(), &study_report(), "Unknown").unwrap();
        assert_eq!(saved, [dir.path().join("resistance_by_drug.csv")]);
    }

    #[test]
    fn test_csv_field_quoting() {
        assert_eq!(csv_field("Colistin"), "Colistin");
        assert_eq!(csv_field("A, B"), "\"A, B\"");
    }
}
