//! Report tables
//!
//! Each function renders one section of the report as fixed-width text.

use std::fmt::{self, Write as _};

use amrstat_analysis::{
    report::{ItemBreakdown, Report, ReportItem},
    summary::{Outcome, PanelSummary},
};
use amrstat_stats::association::TestResult;

/// Pooled S/I/R counts and percentages per antibiotic.
pub(super) fn render_profile(report: &Report) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "Overall resistance profile")?;
    writeln!(
        out,
        "  {:<26} {:>6} {:>6} {:>6} {:>7} {:>7} {:>7}",
        "Antibiotic", "R", "I", "S", "%R", "%I", "%S"
    )?;
    writeln!(out, "  {}", "-".repeat(71))?;

    for item in report.antibiotics() {
        let breakdown = &item.overall.breakdown;
        let count = |outcome: Outcome| breakdown.count(outcome.code()).unwrap_or(0);
        let percent = |outcome: Outcome| percent_str(&item.overall, outcome.code());
        writeln!(
            out,
            "  {:<26} {:>6} {:>6} {:>6} {:>7} {:>7} {:>7}",
            item.category,
            count(Outcome::Resistant),
            count(Outcome::Intermediate),
            count(Outcome::Susceptible),
            percent(Outcome::Resistant),
            percent(Outcome::Intermediate),
            percent(Outcome::Susceptible),
        )?;
    }
    Ok(out)
}

/// Mean, highest, and lowest resistance across the panel.
pub(super) fn render_panel_summary(summary: &PanelSummary) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(
        out,
        "Mean percent resistance across drugs: {:.1}%",
        summary.resistance.mean
    )?;
    writeln!(
        out,
        "Median: {:.1}%, standard deviation: {:.1}",
        summary.resistance.median, summary.resistance.std_dev
    )?;
    if let Some(highest) = summary.highest() {
        writeln!(
            out,
            "Highest resistance: {} ({:.1}%)",
            highest.category, highest.percent
        )?;
    }
    if let Some(lowest) = summary.lowest() {
        writeln!(
            out,
            "Lowest resistance: {} ({:.1}%)",
            lowest.category, lowest.percent
        )?;
    }
    Ok(out)
}

/// Association test per item, with per-hospital resistance for antibiotics.
///
/// The `R/non-R p` column is the resistant vs non-resistant comparison; the
/// remaining columns describe the test on the full outcome table.
pub(super) fn render_association_tests(report: &Report) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let alpha = report.options.association.alpha;
    writeln!(out, "Association with hospital (alpha = {alpha})")?;

    let hospital_cols = report
        .hospitals
        .iter()
        .map(|h| format!("{:>12}", format!("%R {}", truncate(h, 9))))
        .collect::<String>();
    writeln!(
        out,
        "  {:<26}{hospital_cols} {:>12} {:>13} {:>9} {:>4} {:>9}",
        "Category", "R/non-R p", "Test", "Statistic", "df", "p-value"
    )?;
    writeln!(
        out,
        "  {}",
        "-".repeat(26 + 12 * report.hospitals.len() + 51)
    )?;

    for item in &report.items {
        let resistance = hospital_resistance(item);
        let split = split_p_value(item);
        write!(out, "  {:<26}{resistance} {split:>12}", item.category)?;
        match &item.test {
            Ok(result) => writeln!(out, " {}", test_columns(result))?,
            Err(err) => writeln!(out, " N/A ({err})")?,
        }
    }
    Ok(out)
}

fn hospital_resistance(item: &ReportItem) -> String {
    item.by_hospital
        .iter()
        .map(|hospital| {
            let value = if item.kind.is_antibiotic() {
                percent_str(hospital, Outcome::Resistant.code())
            } else {
                String::new()
            };
            format!("{value:>12}")
        })
        .collect()
}

fn split_p_value(item: &ReportItem) -> String {
    match &item.resistance_split {
        Some(comparison) => match &comparison.test {
            Ok(result) => {
                let flag = if result.significant { " *" } else { "" };
                format!("{:.3}{flag}", result.p_value)
            }
            Err(_) => "N/A".to_string(),
        },
        None => "-".to_string(),
    }
}

fn test_columns(result: &TestResult) -> String {
    let statistic = result
        .statistic
        .map_or("-".to_string(), |s| format!("{s:.3}"));
    let dof = result
        .degrees_of_freedom
        .map_or("-".to_string(), |d| d.to_string());
    let flag = if result.significant { " *" } else { "" };
    format!(
        "{:>13} {statistic:>9} {dof:>4} {:>9.3}{flag}",
        result.test.to_string(),
        result.p_value
    )
}

fn percent_str(breakdown: &ItemBreakdown, label: &str) -> String {
    match &breakdown.percentages {
        Ok(percentages) => percentages
            .iter()
            .find(|(l, _)| l == label)
            .map_or("N/A".to_string(), |(_, p)| format!("{p:.1}%")),
        Err(_) => "N/A".to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
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
    fn test_profile_lists_every_antibiotic() {
        let report = study_report();
        let text = render_profile(&report).unwrap();
        assert!(text.contains("Doxycycline"));
        assert!(text.contains("91.5%"));
        // Header, separator, and one line per drug.
        assert_eq!(text.lines().count(), 3 + 14);
    }

    #[test]
    fn test_panel_summary_text() {
        let report = study_report();
        let text = render_panel_summary(report.panel_summary.as_ref().unwrap()).unwrap();
        assert!(text.contains("Highest resistance: Ceftriaxone (100.0%)"));
        assert!(text.contains("Lowest resistance: Colistin (2.5%)"));
    }

    #[test]
    fn test_association_table_marks_errors() {
        let report = study_report();
        let text = render_association_tests(&report).unwrap();
        let meropenem = text.lines().find(|l| l.contains("Meropenem")).unwrap();
        assert!(meropenem.contains("N/A (column 'S' has no observations)"));
        let sts = text.lines().find(|l| l.contains("Sequence types")).unwrap();
        assert!(sts.contains("Fisher exact"));
    }

    #[test]
    fn test_association_table_shows_resistance_split() {
        let report = study_report();
        let text = render_association_tests(&report).unwrap();
        assert!(text.contains("R/non-R p"));

        let ceftazidime = report.item("Ceftazidime").unwrap();
        let p_value = ceftazidime
            .resistance_split
            .as_ref()
            .unwrap()
            .test
            .as_ref()
            .unwrap()
            .p_value;
        let line = text.lines().find(|l| l.contains("Ceftazidime")).unwrap();
        assert!(line.contains(&format!("{p_value:.3}")));
        assert!(line.contains("N/A (column 'I' has no observations)"));
    }
}
