//! Per-category percentages and resistance ranking
//!
//! A [`CategoryBreakdown`] holds the outcome counts of one category (an
//! antibiotic, a hospital, or the sequence-type distribution). Percentages are
//! derived on demand and rounded to one decimal place.
//!
//! # Examples
//!
//! ```
//! use amrstat_analysis::summary::CategoryBreakdown;
//!
//! let breakdown = CategoryBreakdown::new("Doxycycline", [("S", 60), ("I", 8), ("R", 50)]);
//! assert_eq!(breakdown.total(), 118);
//!
//! let percentages = breakdown.percentages().unwrap();
//! assert_eq!(
//!     percentages,
//!     [("S".to_owned(), 50.8), ("I".to_owned(), 6.8), ("R".to_owned(), 42.4)]
//! );
//! ```

use std::{cmp::Ordering, vec};

use amrstat_stats::descriptive::DescriptiveStats;
use serde::Serialize;

/// Decimal places used for reported percentages.
pub const PERCENT_DECIMALS: i32 = 1;

/// Susceptibility outcome of an isolate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, derive_more::Display)]
pub enum Outcome {
    #[display("Susceptible")]
    Susceptible,
    #[display("Intermediate")]
    Intermediate,
    #[display("Resistant")]
    Resistant,
}

impl Outcome {
    pub const ALL: [Self; 3] = [Self::Susceptible, Self::Intermediate, Self::Resistant];

    /// Short label used as a table column.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Susceptible => "S",
            Self::Intermediate => "I",
            Self::Resistant => "R",
        }
    }
}

/// Percentages cannot be computed for a category without observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error)]
#[serde(tag = "kind")]
pub enum BreakdownError {
    #[display("category has no isolates")]
    EmptyCategory,
}

/// Outcome counts of a single category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryBreakdown {
    category: String,
    counts: Vec<(String, u64)>,
    total: u64,
}

impl CategoryBreakdown {
    pub fn new<S, I, L>(category: S, counts: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = (L, u64)>,
        L: Into<String>,
    {
        let counts = counts
            .into_iter()
            .map(|(label, count)| (label.into(), count))
            .collect::<Vec<_>>();
        let total = counts.iter().map(|(_, count)| count).sum();
        Self {
            category: category.into(),
            counts,
            total,
        }
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Counts per outcome label, in input order.
    #[must_use]
    pub fn counts(&self) -> &[(String, u64)] {
        &self.counts
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub fn count(&self, label: &str) -> Option<u64> {
        self.counts
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, count)| *count)
    }

    /// Unrounded percentage of `label`, or `None` if the label is unknown or
    /// the category is empty.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn share(&self, label: &str) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        self.count(label)
            .map(|count| count as f64 / self.total as f64 * 100.0)
    }

    /// Percentages per label, rounded to [`PERCENT_DECIMALS`] places.
    pub fn percentages(&self) -> Result<Vec<(String, f64)>, BreakdownError> {
        percentage_breakdown(&self.counts)
    }
}

/// Converts outcome counts into percentages of their total.
///
/// Fails with [`BreakdownError::EmptyCategory`] if every count is zero.
#[expect(clippy::cast_precision_loss)]
pub fn percentage_breakdown<L>(counts: &[(L, u64)]) -> Result<Vec<(String, f64)>, BreakdownError>
where
    L: AsRef<str>,
{
    let total = counts.iter().map(|(_, count)| count).sum::<u64>();
    if total == 0 {
        return Err(BreakdownError::EmptyCategory);
    }
    let percentages = counts
        .iter()
        .map(|(label, count)| {
            let percent = *count as f64 / total as f64 * 100.0;
            (label.as_ref().to_owned(), round_percentage(percent))
        })
        .collect();
    Ok(percentages)
}

/// Rounds a percentage to [`PERCENT_DECIMALS`] places.
#[must_use]
pub fn round_percentage(percent: f64) -> f64 {
    let scale = 10_f64.powi(PERCENT_DECIMALS);
    (percent * scale).round() / scale
}

/// A category with its resistance percentage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedCategory<'a> {
    pub category: &'a str,
    /// Unrounded percentage of resistant isolates.
    pub percent: f64,
}

/// Categories ordered by resistance, most resistant first.
///
/// Nothing is computed until the ranking is iterated, and it can be iterated
/// any number of times. Ties are broken by category name so that the order is
/// deterministic. Empty categories are left out.
#[derive(Debug, Clone, Copy)]
pub struct ResistanceRanking<'a> {
    breakdowns: &'a [CategoryBreakdown],
    resistant_label: &'a str,
}

/// Ranks `breakdowns` by the share of `resistant_label`.
///
/// # Examples
///
/// ```
/// use amrstat_analysis::summary::{CategoryBreakdown, rank_by_resistance};
///
/// let breakdowns = [
///     CategoryBreakdown::new("Doxycycline", [("S", 67), ("I", 6), ("R", 45)]),
///     CategoryBreakdown::new("Meropenem", [("S", 0), ("I", 0), ("R", 118)]),
///     CategoryBreakdown::new("Imipenem", [("S", 0), ("I", 0), ("R", 118)]),
/// ];
/// let ranking = rank_by_resistance(&breakdowns, "R");
/// let names = ranking.iter().map(|r| r.category).collect::<Vec<_>>();
/// assert_eq!(names, ["Imipenem", "Meropenem", "Doxycycline"]);
/// ```
#[must_use]
pub fn rank_by_resistance<'a>(
    breakdowns: &'a [CategoryBreakdown],
    resistant_label: &'a str,
) -> ResistanceRanking<'a> {
    ResistanceRanking {
        breakdowns,
        resistant_label,
    }
}

impl<'a> ResistanceRanking<'a> {
    #[must_use]
    pub fn iter(&self) -> vec::IntoIter<RankedCategory<'a>> {
        let mut ranked = self
            .breakdowns
            .iter()
            .filter_map(|b| {
                b.share(self.resistant_label).map(|percent| RankedCategory {
                    category: b.category(),
                    percent,
                })
            })
            .collect::<Vec<_>>();
        ranked.sort_by(compare_ranked);
        ranked.into_iter()
    }
}

impl<'a> IntoIterator for &ResistanceRanking<'a> {
    type Item = RankedCategory<'a>;
    type IntoIter = vec::IntoIter<RankedCategory<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn compare_ranked(a: &RankedCategory<'_>, b: &RankedCategory<'_>) -> Ordering {
    b.percent
        .total_cmp(&a.percent)
        .then_with(|| a.category.cmp(b.category))
}

/// A category and its resistance percentage, detached from the breakdowns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub category: String,
    pub percent: f64,
}

impl From<RankedCategory<'_>> for RankedEntry {
    fn from(ranked: RankedCategory<'_>) -> Self {
        Self {
            category: ranked.category.to_owned(),
            percent: ranked.percent,
        }
    }
}

/// Resistance summary across an antibiotic panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelSummary {
    /// Statistics of the per-drug resistance percentages.
    pub resistance: DescriptiveStats,
    /// Every drug with observations, most resistant first.
    pub ranking: Vec<RankedEntry>,
}

impl PanelSummary {
    /// Summarizes the panel, or returns `None` if no drug has observations.
    #[must_use]
    pub fn from_breakdowns(
        breakdowns: &[CategoryBreakdown],
        resistant_label: &str,
    ) -> Option<Self> {
        let ranking = rank_by_resistance(breakdowns, resistant_label)
            .iter()
            .map(RankedEntry::from)
            .collect::<Vec<_>>();
        let resistance = DescriptiveStats::new(ranking.iter().map(|entry| entry.percent))?;
        Some(Self {
            resistance,
            ranking,
        })
    }

    /// Most resistant drug. Ties go to the first name in lexicographic order.
    #[must_use]
    pub fn highest(&self) -> Option<&RankedEntry> {
        self.ranking.first()
    }

    /// Least resistant drug. Ties go to the last name in lexicographic order.
    #[must_use]
    pub fn lowest(&self) -> Option<&RankedEntry> {
        self.ranking.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_breakdown() {
        let counts = [("S", 60), ("I", 8), ("R", 50)];
        let percentages = percentage_breakdown(&counts).unwrap();
        assert_eq!(
            percentages,
            [
                ("S".to_owned(), 50.8),
                ("I".to_owned(), 6.8),
                ("R".to_owned(), 42.4)
            ]
        );
        let breakdown = CategoryBreakdown::new("x", counts);
        assert_eq!(breakdown.total(), 118);
    }

    #[test]
    fn test_percentages_sum_to_about_100() {
        let cases: [&[(&str, u64)]; 5] = [
            &[("S", 60), ("I", 8), ("R", 50)],
            &[("S", 1), ("I", 1), ("R", 1)],
            &[("S", 0), ("I", 0), ("R", 118)],
            &[("a", 2), ("b", 2), ("c", 1), ("d", 1), ("e", 1), ("f", 3), ("g", 7)],
            &[("S", 108), ("I", 7), ("R", 3)],
        ];
        for counts in cases {
            let percentages = percentage_breakdown(counts).unwrap();
            let sum = percentages.iter().map(|(_, p)| p).sum::<f64>();
            let tolerance = 0.05 * percentages.len() as f64 + 1e-9;
            assert!((sum - 100.0).abs() <= tolerance, "sum {sum} for {counts:?}");
            assert!(percentages.iter().all(|(_, p)| (0.0..=100.0).contains(p)));
        }
    }

    #[test]
    fn test_empty_category() {
        let breakdown = CategoryBreakdown::new("x", [("S", 0), ("I", 0), ("R", 0)]);
        assert_eq!(breakdown.percentages(), Err(BreakdownError::EmptyCategory));
        assert_eq!(breakdown.share("R"), None);
        assert_eq!(
            percentage_breakdown::<&str>(&[]),
            Err(BreakdownError::EmptyCategory)
        );
    }

    #[test]
    fn test_share_is_unrounded() {
        let breakdown = CategoryBreakdown::new("x", [("S", 1), ("R", 2)]);
        assert!((breakdown.share("R").unwrap() - 200.0 / 3.0).abs() < 1e-12);
        assert_eq!(breakdown.share("I"), None);
    }

    #[test]
    fn test_ranking_is_restartable_and_skips_empty() {
        let breakdowns = [
            CategoryBreakdown::new("B", [("S", 1), ("R", 1)]),
            CategoryBreakdown::new("Empty", [("S", 0), ("R", 0)]),
            CategoryBreakdown::new("A", [("S", 1), ("R", 1)]),
            CategoryBreakdown::new("C", [("S", 0), ("R", 3)]),
        ];
        let ranking = rank_by_resistance(&breakdowns, "R");
        let first = ranking.iter().map(|r| r.category).collect::<Vec<_>>();
        let second = (&ranking).into_iter().map(|r| r.category).collect::<Vec<_>>();
        assert_eq!(first, ["C", "A", "B"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_panel_summary() {
        let breakdowns = [
            CategoryBreakdown::new("Meropenem", [("S", 0), ("I", 0), ("R", 118)]),
            CategoryBreakdown::new("Doxycycline", [("S", 67), ("I", 6), ("R", 45)]),
            CategoryBreakdown::new("Amikacin", [("S", 10), ("I", 2), ("R", 106)]),
        ];
        let summary = PanelSummary::from_breakdowns(&breakdowns, "R").unwrap();
        assert_eq!(summary.highest().unwrap().category, "Meropenem");
        assert_eq!(summary.lowest().unwrap().category, "Doxycycline");
        let expected_mean = (100.0 + 45.0 / 118.0 * 100.0 + 106.0 / 118.0 * 100.0) / 3.0;
        assert!((summary.resistance.mean - expected_mean).abs() < 1e-9);
        assert_eq!(summary.resistance.count, 3);
    }

    #[test]
    fn test_panel_summary_of_empty_panel() {
        let breakdowns = [CategoryBreakdown::new("x", [("R", 0)])];
        assert!(PanelSummary::from_breakdowns(&breakdowns, "R").is_none());
    }

    #[test]
    fn test_hand_built_summary_without_ranking() {
        let summary = PanelSummary {
            resistance: DescriptiveStats::new([50.0]).unwrap(),
            ranking: vec![],
        };
        assert_eq!(summary.highest(), None);
        assert_eq!(summary.lowest(), None);
    }
}
