//! Report construction over a whole dataset
//!
//! [`ReportBuilder`] turns the raw counts into one [`ReportItem`] per antibiotic
//! plus a final item for the sequence-type distribution. Each item carries:
//!
//! - the pooled breakdown over all hospitals and one breakdown per hospital
//! - the hospital × outcome contingency table
//! - the association test result, or the reason no test could be run
//! - for antibiotics, a second comparison of resistant against non-resistant
//!   (S + I) isolates, which stays testable when one of S or I is empty
//!
//! # Error Policy
//!
//! Malformed input (unknown hospitals, negative counts, mismatched shapes) is
//! fatal and reported as [`ReportError`] before anything is computed. Problems
//! with the data of a single item, such as an outcome nobody had, are recorded
//! on that item and the remaining items are still processed.
//!
//! # Examples
//!
//! ```
//! use amrstat_analysis::{
//!     dataset::Dataset,
//!     report::{BuildOptions, ReportBuilder},
//! };
//!
//! let dataset = Dataset::study();
//! let report = ReportBuilder::new(BuildOptions::default())
//!     .build_dataset(&dataset)
//!     .unwrap();
//!
//! assert_eq!(report.items.len(), dataset.antibiotics.len() + 1);
//! assert_eq!(report.items[0].category, "Meropenem");
//! // Every Meropenem isolate is resistant, so no association can be tested.
//! assert!(report.items[0].error().is_some());
//! ```

use amrstat_stats::{
    association::{AssociationConfig, AssociationError, AssociationTest, TestResult},
    contingency::{ContingencyTable, TableError},
};
use serde::Serialize;

use crate::{
    dataset::{self, AntibioticCounts, Dataset, DatasetError, SequenceTypeCounts},
    summary::{BreakdownError, CategoryBreakdown, Outcome, PanelSummary},
};

/// Category name of the sequence-type item.
pub const SEQUENCE_TYPES_CATEGORY: &str = "Sequence types";

/// Column labels of the resistant vs non-resistant table.
pub const RESISTANCE_SPLIT_LABELS: [&str; 2] = ["R", "non-R"];

/// Fatal input errors; no report is produced.
#[derive(
    Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error, derive_more::From,
)]
pub enum ReportError {
    #[display("invalid dataset: {_0}")]
    Dataset(DatasetError),
    #[display("invalid counts for '{category}': {source}")]
    #[from(ignore)]
    Table { category: String, source: TableError },
}

/// Reason an item of the report is incomplete.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    derive_more::Display,
    derive_more::Error,
    derive_more::From,
)]
#[serde(untagged)]
pub enum ItemError {
    #[display("{_0}")]
    Association(AssociationError),
    #[display("{_0}")]
    Breakdown(BreakdownError),
}

/// What a report item describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Susceptibility to one antibiotic, hospital × {S, I, R}.
    Antibiotic,
    /// Distribution of sequence types, hospital × ST.
    SequenceTypes,
}

/// Options for [`ReportBuilder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BuildOptions {
    pub association: AssociationConfig,
}

/// A breakdown together with its percentages, if they could be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemBreakdown {
    pub breakdown: CategoryBreakdown,
    pub percentages: Result<Vec<(String, f64)>, BreakdownError>,
}

impl From<CategoryBreakdown> for ItemBreakdown {
    fn from(breakdown: CategoryBreakdown) -> Self {
        let percentages = breakdown.percentages();
        Self {
            breakdown,
            percentages,
        }
    }
}

/// A contingency table with the association test run on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub table: ContingencyTable,
    pub test: Result<TestResult, AssociationError>,
}

/// One analysed category of the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportItem {
    pub category: String,
    pub kind: ItemKind,
    /// Counts pooled over all hospitals.
    pub overall: ItemBreakdown,
    /// Counts per hospital, in dataset order.
    pub by_hospital: Vec<ItemBreakdown>,
    /// Hospital × outcome table the test was run on.
    pub table: ContingencyTable,
    pub test: Result<TestResult, AssociationError>,
    /// Hospital × {R, non-R} comparison. `None` for the sequence-type item.
    pub resistance_split: Option<Comparison>,
}

impl ReportItem {
    /// First problem recorded on this item, if any.
    #[must_use]
    pub fn error(&self) -> Option<ItemError> {
        match (&self.test, &self.overall.percentages) {
            (Err(err), _) => Some(err.clone().into()),
            (_, Err(err)) => Some((*err).into()),
            _ => None,
        }
    }
}

/// Result of a report run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub hospitals: Vec<String>,
    pub options: BuildOptions,
    /// Antibiotics in panel order, then the sequence-type item.
    pub items: Vec<ReportItem>,
    /// Resistance summary across the antibiotic panel.
    pub panel_summary: Option<PanelSummary>,
}

impl Report {
    pub fn antibiotics(&self) -> impl Iterator<Item = &ReportItem> {
        self.items.iter().filter(|item| item.kind.is_antibiotic())
    }

    #[must_use]
    pub fn sequence_types(&self) -> Option<&ReportItem> {
        self.items.iter().find(|item| item.kind.is_sequence_types())
    }

    #[must_use]
    pub fn item(&self, category: &str) -> Option<&ReportItem> {
        self.items.iter().find(|item| item.category == category)
    }
}

/// Builds [`Report`]s from aggregated counts.
#[derive(Debug, Clone, Default)]
pub struct ReportBuilder {
    options: BuildOptions,
    test: AssociationTest,
}

impl ReportBuilder {
    #[must_use]
    pub fn new(options: BuildOptions) -> Self {
        Self {
            options,
            test: AssociationTest::new(options.association),
        }
    }

    pub fn build_dataset(&self, dataset: &Dataset) -> Result<Report, ReportError> {
        self.build(
            &dataset.antibiotics,
            &dataset.hospitals,
            &dataset.sequence_types,
        )
    }

    /// Builds the report for an antibiotic panel and a sequence-type distribution.
    ///
    /// All tables are constructed first, so malformed input is rejected before
    /// any test runs.
    pub fn build(
        &self,
        antibiotic_panel: &[AntibioticCounts],
        hospitals: &[String],
        sequence_types: &SequenceTypeCounts,
    ) -> Result<Report, ReportError> {
        dataset::validate_parts(hospitals, antibiotic_panel, sequence_types)?;

        let mut tables = antibiotic_panel
            .iter()
            .map(|antibiotic| {
                let table = antibiotic_table(antibiotic, hospitals)?;
                let split = resistance_split_table(antibiotic, hospitals)?;
                Ok((antibiotic.name.clone(), ItemKind::Antibiotic, table, Some(split)))
            })
            .collect::<Result<Vec<_>, ReportError>>()?;
        tables.push((
            SEQUENCE_TYPES_CATEGORY.to_owned(),
            ItemKind::SequenceTypes,
            sequence_type_table(sequence_types, hospitals)?,
            None,
        ));

        let items = tables
            .into_iter()
            .map(|(category, kind, table, split)| self.build_item(category, kind, table, split))
            .collect::<Vec<_>>();

        let overall = items
            .iter()
            .filter(|item| item.kind.is_antibiotic())
            .map(|item| item.overall.breakdown.clone())
            .collect::<Vec<_>>();
        let panel_summary = PanelSummary::from_breakdowns(&overall, Outcome::Resistant.code());

        Ok(Report {
            hospitals: hospitals.to_vec(),
            options: self.options,
            items,
            panel_summary,
        })
    }

    fn build_item(
        &self,
        category: String,
        kind: ItemKind,
        table: ContingencyTable,
        split: Option<ContingencyTable>,
    ) -> ReportItem {
        let overall = CategoryBreakdown::new(
            category.as_str(),
            table.col_labels().iter().cloned().zip(table.col_totals()),
        );
        let by_hospital = table
            .row_labels()
            .iter()
            .zip(table.counts())
            .map(|(hospital, counts)| {
                let counts = table.col_labels().iter().cloned().zip(counts.iter().copied());
                ItemBreakdown::from(CategoryBreakdown::new(hospital.as_str(), counts))
            })
            .collect::<Vec<_>>();

        let test = self.test.run(&table);
        match &test {
            Ok(result) => log::debug!(
                "{category}: {} test, p = {:.4}",
                result.test,
                result.p_value
            ),
            Err(err) => log::warn!("{category}: association test not performed: {err}"),
        }

        let resistance_split = split.map(|table| {
            let test = self.test.run(&table);
            match &test {
                Ok(result) => log::debug!(
                    "{category}: R vs non-R {} test, p = {:.4}",
                    result.test,
                    result.p_value
                ),
                Err(err) => log::warn!("{category}: R vs non-R test not performed: {err}"),
            }
            Comparison { table, test }
        });

        ReportItem {
            category,
            kind,
            overall: overall.into(),
            by_hospital,
            table,
            test,
            resistance_split,
        }
    }
}

fn antibiotic_table(
    antibiotic: &AntibioticCounts,
    hospitals: &[String],
) -> Result<ContingencyTable, ReportError> {
    let counts = hospitals
        .iter()
        .map(|hospital| {
            antibiotic
                .counts
                .get(hospital)
                .copied()
                .unwrap_or_default()
                .to_array()
                .to_vec()
        })
        .collect();
    ContingencyTable::new(hospitals, Outcome::ALL.map(Outcome::code), counts).map_err(|source| {
        ReportError::Table {
            category: antibiotic.name.clone(),
            source,
        }
    })
}

fn resistance_split_table(
    antibiotic: &AntibioticCounts,
    hospitals: &[String],
) -> Result<ContingencyTable, ReportError> {
    let counts = hospitals
        .iter()
        .map(|hospital| {
            antibiotic
                .counts
                .get(hospital)
                .copied()
                .unwrap_or_default()
                .resistant_split()
                .to_vec()
        })
        .collect();
    ContingencyTable::new(hospitals, RESISTANCE_SPLIT_LABELS, counts).map_err(|source| {
        ReportError::Table {
            category: antibiotic.name.clone(),
            source,
        }
    })
}

fn sequence_type_table(
    sequence_types: &SequenceTypeCounts,
    hospitals: &[String],
) -> Result<ContingencyTable, ReportError> {
    let st_ids = dataset::sequence_type_ids(sequence_types);
    let counts = hospitals
        .iter()
        .map(|hospital| {
            let per_st = sequence_types.get(hospital);
            st_ids
                .iter()
                .map(|id| per_st.and_then(|m| m.get(id)).copied().unwrap_or(0))
                .collect::<Vec<_>>()
        })
        .collect();
    ContingencyTable::new(hospitals, st_ids, counts).map_err(|source| ReportError::Table {
        category: SEQUENCE_TYPES_CATEGORY.to_owned(),
        source,
    })
}
