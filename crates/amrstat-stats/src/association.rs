//! Tests of association between the row and column variables of a contingency table.
//!
//! [`AssociationTest::run`] chooses between two tests based on the expected
//! cell counts under independence:
//!
//! - every expected count ≥ [`AssociationConfig::min_expected`]: Pearson's
//!   chi-square test of independence (no continuity correction);
//! - any expected count below the threshold: an exact test (see
//!   [`exact`](crate::exact)), reporting a p-value only.
//!
//! The decision is exposed separately as [`AssociationTest::select`] so that it
//! can be inspected and tested on its own.

use serde::Serialize;
use statrs::function::gamma::gamma_ur;

use crate::{
    contingency::{Axis, ContingencyTable, DegenerateTableError},
    exact::{self, ExactConfig, ExactMethod, SamplingError},
};

/// Default minimum expected cell count for the chi-square approximation.
pub const DEFAULT_MIN_EXPECTED: f64 = 5.0;
/// Default significance level.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// A table on which no association test can be performed.
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
#[serde(tag = "kind")]
pub enum AssociationError {
    #[display("{_0}")]
    DegenerateTable(DegenerateTableError),
    #[display("{_0}")]
    Sampling(SamplingError),
    #[display("{axis} '{label}' has no observations")]
    #[from(ignore)]
    InsufficientVariation { axis: Axis, label: String },
    #[display("association test needs at least a 2x2 table, got {rows}x{cols}")]
    #[from(ignore)]
    TooFewCategories { rows: usize, cols: usize },
}

/// Configuration of [`AssociationTest`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AssociationConfig {
    /// Smallest expected cell count for which the chi-square test is used.
    pub min_expected: f64,
    /// Significance level.
    pub alpha: f64,
    /// Settings for the exact-test branch.
    pub exact: ExactConfig,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            min_expected: DEFAULT_MIN_EXPECTED,
            alpha: DEFAULT_ALPHA,
            exact: ExactConfig::default(),
        }
    }
}

/// Test chosen for a table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display, derive_more::IsVariant,
)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    #[display("chi-square")]
    ChiSquare,
    #[display("Fisher exact")]
    FisherExact,
}

/// How the p-value of a [`TestResult`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PValueMethod {
    /// Chi-square distribution approximation.
    Asymptotic,
    Fisher,
    Enumeration { tables: u64 },
    MonteCarlo { replicates: usize, seed: u64 },
}

impl From<ExactMethod> for PValueMethod {
    fn from(method: ExactMethod) -> Self {
        match method {
            ExactMethod::Fisher => Self::Fisher,
            ExactMethod::Enumeration { tables } => Self::Enumeration { tables },
            ExactMethod::MonteCarlo { replicates, seed } => Self::MonteCarlo { replicates, seed },
        }
    }
}

/// Outcome of an association test.
///
/// `statistic` and `degrees_of_freedom` are populated only for
/// [`TestKind::ChiSquare`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TestResult {
    pub test: TestKind,
    pub statistic: Option<f64>,
    pub degrees_of_freedom: Option<u64>,
    /// Always within `[0, 1]`.
    pub p_value: f64,
    /// `p_value < alpha`
    pub significant: bool,
    pub method: PValueMethod,
}

/// Pearson's chi-square statistic for a table with its expected counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquare {
    pub statistic: f64,
    pub degrees_of_freedom: u64,
    pub p_value: f64,
}

impl ChiSquare {
    /// Computes the statistic, degrees of freedom, and upper-tail p-value.
    ///
    /// # Examples
    ///
    /// ```
    /// use amrstat_stats::{association::ChiSquare, contingency::ContingencyTable};
    ///
    /// let table = ContingencyTable::new(["a", "b"], ["x", "y"], vec![vec![40, 10], vec![8, 10]]).unwrap();
    /// let expected = table.expected_counts().unwrap();
    /// let chi2 = ChiSquare::compute(&table, &expected);
    /// assert_eq!(chi2.degrees_of_freedom, 1);
    /// assert!((chi2.statistic - 8.0593).abs() < 1e-3);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn compute(table: &ContingencyTable, expected: &[Vec<f64>]) -> Self {
        let statistic = table
            .counts()
            .iter()
            .flatten()
            .zip(expected.iter().flatten())
            .map(|(&observed, &expected)| (observed as f64 - expected).powi(2) / expected)
            .sum::<f64>();
        let degrees_of_freedom =
            (table.num_rows().saturating_sub(1) * table.num_cols().saturating_sub(1)) as u64;
        let p_value = chi_square_sf(statistic, degrees_of_freedom);
        Self {
            statistic,
            degrees_of_freedom,
            p_value,
        }
    }
}

/// Upper-tail probability of a chi-square distribution.
#[expect(clippy::cast_precision_loss)]
fn chi_square_sf(statistic: f64, degrees_of_freedom: u64) -> f64 {
    if degrees_of_freedom == 0 || statistic <= 0.0 {
        return 1.0;
    }
    // Q(k/2, x/2) is the regularized upper incomplete gamma function.
    gamma_ur(degrees_of_freedom as f64 / 2.0, statistic / 2.0).clamp(0.0, 1.0)
}

/// Selects and runs the association test appropriate for a table.
#[derive(Debug, Clone, Default)]
pub struct AssociationTest {
    config: AssociationConfig,
}

impl AssociationTest {
    #[must_use]
    pub fn new(config: AssociationConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AssociationConfig {
        &self.config
    }

    /// Decides which test applies to `table`.
    ///
    /// Returns [`TestKind::ChiSquare`] iff every expected count is at least
    /// [`AssociationConfig::min_expected`].
    ///
    /// # Examples
    ///
    /// ```
    /// use amrstat_stats::{
    ///     association::{AssociationTest, TestKind},
    ///     contingency::ContingencyTable,
    /// };
    ///
    /// let test = AssociationTest::default();
    /// let large = ContingencyTable::new(["a", "b"], ["x", "y"], vec![vec![40, 10], vec![8, 10]]).unwrap();
    /// let small = ContingencyTable::new(["a", "b"], ["x", "y"], vec![vec![2, 0], vec![1, 3]]).unwrap();
    /// assert_eq!(test.select(&large).unwrap(), TestKind::ChiSquare);
    /// assert_eq!(test.select(&small).unwrap(), TestKind::FisherExact);
    /// ```
    pub fn select(&self, table: &ContingencyTable) -> Result<TestKind, AssociationError> {
        let expected = self.checked_expected_counts(table)?;
        Ok(self.select_from_expected(&expected))
    }

    /// Runs the selected test on `table`.
    pub fn run(&self, table: &ContingencyTable) -> Result<TestResult, AssociationError> {
        let expected = self.checked_expected_counts(table)?;
        let result = match self.select_from_expected(&expected) {
            TestKind::ChiSquare => {
                let chi2 = ChiSquare::compute(table, &expected);
                TestResult {
                    test: TestKind::ChiSquare,
                    statistic: Some(chi2.statistic),
                    degrees_of_freedom: Some(chi2.degrees_of_freedom),
                    p_value: chi2.p_value,
                    significant: chi2.p_value < self.config.alpha,
                    method: PValueMethod::Asymptotic,
                }
            }
            TestKind::FisherExact => {
                let (p_value, method) = exact::exact_p_value(table, &self.config.exact)?;
                let p_value = p_value.clamp(0.0, 1.0);
                TestResult {
                    test: TestKind::FisherExact,
                    statistic: None,
                    degrees_of_freedom: None,
                    p_value,
                    significant: p_value < self.config.alpha,
                    method: method.into(),
                }
            }
        };
        Ok(result)
    }

    fn checked_expected_counts(
        &self,
        table: &ContingencyTable,
    ) -> Result<Vec<Vec<f64>>, AssociationError> {
        if table.num_rows() < 2 || table.num_cols() < 2 {
            return Err(AssociationError::TooFewCategories {
                rows: table.num_rows(),
                cols: table.num_cols(),
            });
        }
        let expected = table.expected_counts()?;
        if let Some((axis, label)) = table.find_empty_margin() {
            return Err(AssociationError::InsufficientVariation {
                axis,
                label: label.to_owned(),
            });
        }
        Ok(expected)
    }

    fn select_from_expected(&self, expected: &[Vec<f64>]) -> TestKind {
        let min_expected = expected
            .iter()
            .flatten()
            .copied()
            .fold(f64::INFINITY, f64::min);
        let kind = if min_expected >= self.config.min_expected {
            TestKind::ChiSquare
        } else {
            TestKind::FisherExact
        };
        log::debug!(
            "smallest expected count {min_expected:.3} (threshold {}), using {kind} test",
            self.config.min_expected
        );
        kind
    }
}
