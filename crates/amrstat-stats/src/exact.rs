//! Exact tests for contingency tables with small expected counts.
//!
//! All tests here are conditional on the observed row and column totals. Under
//! independence the probability of a table with cells `n_ij` is
//!
//! ```text
//! P = (Π r_i!)(Π c_j!) / (N! Π n_ij!)
//! ```
//!
//! and the two-sided p-value is the total probability of every table that is
//! no more likely than the observed one.
//!
//! - 2×2 tables use Fisher's exact test directly.
//! - Larger tables use the Freeman-Halton extension, enumerating every table
//!   with the observed margins.
//! - When enumeration would visit more than
//!   [`ExactConfig::max_enumerated_tables`] tables, the p-value is estimated by
//!   a seeded Monte-Carlo permutation test instead.

use std::ops::ControlFlow;

use rand::{Rng, SeedableRng as _};
use rand_distr::{Distribution as _, Hypergeometric};
use rand_pcg::Pcg32;
use serde::Serialize;
use statrs::function::factorial::ln_factorial;

use crate::contingency::ContingencyTable;

/// Relative tolerance used when comparing table probabilities.
///
/// Tables whose probability is within this factor of the observed table's
/// probability are treated as equally likely, so floating-point noise does not
/// drop them from the p-value.
const RELATIVE_TOLERANCE: f64 = 1e-7;

/// Default limit on the number of tables enumerated before switching to Monte-Carlo.
pub const DEFAULT_MAX_ENUMERATED_TABLES: u64 = 1_000_000;
/// Default number of Monte-Carlo replicates.
pub const DEFAULT_MONTE_CARLO_REPLICATES: usize = 10_000;
/// Default Monte-Carlo seed.
pub const DEFAULT_SEED: u64 = 0x5EED_A11C_E5ED;

/// Settings for the exact-test branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExactConfig {
    /// Maximum number of tables to enumerate for r×c tables.
    pub max_enumerated_tables: u64,
    /// Number of random tables drawn by the Monte-Carlo fallback.
    pub monte_carlo_replicates: usize,
    /// Seed for the Monte-Carlo fallback. The same seed yields the same p-value.
    pub seed: u64,
}

impl Default for ExactConfig {
    fn default() -> Self {
        Self {
            max_enumerated_tables: DEFAULT_MAX_ENUMERATED_TABLES,
            monte_carlo_replicates: DEFAULT_MONTE_CARLO_REPLICATES,
            seed: DEFAULT_SEED,
        }
    }
}

/// Random tables with the observed margins could not be drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error)]
#[display("cannot sample tables with a grand total of {total}: {reason}")]
pub struct SamplingError {
    pub total: u64,
    pub reason: String,
}

/// How an exact p-value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::IsVariant)]
pub enum ExactMethod {
    /// Fisher's exact test on a 2×2 table.
    Fisher,
    /// Full enumeration of all tables with the observed margins.
    Enumeration { tables: u64 },
    /// Seeded Monte-Carlo estimate.
    MonteCarlo { replicates: usize, seed: u64 },
}

/// Computes a two-sided exact p-value for `table`.
///
/// The table must have a non-zero grand total.
///
/// Fails only on the Monte-Carlo path, when the margins are too large for the
/// hypergeometric sampler.
pub fn exact_p_value(
    table: &ContingencyTable,
    config: &ExactConfig,
) -> Result<(f64, ExactMethod), SamplingError> {
    if table.num_rows() == 2 && table.num_cols() == 2 {
        let counts = table.counts();
        let p_value = fisher_2x2([counts[0][0], counts[0][1], counts[1][0], counts[1][1]]);
        return Ok((p_value, ExactMethod::Fisher));
    }

    let margins = Margins::new(table);
    let observed = margins.ln_probability(table.counts().iter().flatten().copied());
    match margins.enumerate(observed, config.max_enumerated_tables) {
        Some((p_value, tables)) => {
            log::debug!("enumerated {tables} tables for exact test");
            Ok((p_value.min(1.0), ExactMethod::Enumeration { tables }))
        }
        None => {
            log::debug!(
                "more than {} tables with the observed margins, using {} Monte-Carlo replicates",
                config.max_enumerated_tables,
                config.monte_carlo_replicates
            );
            let p_value =
                margins.monte_carlo(observed, config.monte_carlo_replicates, config.seed)?;
            Ok((
                p_value,
                ExactMethod::MonteCarlo {
                    replicates: config.monte_carlo_replicates,
                    seed: config.seed,
                },
            ))
        }
    }
}

/// Two-sided Fisher's exact test for the 2×2 table `[[a, b], [c, d]]`.
///
/// # Examples
///
/// ```
/// use amrstat_stats::exact::fisher_2x2;
///
/// let p_value = fisher_2x2([2, 0, 1, 3]);
/// assert!((p_value - 0.4).abs() < 1e-12);
/// ```
#[must_use]
pub fn fisher_2x2([a, b, c, d]: [u64; 4]) -> f64 {
    let row0 = a + b;
    let row1 = c + d;
    let col0 = a + c;
    let col1 = b + d;
    let n = row0 + row1;
    if n == 0 {
        return 1.0;
    }

    let margins = ln_factorial(row0) + ln_factorial(row1) + ln_factorial(col0) + ln_factorial(col1);
    let constant = margins - ln_factorial(n);
    let ln_p = |a: u64| {
        let b = row0 - a;
        let c = col0 - a;
        let d = row1 - c;
        constant - ln_factorial(a) - ln_factorial(b) - ln_factorial(c) - ln_factorial(d)
    };

    let threshold = ln_p(a) + RELATIVE_TOLERANCE.ln_1p();
    let lo = row0.saturating_sub(col1);
    let hi = row0.min(col0);
    let p_value = (lo..=hi)
        .map(ln_p)
        .filter(|&ln| ln <= threshold)
        .map(f64::exp)
        .sum::<f64>();
    p_value.min(1.0)
}

/// Row and column totals of a table.
#[derive(Debug)]
struct Margins {
    rows: Vec<u64>,
    cols: Vec<u64>,
    total: u64,
    /// `ln(Π r_i! Π c_j! / N!)`
    constant: f64,
}

impl Margins {
    fn new(table: &ContingencyTable) -> Self {
        let rows = table.row_totals();
        let cols = table.col_totals();
        let total = table.grand_total();
        let constant = rows
            .iter()
            .chain(&cols)
            .map(|&m| ln_factorial(m))
            .sum::<f64>()
            - ln_factorial(total);
        Self {
            rows,
            cols,
            total,
            constant,
        }
    }

    fn ln_probability<I>(&self, cells: I) -> f64
    where
        I: IntoIterator<Item = u64>,
    {
        self.constant - cells.into_iter().map(ln_factorial).sum::<f64>()
    }

    /// Sums the probability of every table at most as likely as `observed`.
    ///
    /// Returns `None` once more than `limit` tables have been visited.
    fn enumerate(&self, observed: f64, limit: u64) -> Option<(f64, u64)> {
        let mut walker = TableWalker {
            margins: self,
            threshold: observed + RELATIVE_TOLERANCE.ln_1p(),
            row_remaining: self.rows.clone(),
            p_value: 0.0,
            visited: 0,
            limit,
        };
        match walker.fill_column(0, 0, self.cols.first().copied().unwrap_or(0), self.constant) {
            ControlFlow::Continue(()) => Some((walker.p_value, walker.visited)),
            ControlFlow::Break(()) => None,
        }
    }

    /// Estimates the p-value from random tables with the observed margins.
    ///
    /// The estimate is `(1 + hits) / (1 + replicates)`.
    #[expect(clippy::cast_precision_loss)]
    fn monte_carlo(
        &self,
        observed: f64,
        replicates: usize,
        seed: u64,
    ) -> Result<f64, SamplingError> {
        let threshold = observed + RELATIVE_TOLERANCE.ln_1p();
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut cells = vec![0_u64; self.rows.len() * self.cols.len()];

        let mut hits = 0_usize;
        for _ in 0..replicates {
            self.sample_table(&mut rng, &mut cells)?;
            if self.ln_probability(cells.iter().copied()) <= threshold {
                hits += 1;
            }
        }
        Ok(((1 + hits) as f64 / (1 + replicates) as f64).min(1.0))
    }

    /// Draws a table uniformly among permutations of the observations, row by
    /// row, as a sequence of hypergeometric draws.
    fn sample_table<R>(&self, rng: &mut R, cells: &mut [u64]) -> Result<(), SamplingError>
    where
        R: Rng,
    {
        let num_cols = self.cols.len();
        let mut col_remaining = self.cols.clone();
        let mut pool = self.total;
        for (row, &row_total) in self.rows.iter().enumerate() {
            let mut draws = row_total;
            let mut row_pool = pool;
            for col in 0..num_cols {
                let available = col_remaining[col];
                let value = if draws == 0 || available == 0 {
                    0
                } else if available == row_pool || draws == row_pool {
                    available.min(draws)
                } else {
                    Hypergeometric::new(row_pool, available, draws)
                        .map_err(|err| SamplingError {
                            total: self.total,
                            reason: err.to_string(),
                        })?
                        .sample(rng)
                };
                cells[row * num_cols + col] = value;
                col_remaining[col] -= value;
                row_pool -= available;
                draws -= value;
            }
            pool -= row_total;
        }
        Ok(())
    }
}

/// Depth-first walk over all tables with fixed margins, filled column by column.
struct TableWalker<'a> {
    margins: &'a Margins,
    threshold: f64,
    row_remaining: Vec<u64>,
    p_value: f64,
    visited: u64,
    limit: u64,
}

impl TableWalker<'_> {
    fn fill_column(
        &mut self,
        col: usize,
        row: usize,
        col_remaining: u64,
        ln_p: f64,
    ) -> ControlFlow<()> {
        let num_rows = self.row_remaining.len();
        let num_cols = self.margins.cols.len();

        // The last column is fully determined by what is left in each row.
        if col + 1 == num_cols {
            let ln_p = ln_p
                - self
                    .row_remaining
                    .iter()
                    .map(|&k| ln_factorial(k))
                    .sum::<f64>();
            self.visited += 1;
            if self.visited > self.limit {
                return ControlFlow::Break(());
            }
            if ln_p <= self.threshold {
                self.p_value += ln_p.exp();
            }
            return ControlFlow::Continue(());
        }

        // The last row of a column takes whatever the column still needs.
        if row + 1 == num_rows {
            if col_remaining > self.row_remaining[row] {
                return ControlFlow::Continue(());
            }
            self.row_remaining[row] -= col_remaining;
            let next_ln_p = ln_p - ln_factorial(col_remaining);
            let next_col_total = self.margins.cols[col + 1];
            let flow = self.fill_column(col + 1, 0, next_col_total, next_ln_p);
            self.row_remaining[row] += col_remaining;
            return flow;
        }

        let capacity_below = self.row_remaining[row + 1..].iter().sum::<u64>();
        let lo = col_remaining.saturating_sub(capacity_below);
        let hi = self.row_remaining[row].min(col_remaining);
        for value in lo..=hi {
            self.row_remaining[row] -= value;
            let next_ln_p = ln_p - ln_factorial(value);
            let flow = self.fill_column(col, row + 1, col_remaining - value, next_ln_p);
            self.row_remaining[row] += value;
            flow?;
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(counts: Vec<Vec<i64>>) -> ContingencyTable {
        let rows = (0..counts.len()).map(|i| format!("r{i}"));
        let cols = (0..counts[0].len()).map(|j| format!("c{j}"));
        ContingencyTable::new(rows, cols, counts).unwrap()
    }

    #[test]
    fn test_fisher_small_table() {
        // Hypergeometric probabilities for a = 0, 1, 2 are 3/15, 9/15, 3/15.
        assert!((fisher_2x2([2, 0, 1, 3]) - 6.0 / 15.0).abs() < 1e-12);
        assert!((fisher_2x2([1, 1, 2, 2]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fisher_is_symmetric_under_transpose() {
        let p = fisher_2x2([8, 2, 1, 5]);
        let transposed = fisher_2x2([8, 1, 2, 5]);
        assert!((p - transposed).abs() < 1e-12);
        assert!(p > 0.0 && p < 0.05);
    }

    #[test]
    fn test_enumeration_matches_fisher_for_2x2() {
        let t = table(vec![vec![3, 1], vec![1, 3]]);
        let margins = Margins::new(&t);
        let observed = margins.ln_probability([3, 1, 1, 3]);
        let (p, tables) = margins.enumerate(observed, 1000).unwrap();
        assert_eq!(tables, 5);
        assert!((p - fisher_2x2([3, 1, 1, 3])).abs() < 1e-12);
    }

    #[test]
    fn test_enumeration_probabilities_sum_to_one() {
        let t = table(vec![vec![2, 2, 1, 1, 0, 0, 1], vec![1, 1, 0, 0, 1, 1, 0]]);
        let margins = Margins::new(&t);
        // A threshold above every table's probability includes all of them.
        let (p, _) = margins.enumerate(0.0, 1_000_000).unwrap();
        assert!((p - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rxc_uses_enumeration() {
        let t = table(vec![vec![2, 2, 1, 1, 0, 0, 1], vec![1, 1, 0, 0, 1, 1, 0]]);
        let (p, method) = exact_p_value(&t, &ExactConfig::default()).unwrap();
        assert!(method.is_enumeration());
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_enumeration_limit_falls_back_to_monte_carlo() {
        let t = table(vec![vec![25, 4, 39], vec![20, 2, 28]]);
        let config = ExactConfig {
            max_enumerated_tables: 3,
            monte_carlo_replicates: 2000,
            seed: 7,
        };
        let (p, method) = exact_p_value(&t, &config).unwrap();
        assert_eq!(
            method,
            ExactMethod::MonteCarlo {
                replicates: 2000,
                seed: 7,
            }
        );
        assert!(p > 0.0 && p <= 1.0);

        let (exact, _) = exact_p_value(&t, &ExactConfig::default()).unwrap();
        assert!((p - exact).abs() < 0.05);
    }

    #[test]
    fn test_monte_carlo_is_deterministic_for_a_seed() {
        let t = table(vec![vec![62, 5, 1], vec![46, 2, 2]]);
        let margins = Margins::new(&t);
        let observed = margins.ln_probability([62, 5, 1, 46, 2, 2]);
        let first = margins.monte_carlo(observed, 500, 42).unwrap();
        let second = margins.monte_carlo(observed, 500, 42).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
    }

    #[test]
    fn test_sampled_tables_keep_margins() {
        let t = table(vec![vec![62, 5, 1], vec![46, 2, 2]]);
        let margins = Margins::new(&t);
        let mut rng = Pcg32::seed_from_u64(3);
        let mut cells = vec![0; 6];
        for _ in 0..200 {
            margins.sample_table(&mut rng, &mut cells).unwrap();
            assert_eq!(cells[..3].iter().sum::<u64>(), 68);
            assert_eq!(cells[3..].iter().sum::<u64>(), 50);
            for col in 0..3 {
                assert_eq!(cells[col] + cells[3 + col], margins.cols[col]);
            }
        }
    }

    #[test]
    fn test_large_counts_enumerate_without_allocating_per_isolate() {
        let t = table(vec![
            vec![3_000_000_000, 1, 0],
            vec![3_000_000_000, 0, 1],
        ]);
        let (p, method) = exact_p_value(&t, &ExactConfig::default()).unwrap();
        assert_eq!(method, ExactMethod::Enumeration { tables: 4 });
        assert!(p > 0.45 && p <= 1.0, "p = {p}");
    }

    #[test]
    fn test_large_counts_monte_carlo() {
        let t = table(vec![
            vec![3_000_000_000, 1, 0],
            vec![3_000_000_000, 0, 1],
        ]);
        let config = ExactConfig {
            max_enumerated_tables: 2,
            monte_carlo_replicates: 200,
            seed: 11,
        };
        let (p, method) = exact_p_value(&t, &config).unwrap();
        assert!(method.is_monte_carlo());
        assert!(p > 0.0 && p <= 1.0);
    }
}
