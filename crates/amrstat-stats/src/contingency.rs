use std::collections::HashSet;

use serde::Serialize;

/// Axis of a contingency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[display("row")]
    Row,
    #[display("column")]
    Column,
}

/// Malformed input while constructing a [`ContingencyTable`].
///
/// These errors are fatal for a report run: they indicate the input counts are
/// not a table at all, so nothing downstream can be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error)]
#[serde(tag = "kind")]
pub enum TableError {
    #[display(
        "count matrix is {found_rows}x{found_cols}, but labels describe a {expected_rows}x{expected_cols} table"
    )]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        found_rows: usize,
        found_cols: usize,
    },
    #[display("negative count {value} at row '{row}', column '{col}'")]
    NegativeCount { row: String, col: String, value: i64 },
    #[display("duplicate {axis} label '{label}'")]
    DuplicateLabel { axis: Axis, label: String },
}

/// The table has no observations at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, derive_more::Display, derive_more::Error)]
#[display("table has a grand total of zero")]
pub struct DegenerateTableError;

/// An immutable r×c table of non-negative counts with labelled rows and columns.
///
/// # Examples
///
/// ```
/// use amrstat_stats::contingency::ContingencyTable;
///
/// let table = ContingencyTable::new(
///     ["Milad", "Rasul Akram"],
///     ["Resistant", "Non-resistant"],
///     vec![vec![40, 10], vec![8, 10]],
/// )
/// .unwrap();
///
/// assert_eq!(table.row_totals(), [50, 18]);
/// assert_eq!(table.col_totals(), [48, 20]);
/// assert_eq!(table.grand_total(), 68);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContingencyTable {
    row_labels: Vec<String>,
    col_labels: Vec<String>,
    counts: Vec<Vec<u64>>,
}

impl ContingencyTable {
    /// Builds a table from labels and a row-major count matrix.
    ///
    /// Counts are accepted as signed integers so that negative input is reported
    /// as [`TableError::NegativeCount`] instead of being rejected by a parser.
    pub fn new<R, C>(
        row_labels: R,
        col_labels: C,
        counts: Vec<Vec<i64>>,
    ) -> Result<Self, TableError>
    where
        R: IntoIterator,
        R::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let row_labels = row_labels.into_iter().map(Into::into).collect::<Vec<_>>();
        let col_labels = col_labels.into_iter().map(Into::into).collect::<Vec<_>>();
        check_unique(Axis::Row, &row_labels)?;
        check_unique(Axis::Column, &col_labels)?;

        let shape_mismatch = |found_cols| TableError::ShapeMismatch {
            expected_rows: row_labels.len(),
            expected_cols: col_labels.len(),
            found_rows: counts.len(),
            found_cols,
        };
        if counts.len() != row_labels.len() {
            let found_cols = counts.first().map_or(0, Vec::len);
            return Err(shape_mismatch(found_cols));
        }
        if let Some(row) = counts.iter().find(|row| row.len() != col_labels.len()) {
            return Err(shape_mismatch(row.len()));
        }

        let counts = counts
            .iter()
            .zip(&row_labels)
            .map(|(row, row_label)| {
                row.iter()
                    .zip(&col_labels)
                    .map(|(&value, col_label)| {
                        u64::try_from(value).map_err(|_| TableError::NegativeCount {
                            row: row_label.clone(),
                            col: col_label.clone(),
                            value,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            row_labels,
            col_labels,
            counts,
        })
    }

    #[must_use]
    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    #[must_use]
    pub fn col_labels(&self) -> &[String] {
        &self.col_labels
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.row_labels.len()
    }

    #[must_use]
    pub fn num_cols(&self) -> usize {
        self.col_labels.len()
    }

    /// Count matrix in row-major order.
    #[must_use]
    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<u64> {
        self.counts.get(row)?.get(col).copied()
    }

    #[must_use]
    pub fn row_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    #[must_use]
    pub fn col_totals(&self) -> Vec<u64> {
        let mut totals = vec![0; self.num_cols()];
        for row in &self.counts {
            for (total, count) in totals.iter_mut().zip(row) {
                *total += count;
            }
        }
        totals
    }

    /// Total number of observations. May be zero; callers must guard division.
    #[must_use]
    pub fn grand_total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Expected cell counts under independence: `row_total * col_total / grand_total`.
    ///
    /// # Examples
    ///
    /// ```
    /// use amrstat_stats::contingency::ContingencyTable;
    ///
    /// let table = ContingencyTable::new(["a", "b"], ["x", "y"], vec![vec![2, 0], vec![1, 3]]).unwrap();
    /// let expected = table.expected_counts().unwrap();
    /// assert_eq!(expected, vec![vec![1.0, 1.0], vec![2.0, 2.0]]);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    pub fn expected_counts(&self) -> Result<Vec<Vec<f64>>, DegenerateTableError> {
        let grand_total = self.grand_total();
        if grand_total == 0 {
            return Err(DegenerateTableError);
        }
        let grand_total = grand_total as f64;
        let col_totals = self.col_totals();
        let expected = self
            .row_totals()
            .into_iter()
            .map(|row_total| {
                col_totals
                    .iter()
                    .map(|&col_total| row_total as f64 * col_total as f64 / grand_total)
                    .collect()
            })
            .collect();
        Ok(expected)
    }

    /// First row or column whose counts are all zero, if any.
    #[must_use]
    pub fn find_empty_margin(&self) -> Option<(Axis, &str)> {
        let empty_row = self
            .row_totals()
            .into_iter()
            .zip(&self.row_labels)
            .find(|(total, _)| *total == 0)
            .map(|(_, label)| (Axis::Row, label.as_str()));
        empty_row.or_else(|| {
            self.col_totals()
                .into_iter()
                .zip(&self.col_labels)
                .find(|(total, _)| *total == 0)
                .map(|(_, label)| (Axis::Column, label.as_str()))
        })
    }
}

fn check_unique(axis: Axis, labels: &[String]) -> Result<(), TableError> {
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.as_str()) {
            return Err(TableError::DuplicateLabel {
                axis,
                label: label.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(counts: Vec<Vec<i64>>) -> ContingencyTable {
        let rows = (0..counts.len()).map(|i| format!("r{i}"));
        let cols = (0..counts.first().map_or(0, Vec::len)).map(|j| format!("c{j}"));
        ContingencyTable::new(rows, cols, counts).unwrap()
    }

    #[test]
    fn test_margins_agree_with_grand_total() {
        let tables = [
            table(vec![vec![40, 10], vec![8, 10]]),
            table(vec![vec![62, 5, 1], vec![46, 2, 2]]),
            table(vec![vec![2, 2, 1, 1, 0, 0, 1], vec![1, 1, 0, 0, 1, 1, 0]]),
            table(vec![vec![0, 0], vec![0, 0]]),
        ];
        for t in &tables {
            let rows = t.row_totals().iter().sum::<u64>();
            let cols = t.col_totals().iter().sum::<u64>();
            assert_eq!(rows, t.grand_total());
            assert_eq!(cols, t.grand_total());
        }
    }

    #[test]
    fn test_row_count_mismatch() {
        let err = ContingencyTable::new(["a", "b"], ["x", "y"], vec![vec![1, 2]]).unwrap_err();
        assert_eq!(
            err,
            TableError::ShapeMismatch {
                expected_rows: 2,
                expected_cols: 2,
                found_rows: 1,
                found_cols: 2,
            }
        );
    }

    #[test]
    fn test_ragged_rows_mismatch() {
        let err = ContingencyTable::new(["a", "b"], ["x", "y"], vec![vec![1, 2], vec![3]])
            .unwrap_err();
        assert!(matches!(
            err,
            TableError::ShapeMismatch { found_cols: 1, .. }
        ));
    }

    #[test]
    fn test_negative_count() {
        let err = ContingencyTable::new(["a", "b"], ["x", "y"], vec![vec![1, 2], vec![-3, 4]])
            .unwrap_err();
        assert_eq!(
            err,
            TableError::NegativeCount {
                row: "b".to_owned(),
                col: "x".to_owned(),
                value: -3,
            }
        );
    }

    #[test]
    fn test_duplicate_label() {
        let err = ContingencyTable::new(["a", "a"], ["x", "y"], vec![vec![1, 2], vec![3, 4]])
            .unwrap_err();
        assert_eq!(
            err,
            TableError::DuplicateLabel {
                axis: Axis::Row,
                label: "a".to_owned(),
            }
        );
    }

    #[test]
    fn test_expected_counts() {
        let t = table(vec![vec![40, 10], vec![8, 10]]);
        let expected = t.expected_counts().unwrap();
        assert!((expected[0][0] - 50.0 * 48.0 / 68.0).abs() < 1e-12);
        assert!((expected[1][1] - 18.0 * 20.0 / 68.0).abs() < 1e-12);
        let sum = expected.iter().flatten().sum::<f64>();
        assert!((sum - 68.0).abs() < 1e-9);
    }

    #[test]
    fn test_expected_counts_of_empty_table() {
        let t = table(vec![vec![0, 0], vec![0, 0]]);
        assert_eq!(t.grand_total(), 0);
        assert_eq!(t.expected_counts(), Err(DegenerateTableError));
    }

    #[test]
    fn test_find_empty_margin() {
        assert_eq!(table(vec![vec![1, 2], vec![3, 4]]).find_empty_margin(), None);
        assert_eq!(
            table(vec![vec![1, 2], vec![0, 0]]).find_empty_margin(),
            Some((Axis::Row, "r1"))
        );
        assert_eq!(
            table(vec![vec![68, 0, 0], vec![50, 0, 0]]).find_empty_margin(),
            Some((Axis::Column, "c1"))
        );
    }
}
