// src/residuals.rs

//! Standardized residuals and marginal masses of a contingency table.
//!
//! For a table with row totals `r_i`, column totals `c_j` and grand total `n`,
//! the expected count under independence is `e_ij = r_i * c_j / n` and the
//! standardized residual is `(x_ij - e_ij) / sqrt(e_ij)`. Row and column
//! masses are `r_i / n` and `c_j / n`.
//!
//! Cells whose expected count is zero (their row or column sums to zero) get
//! a residual of exactly `0.0`. Such rows and columns are kept, with zero
//! mass and zero inertia.

use crate::error::{CaError, MarginAxis, Result};
use crate::matrix::LabeledMatrix;
use log::{debug, trace, warn};
use ndarray::{s, Array1, Array2, ArrayView2, Axis, Zip};
use rayon::prelude::*;
use std::collections::HashMap;

/// Ordered mapping from label to mass.
#[derive(Debug, Clone, PartialEq)]
pub struct Masses {
    labels: Vec<String>,
    values: Array1<f64>,
    index: HashMap<String, usize>,
}

impl Masses {
    fn new(labels: Vec<String>, values: Array1<f64>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        Self { labels, values, index }
    }

    /// Mass of `label`, if present.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.index.get(label).map(|&i| self.values[i])
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Looks up the mass of every label in `labels`, in that order.
    ///
    /// # Errors
    /// Returns `CaError::Alignment` if any label is absent. The error names
    /// the first unmatched label and the total count of unmatched labels.
    pub fn align<S: AsRef<str>>(&self, labels: &[S], axis: MarginAxis) -> Result<Array1<f64>> {
        let mut aligned = Vec::with_capacity(labels.len());
        let mut first_missing: Option<&str> = None;
        let mut missing = 0usize;
        for label in labels {
            match self.get(label.as_ref()) {
                Some(mass) => aligned.push(mass),
                None => {
                    trace!("No {} mass for label '{}'", axis, label.as_ref());
                    first_missing.get_or_insert(label.as_ref());
                    missing += 1;
                }
            }
        }
        match first_missing {
            Some(label) => Err(CaError::Alignment {
                axis,
                label: label.to_string(),
                missing,
            }),
            None => Ok(Array1::from_vec(aligned)),
        }
    }
}

/// Grand total and marginal masses of a (possibly row-restricted) table.
#[derive(Debug, Clone, PartialEq)]
pub struct Margins {
    tot: f64,
    rowm: Masses,
    colm: Masses,
}

impl Margins {
    /// Grand total of the considered rows.
    pub fn total(&self) -> f64 {
        self.tot
    }

    pub fn row_masses(&self) -> &Masses {
        &self.rowm
    }

    pub fn col_masses(&self) -> &Masses {
        &self.colm
    }
}

/// Standardized residuals together with the margins they were computed from.
#[derive(Debug, Clone)]
pub struct StdResiduals {
    s: Array2<f64>,
    margins: Margins,
}

impl StdResiduals {
    /// Residual matrix, shape (considered rows × columns).
    pub fn residuals(&self) -> &Array2<f64> {
        &self.s
    }

    pub fn margins(&self) -> &Margins {
        &self.margins
    }

    pub fn into_margins(self) -> Margins {
        self.margins
    }

    pub fn total(&self) -> f64 {
        self.margins.tot
    }

    pub fn row_masses(&self) -> &Masses {
        &self.margins.rowm
    }

    pub fn col_masses(&self) -> &Masses {
        &self.margins.colm
    }

    /// Pearson chi-square statistic, the sum of squared residuals.
    pub fn chi_square(&self) -> f64 {
        self.s.iter().map(|v| v * v).sum()
    }

    /// Total inertia, `chi_square / total`.
    pub fn total_inertia(&self) -> f64 {
        self.chi_square() / self.margins.tot
    }

    /// Inertia contributed by each considered row.
    pub fn row_inertia(&self) -> Array1<f64> {
        self.s.map_axis(Axis(1), |row| row.dot(&row)) / self.margins.tot
    }

    /// Inertia contributed by each column.
    pub fn col_inertia(&self) -> Array1<f64> {
        self.s.map_axis(Axis(0), |col| col.dot(&col)) / self.margins.tot
    }
}

/// Computes standardized residuals, grand total and masses of `mat`.
///
/// * `mat` - Count table with labeled rows and columns. Entries must be non-negative.
/// * `top` - Optional: only the first `top` rows (in current order) are considered.
///           Values larger than the row count are clamped with a warning.
///
/// # Errors
/// Returns an error if `top` is `Some(0)`, if the table has no columns, if any
/// considered entry is negative, or if the considered entries sum to zero or
/// overflow to infinity.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use efficient_ca::{comp_std_residuals, LabeledMatrix};
///
/// let mat = LabeledMatrix::new(
///     array![[10.0, 0.0], [0.0, 10.0], [5.0, 5.0]],
///     ["r1", "r2", "r3"],
///     ["c1", "c2"],
/// ).unwrap();
/// let res = comp_std_residuals(&mat, None).unwrap();
/// assert_eq!(res.total(), 30.0);
/// assert_eq!(res.residuals()[[2, 0]], 0.0);
/// ```
pub fn comp_std_residuals(mat: &LabeledMatrix, top: Option<usize>) -> Result<StdResiduals> {
    let (view, row_totals, col_totals, margins) = reduce_margins(mat, top)?;
    let tot = margins.tot;

    let mut s = view.to_owned();
    Zip::from(s.rows_mut())
        .and(&row_totals)
        .par_for_each(|mut row, &row_total| {
            for (x, &col_total) in row.iter_mut().zip(col_totals.iter()) {
                let expected = row_total * col_total / tot;
                // zero row or column total
                *x = if expected > 0.0 {
                    (*x - expected) / expected.sqrt()
                } else {
                    0.0
                };
            }
        });

    Ok(StdResiduals { s, margins })
}

/// Computes only the grand total and masses, without materializing the
/// residual matrix. Same arguments and errors as [`comp_std_residuals`].
pub fn comp_margins(mat: &LabeledMatrix, top: Option<usize>) -> Result<Margins> {
    reduce_margins(mat, top).map(|(_, _, _, margins)| margins)
}

fn reduce_margins(
    mat: &LabeledMatrix,
    top: Option<usize>,
) -> Result<(ArrayView2<'_, f64>, Array1<f64>, Array1<f64>, Margins)> {
    let n_rows = match top {
        Some(0) => {
            return Err(CaError::DegenerateTable(
                "top must be at least 1 row".to_string(),
            ))
        }
        Some(t) if t > mat.nrows() => {
            warn!(
                "Requested top = {} rows but the matrix has only {}; using all rows.",
                t,
                mat.nrows()
            );
            mat.nrows()
        }
        Some(t) => t,
        None => mat.nrows(),
    };
    if n_rows == 0 || mat.ncols() == 0 {
        return Err(CaError::DegenerateTable(format!(
            "cannot compute masses of a {}x{} table",
            n_rows,
            mat.ncols()
        )));
    }

    let view = mat.data().slice(s![..n_rows, ..]);
    debug!(
        "Computing margins over {} of {} rows and {} columns",
        n_rows,
        mat.nrows(),
        mat.ncols()
    );

    let negative_row = view
        .axis_iter(Axis(0))
        .into_par_iter()
        .position_first(|row| row.iter().any(|&v| v < 0.0));
    if let Some(i) = negative_row {
        return Err(CaError::InvalidValue(format!(
            "row '{}' contains negative entries; a count table is expected",
            mat.row_names()[i]
        )));
    }

    let row_totals = view.sum_axis(Axis(1));
    let col_totals = view.sum_axis(Axis(0));
    let tot = row_totals.sum();
    if !tot.is_finite() {
        return Err(CaError::DegenerateTable(format!(
            "grand total of the first {} rows overflows to {}",
            n_rows, tot
        )));
    }
    if tot <= 0.0 {
        return Err(CaError::DegenerateTable(format!(
            "grand total of the first {} rows is zero",
            n_rows
        )));
    }

    let rowm = Masses::new(mat.row_names()[..n_rows].to_vec(), &row_totals / tot);
    let colm = Masses::new(mat.col_names().to_vec(), &col_totals / tot);

    Ok((view, row_totals, col_totals, Margins { tot, rowm, colm }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn scenario() -> LabeledMatrix {
        LabeledMatrix::new(
            array![[10.0, 0.0], [0.0, 10.0], [5.0, 5.0]],
            ["r1", "r2", "r3"],
            ["c1", "c2"],
        )
        .unwrap()
    }

    #[test]
    fn test_scenario_masses_and_residuals() {
        let res = comp_std_residuals(&scenario(), None).unwrap();
        assert_abs_diff_eq!(res.total(), 30.0);

        for (_, m) in res.row_masses().iter() {
            assert_abs_diff_eq!(m, 1.0 / 3.0, epsilon = 1e-15);
        }
        assert_abs_diff_eq!(res.col_masses().get("c1").unwrap(), 0.5);
        assert_abs_diff_eq!(res.col_masses().get("c2").unwrap(), 0.5);

        // expected = 10 * 15 / 30 = 5 everywhere
        let s5 = 5.0_f64.sqrt();
        let expected = array![[s5, -s5], [-s5, s5], [0.0, 0.0]];
        for (a, b) in res.residuals().iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_total_row_and_column_give_zero_residuals() {
        let mat = LabeledMatrix::new(
            array![[4.0, 0.0, 2.0], [0.0, 0.0, 0.0], [1.0, 0.0, 3.0]],
            ["a", "empty", "b"],
            ["x", "never", "y"],
        )
        .unwrap();
        let res = comp_std_residuals(&mat, None).unwrap();

        assert!(res.residuals().iter().all(|v| v.is_finite()));
        assert!(res.residuals().row(1).iter().all(|&v| v == 0.0));
        assert!(res.residuals().column(1).iter().all(|&v| v == 0.0));
        assert_eq!(res.row_masses().get("empty"), Some(0.0));
        assert_eq!(res.col_masses().get("never"), Some(0.0));
        assert_abs_diff_eq!(res.row_masses().values().sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_top_restricts_rows_and_column_masses() {
        let res = comp_std_residuals(&scenario(), Some(2)).unwrap();
        assert_eq!(res.residuals().dim(), (2, 2));
        assert_abs_diff_eq!(res.total(), 20.0);
        assert_eq!(res.row_masses().labels(), &["r1", "r2"]);
        assert!(res.row_masses().get("r3").is_none());
        assert_abs_diff_eq!(res.col_masses().get("c1").unwrap(), 0.5);
    }

    #[test]
    fn test_top_larger_than_rows_is_clamped() {
        let res = comp_std_residuals(&scenario(), Some(100)).unwrap();
        assert_eq!(res.row_masses().len(), 3);
    }

    #[test]
    fn test_inertia_decomposition() {
        let mat = LabeledMatrix::new(
            array![[12.0, 3.0, 7.0], [2.0, 9.0, 4.0], [6.0, 6.0, 1.0]],
            ["a", "b", "c"],
            ["x", "y", "z"],
        )
        .unwrap();
        let res = comp_std_residuals(&mat, None).unwrap();
        let total = res.total_inertia();
        assert_abs_diff_eq!(res.row_inertia().sum(), total, epsilon = 1e-12);
        assert_abs_diff_eq!(res.col_inertia().sum(), total, epsilon = 1e-12);
        assert_abs_diff_eq!(total * res.total(), res.chi_square(), epsilon = 1e-9);
    }

    #[test]
    fn test_margins_match_full_computation() {
        let mat = scenario();
        let full = comp_std_residuals(&mat, Some(3)).unwrap();
        let streamed = comp_margins(&mat, Some(3)).unwrap();
        assert_eq!(full.margins(), &streamed);
    }

    #[test]
    fn test_invalid_tables() {
        let neg = LabeledMatrix::new(array![[1.0, -1.0]], ["a"], ["x", "y"]).unwrap();
        assert!(matches!(comp_std_residuals(&neg, None), Err(CaError::InvalidValue(_))));

        let zeros = LabeledMatrix::new(Array2::zeros((2, 2)), ["a", "b"], ["x", "y"]).unwrap();
        assert!(matches!(comp_margins(&zeros, None), Err(CaError::DegenerateTable(_))));

        assert!(matches!(comp_margins(&scenario(), Some(0)), Err(CaError::DegenerateTable(_))));
    }

    #[test]
    fn test_overflowing_total_is_degenerate() {
        let huge = LabeledMatrix::new(
            array![[1e308, 1e308], [1.0, 1.0]],
            ["a", "b"],
            ["x", "y"],
        )
        .unwrap();
        match comp_margins(&huge, None) {
            Err(CaError::DegenerateTable(msg)) => assert!(msg.contains("overflows"), "got {}", msg),
            other => panic!("Expected DegenerateTable, got {:?}", other),
        }
        assert!(matches!(
            comp_std_residuals(&huge, None),
            Err(CaError::DegenerateTable(_))
        ));

        // the second row alone is fine
        let tail = huge.select_rows(&["b"]).unwrap();
        let margins = comp_margins(&tail, None).unwrap();
        assert!(margins.row_masses().values().iter().all(|m| m.is_finite()));
    }

    #[test]
    fn test_align_reports_first_missing() {
        let res = comp_margins(&scenario(), None).unwrap();
        let aligned = res.row_masses().align(&["r3", "r1"], MarginAxis::Rows).unwrap();
        assert_eq!(aligned.len(), 2);

        match res.col_masses().align(&["c2", "c9", "c8"], MarginAxis::Columns) {
            Err(CaError::Alignment { axis, label, missing }) => {
                assert_eq!(axis, MarginAxis::Columns);
                assert_eq!(label, "c9");
                assert_eq!(missing, 2);
            }
            other => panic!("Expected Alignment error, got {:?}", other),
        }
    }
}
