// src/recompute.rs

//! Completion of a partial CA result from its original count table.
//!
//! Given the ground truth `D`, `prin_coords_rows` and `std_coords_cols`, the
//! remaining quantities follow from the masses of the original table:
//!
//! ```text
//! std_coords_rows[i, j] = prin_coords_rows[i, j] / D[j]
//! U[i, j]               = std_coords_rows[i, j] * sqrt(row_masses[i])
//! V[i, j]               = std_coords_cols[i, j] * sqrt(col_masses[i])
//! ```
//!
//! Masses are matched to coordinates by label, never by position.

use crate::cacomp::{CaComp, DerivedFields};
use crate::error::{MarginAxis, Result};
use crate::matrix::LabeledMatrix;
use crate::residuals::{comp_margins, comp_std_residuals};
use log::{debug, info};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Configuration for recomputation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecomputeConfig {
    /// Compute masses through the full standardized-residual matrix instead
    /// of the streaming margin pass. Both yield identical masses; the
    /// streaming pass needs no O(rows × columns) scratch space.
    pub materialize_residuals: bool,
}

/// Computes the derived fields of `ca` without modifying it.
///
/// # Errors
/// Returns `CaError::Alignment` if a row label of `prin_coords_rows` is not a
/// row of `mat` within its first `top_rows` rows, or a row label of
/// `std_coords_cols` is not a column of `mat`. Errors of the margin
/// computation (negative counts, zero total) are propagated.
pub fn derive_fields(
    ca: &CaComp,
    mat: &LabeledMatrix,
    config: &RecomputeConfig,
) -> Result<DerivedFields> {
    ca.validate()?;

    let top_rows = ca.top_rows();

    let margins = if config.materialize_residuals {
        comp_std_residuals(mat, Some(top_rows))?.into_margins()
    } else {
        comp_margins(mat, Some(top_rows))?
    };
    debug!(
        "Margins over first {} rows: grand total = {}",
        top_rows.min(mat.nrows()),
        margins.total()
    );

    let row_masses = margins.row_masses().align(ca.row_names(), MarginAxis::Rows)?;
    let col_masses = margins
        .col_masses()
        .align(ca.col_names(), MarginAxis::Columns)?;

    let std_coords_rows = ca.prin_coords_rows().data() / ca.d();
    let u = scale_rows(&std_coords_rows, &row_masses);
    let v = scale_rows(ca.std_coords_cols().data(), &col_masses);

    Ok(DerivedFields {
        row_masses,
        col_masses,
        std_coords_rows,
        u,
        v,
    })
}

/// Multiplies row `i` of `coords` by `sqrt(masses[i])`.
fn scale_rows(coords: &Array2<f64>, masses: &Array1<f64>) -> Array2<f64> {
    coords * &masses.mapv(f64::sqrt).insert_axis(Axis(1))
}

/// Returns a completed copy of `ca`, with masses taken from `mat`.
///
/// `mat` must carry the row and column labels used by `ca`; extra labels are
/// ignored. Only the first `ca.top_rows()` rows of `mat` are considered.
///
/// # Errors
/// See [`derive_fields`]. On error `ca` is untouched.
///
/// # Examples
///
/// ```
/// use ndarray::array;
/// use efficient_ca::{recompute, CaComp, LabeledMatrix};
///
/// let mat = LabeledMatrix::new(
///     array![[10.0, 0.0], [0.0, 10.0], [5.0, 5.0]],
///     ["r1", "r2", "r3"],
///     ["c1", "c2"],
/// ).unwrap();
/// let prin = LabeledMatrix::with_dim_labels(array![[1.0], [-1.0], [0.0]], ["r1", "r2", "r3"]).unwrap();
/// let cols = LabeledMatrix::with_dim_labels(array![[1.0], [-1.0]], ["c1", "c2"]).unwrap();
/// let ca = CaComp::new(array![1.0], prin, cols, 3).unwrap();
///
/// let done = recompute(&ca, &mat).unwrap();
/// assert!(done.is_complete());
/// ```
pub fn recompute(ca: &CaComp, mat: &LabeledMatrix) -> Result<CaComp> {
    recompute_with_config(ca, mat, &RecomputeConfig::default())
}

/// [`recompute`] with explicit configuration.
pub fn recompute_with_config(
    ca: &CaComp,
    mat: &LabeledMatrix,
    config: &RecomputeConfig,
) -> Result<CaComp> {
    let mut completed = ca.clone();
    completed.recompute_with_config(mat, config)?;
    Ok(completed)
}

impl CaComp {
    /// Fills the derived fields in place. All fields are computed before any
    /// is assigned, so on error `self` keeps its previous state.
    pub fn recompute(&mut self, mat: &LabeledMatrix) -> Result<()> {
        self.recompute_with_config(mat, &RecomputeConfig::default())
    }

    pub fn recompute_with_config(
        &mut self,
        mat: &LabeledMatrix,
        config: &RecomputeConfig,
    ) -> Result<()> {
        let start_time = Instant::now();
        let derived = derive_fields(self, mat, config)?;
        self.set_derived(derived);
        info!(
            "Recomputed masses and factor matrices for {} rows x {} columns ({} dims) in {:?}",
            self.top_rows(),
            self.std_coords_cols().nrows(),
            self.dims(),
            start_time.elapsed()
        );
        Ok(())
    }
}
