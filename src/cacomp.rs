// src/cacomp.rs

use crate::error::{CaError, Result};
use crate::matrix::LabeledMatrix;
use log::debug;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Correspondence Analysis result.
///
/// Holds the ground-truth quantities of a decomposition (`D`,
/// `prin_coords_rows`, `std_coords_cols`, `top_rows`) and, once
/// [`recompute`](crate::recompute()) has run, the five derived quantities
/// (row/column masses, `std_coords_rows`, `U`, `V`).
///
/// The ground-truth fields are validated on construction and never change
/// afterwards. Derived fields are either all present or all absent.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CaComp {
    /// Singular values, length `dims`.
    d: Array1<f64>,
    /// Row principal coordinates.
    /// Shape: (top_rows, dims)
    prin_coords_rows: LabeledMatrix,
    /// Column standard coordinates; rows are the columns of the original table.
    /// Shape: (n_columns, dims)
    std_coords_cols: LabeledMatrix,
    /// Number of leading rows of the original table used by the decomposition.
    top_rows: usize,
    row_masses: Option<Array1<f64>>,
    col_masses: Option<Array1<f64>>,
    std_coords_rows: Option<Array2<f64>>,
    u: Option<Array2<f64>>,
    v: Option<Array2<f64>>,
}

/// The five derived quantities produced by recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedFields {
    pub row_masses: Array1<f64>,
    pub col_masses: Array1<f64>,
    pub std_coords_rows: Array2<f64>,
    pub u: Array2<f64>,
    pub v: Array2<f64>,
}

/// Fields of a CA result as handed over by a container adapter, any of
/// which may be absent.
#[derive(Debug, Clone, Default)]
pub struct CaCompParts {
    pub std_coords_cols: Option<LabeledMatrix>,
    pub d: Option<Array1<f64>>,
    pub prin_coords_rows: Option<LabeledMatrix>,
    pub top_rows: Option<usize>,
}

impl CaCompParts {
    /// Builds a validated [`CaComp`].
    ///
    /// # Errors
    /// Returns `CaError::MissingInput` for the first absent field, checked in
    /// the order `std_coords_cols`, `D`, `prin_coords_rows`, `top_rows`, before
    /// any other validation. Otherwise the errors of [`CaComp::new`].
    pub fn into_cacomp(self) -> Result<CaComp> {
        let std_coords_cols = self.std_coords_cols.ok_or(CaError::MissingInput {
            field: "std_coords_cols",
        })?;
        let d = self.d.ok_or(CaError::MissingInput { field: "D" })?;
        let prin_coords_rows = self.prin_coords_rows.ok_or(CaError::MissingInput {
            field: "prin_coords_rows",
        })?;
        let top_rows = self.top_rows.ok_or(CaError::MissingInput { field: "top_rows" })?;
        CaComp::new(d, prin_coords_rows, std_coords_cols, top_rows)
    }
}

impl CaComp {
    /// Creates a partial CA result from its ground-truth quantities.
    ///
    /// * `d` - Singular values, one per retained dimension. Must be finite and positive.
    /// * `prin_coords_rows` - Row principal coordinates, shape (top_rows, dims).
    /// * `std_coords_cols` - Column standard coordinates, shape (n_columns, dims).
    /// * `top_rows` - Number of rows the decomposition was computed on.
    ///
    /// # Errors
    /// Returns `CaError::Dimension` if `D` is empty, if either coordinate matrix
    /// does not have `dims` columns, or if `prin_coords_rows` does not have
    /// `top_rows` rows. Returns `CaError::InvalidValue` if a singular value is
    /// not finite and strictly positive.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use efficient_ca::{CaComp, LabeledMatrix};
    ///
    /// let prin = LabeledMatrix::with_dim_labels(array![[0.5], [-0.5]], ["r1", "r2"]).unwrap();
    /// let cols = LabeledMatrix::with_dim_labels(array![[1.0], [-1.0]], ["c1", "c2"]).unwrap();
    /// let ca = CaComp::new(array![0.5], prin, cols, 2).unwrap();
    /// assert_eq!(ca.dims(), 1);
    /// assert!(!ca.is_complete());
    /// ```
    pub fn new(
        d: Array1<f64>,
        prin_coords_rows: LabeledMatrix,
        std_coords_cols: LabeledMatrix,
        top_rows: usize,
    ) -> Result<Self> {
        let ca = Self {
            d,
            prin_coords_rows,
            std_coords_cols,
            top_rows,
            row_masses: None,
            col_masses: None,
            std_coords_rows: None,
            u: None,
            v: None,
        };
        ca.validate()?;
        debug!(
            "Created CA result: dims = {}, top_rows = {}, n_columns = {}",
            ca.dims(),
            ca.top_rows,
            ca.std_coords_cols.nrows()
        );
        Ok(ca)
    }

    /// Checks the ground-truth invariants.
    pub(crate) fn validate(&self) -> Result<()> {
        let dims = self.d.len();
        if dims == 0 {
            return Err(CaError::Dimension(
                "D is empty; at least one retained dimension is required".to_string(),
            ));
        }
        if let Some((k, v)) = self
            .d
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v <= 0.0)
        {
            return Err(CaError::InvalidValue(format!(
                "singular value D[{}] = {} must be finite and positive",
                k, v
            )));
        }
        if self.prin_coords_rows.ncols() != dims {
            return Err(CaError::Dimension(format!(
                "prin_coords_rows has {} columns but D has length {}",
                self.prin_coords_rows.ncols(),
                dims
            )));
        }
        if self.std_coords_cols.ncols() != dims {
            return Err(CaError::Dimension(format!(
                "std_coords_cols has {} columns but D has length {}",
                self.std_coords_cols.ncols(),
                dims
            )));
        }
        if self.top_rows == 0 || self.prin_coords_rows.nrows() != self.top_rows {
            return Err(CaError::Dimension(format!(
                "prin_coords_rows has {} rows but top_rows is {}",
                self.prin_coords_rows.nrows(),
                self.top_rows
            )));
        }
        Ok(())
    }

    /// Checks that derived fields are all-or-nothing, correctly shaped and finite.
    fn validate_derived(&self) -> Result<()> {
        let present = [
            self.row_masses.is_some(),
            self.col_masses.is_some(),
            self.std_coords_rows.is_some(),
            self.u.is_some(),
            self.v.is_some(),
        ];
        if present.iter().all(|p| !p) {
            return Ok(());
        }
        match (
            &self.row_masses,
            &self.col_masses,
            &self.std_coords_rows,
            &self.u,
            &self.v,
        ) {
            (Some(rm), Some(cm), Some(scr), Some(u), Some(v)) => {
                let rows = self.prin_coords_rows.dim();
                let cols = self.std_coords_cols.dim();
                if rm.len() != rows.0 || scr.dim() != rows || u.dim() != rows {
                    return Err(CaError::Dimension(format!(
                        "derived row quantities do not match prin_coords_rows shape {:?}",
                        rows
                    )));
                }
                if cm.len() != cols.0 || v.dim() != cols {
                    return Err(CaError::Dimension(format!(
                        "derived column quantities do not match std_coords_cols shape {:?}",
                        cols
                    )));
                }
                let fields = [
                    ("row_masses", rm.iter().all(|x| x.is_finite())),
                    ("col_masses", cm.iter().all(|x| x.is_finite())),
                    ("std_coords_rows", scr.iter().all(|x| x.is_finite())),
                    ("U", u.iter().all(|x| x.is_finite())),
                    ("V", v.iter().all(|x| x.is_finite())),
                ];
                if let Some((name, _)) = fields.iter().find(|(_, finite)| !finite) {
                    return Err(CaError::InvalidValue(format!(
                        "derived field {} contains non-finite values",
                        name
                    )));
                }
                Ok(())
            }
            _ => Err(CaError::TypeMismatch(
                "CA result has only some of its derived fields; expected all or none".to_string(),
            )),
        }
    }

    /// Singular values.
    pub fn d(&self) -> &Array1<f64> {
        &self.d
    }

    /// Number of retained dimensions.
    pub fn dims(&self) -> usize {
        self.d.len()
    }

    pub fn top_rows(&self) -> usize {
        self.top_rows
    }

    pub fn prin_coords_rows(&self) -> &LabeledMatrix {
        &self.prin_coords_rows
    }

    pub fn std_coords_cols(&self) -> &LabeledMatrix {
        &self.std_coords_cols
    }

    /// Row labels, in the order of `prin_coords_rows`.
    pub fn row_names(&self) -> &[String] {
        self.prin_coords_rows.row_names()
    }

    /// Column labels of the original table, in the order of `std_coords_cols`.
    pub fn col_names(&self) -> &[String] {
        self.std_coords_cols.row_names()
    }

    pub fn row_masses(&self) -> Option<&Array1<f64>> {
        self.row_masses.as_ref()
    }

    pub fn col_masses(&self) -> Option<&Array1<f64>> {
        self.col_masses.as_ref()
    }

    pub fn std_coords_rows(&self) -> Option<&Array2<f64>> {
        self.std_coords_rows.as_ref()
    }

    /// Mass-scaled row factor matrix.
    pub fn u(&self) -> Option<&Array2<f64>> {
        self.u.as_ref()
    }

    /// Mass-scaled column factor matrix.
    pub fn v(&self) -> Option<&Array2<f64>> {
        self.v.as_ref()
    }

    /// True once all derived fields are populated.
    pub fn is_complete(&self) -> bool {
        self.row_masses.is_some()
            && self.col_masses.is_some()
            && self.std_coords_rows.is_some()
            && self.u.is_some()
            && self.v.is_some()
    }

    /// Drops the derived fields, returning the result to its partial state.
    pub fn clear_derived(&mut self) {
        self.row_masses = None;
        self.col_masses = None;
        self.std_coords_rows = None;
        self.u = None;
        self.v = None;
    }

    pub(crate) fn set_derived(&mut self, derived: DerivedFields) {
        self.row_masses = Some(derived.row_masses);
        self.col_masses = Some(derived.col_masses);
        self.std_coords_rows = Some(derived.std_coords_rows);
        self.u = Some(derived.u);
        self.v = Some(derived.v);
    }

    /// Saves the CA result to a file using bincode.
    ///
    /// Partial results can be saved; derived fields are stored when present.
    ///
    /// # Errors
    /// Returns an error if file creation or serialization fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        bincode::serde::encode_into_std_write(self, &mut writer, bincode::config::standard())
            .map_err(|e| CaError::Serialization(format!("Failed to serialize CA result: {}", e)))?;
        debug!("Saved CA result to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads a CA result previously written with [`save`](Self::save).
    ///
    /// # Errors
    /// Returns an error if file I/O or deserialization fails, or if the loaded
    /// result violates the invariants checked by [`CaComp::new`] or carries
    /// inconsistent derived fields.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let ca: CaComp =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())
                .map_err(|e| {
                    CaError::Serialization(format!("Failed to deserialize CA result: {}", e))
                })?;

        ca.prin_coords_rows.validate()?;
        ca.std_coords_cols.validate()?;
        ca.validate()?;
        ca.validate_derived()?;
        debug!(
            "Loaded CA result from {:?} (complete = {})",
            path.as_ref(),
            ca.is_complete()
        );
        Ok(ca)
    }
}
