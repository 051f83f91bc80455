// src/matrix.rs

use crate::error::{CaError, MarginAxis, Result};
use ndarray::{s, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Dense `f64` matrix with unique row and column labels.
///
/// Used both for the original count table (rows × columns) and for the
/// label-carrying coordinate matrices of a CA result, where the rows are
/// the labeled entities and the columns are the retained dimensions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    data: Array2<f64>,
    row_names: Vec<String>,
    col_names: Vec<String>,
}

impl LabeledMatrix {
    /// Creates a labeled matrix.
    ///
    /// # Errors
    /// Returns `CaError::TypeMismatch` if the number of labels does not match
    /// the shape, if a label appears twice on the same axis, or if any entry
    /// is NaN or infinite.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use efficient_ca::LabeledMatrix;
    ///
    /// let mat = LabeledMatrix::new(
    ///     array![[10.0, 0.0], [0.0, 10.0]],
    ///     ["r1", "r2"],
    ///     ["c1", "c2"],
    /// ).unwrap();
    /// assert_eq!(mat.dim(), (2, 2));
    /// ```
    pub fn new<R, C>(
        data: Array2<f64>,
        row_names: impl IntoIterator<Item = R>,
        col_names: impl IntoIterator<Item = C>,
    ) -> Result<Self>
    where
        R: Into<String>,
        C: Into<String>,
    {
        let matrix = Self {
            data,
            row_names: row_names.into_iter().map(Into::into).collect(),
            col_names: col_names.into_iter().map(Into::into).collect(),
        };
        matrix.validate()?;
        Ok(matrix)
    }

    /// Creates a coordinate matrix whose columns are labeled `Dim1..DimK`.
    pub fn with_dim_labels<R>(
        data: Array2<f64>,
        row_names: impl IntoIterator<Item = R>,
    ) -> Result<Self>
    where
        R: Into<String>,
    {
        let dims = data.ncols();
        Self::new(data, row_names, (1..=dims).map(|k| format!("Dim{}", k)))
    }

    /// Checks the structural invariants. Deserialized matrices bypass `new`,
    /// so loaders call this explicitly.
    pub(crate) fn validate(&self) -> Result<()> {
        let (nrows, ncols) = self.data.dim();
        if self.row_names.len() != nrows {
            return Err(CaError::TypeMismatch(format!(
                "matrix has {} rows but {} row labels",
                nrows,
                self.row_names.len()
            )));
        }
        if self.col_names.len() != ncols {
            return Err(CaError::TypeMismatch(format!(
                "matrix has {} columns but {} column labels",
                ncols,
                self.col_names.len()
            )));
        }
        check_unique(&self.row_names, "row")?;
        check_unique(&self.col_names, "column")?;

        if let Some(((i, j), v)) = self.data.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(CaError::TypeMismatch(format!(
                "matrix entry ({}, {}) = {} is not a finite number",
                self.row_names[i], self.col_names[j], v
            )));
        }
        Ok(())
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn row_names(&self) -> &[String] {
        &self.row_names
    }

    pub fn col_names(&self) -> &[String] {
        &self.col_names
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Returns the first `min(n, nrows)` rows, keeping their order and labels.
    pub fn head_rows(&self, n: usize) -> Self {
        let n = n.min(self.nrows());
        Self {
            data: self.data.slice(s![..n, ..]).to_owned(),
            row_names: self.row_names[..n].to_vec(),
            col_names: self.col_names.clone(),
        }
    }

    /// Returns the rows named in `labels`, in that order.
    ///
    /// # Errors
    /// Returns `CaError::Alignment` naming the first unknown label.
    pub fn select_rows<S: AsRef<str>>(&self, labels: &[S]) -> Result<Self> {
        let index: HashMap<&str, usize> = self
            .row_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let mut positions = Vec::with_capacity(labels.len());
        let mut missing: Vec<&str> = Vec::new();
        for label in labels {
            match index.get(label.as_ref()) {
                Some(&i) => positions.push(i),
                None => missing.push(label.as_ref()),
            }
        }
        if let Some(first) = missing.first() {
            return Err(CaError::Alignment {
                axis: MarginAxis::Rows,
                label: first.to_string(),
                missing: missing.len(),
            });
        }

        Self::new(
            self.data.select(Axis(0), &positions),
            positions.iter().map(|&i| self.row_names[i].clone()),
            self.col_names.iter().cloned(),
        )
    }
}

fn check_unique(names: &[String], axis: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(CaError::TypeMismatch(format!(
                "duplicate {} label '{}'; labels must be unique for mass alignment",
                axis, name
            )));
        }
    }
    Ok(())
}
