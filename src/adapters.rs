// src/adapters.rs

//! Extraction of partial CA results from analysis containers.
//!
//! Each container kind stores the three ground-truth quantities in its own
//! layout. Implementations of [`CaSource`] translate that layout into a
//! [`CaComp`]; everything downstream is independent of the container kind.

use crate::cacomp::{CaComp, CaCompParts};
use crate::error::{CaError, MarginAxis, Result};
use crate::matrix::LabeledMatrix;
use crate::recompute::recompute;
use log::{debug, info};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A container that can hand over a partial CA result.
pub trait CaSource {
    /// Short name of the container kind, used in log and error messages.
    fn kind(&self) -> &'static str;

    /// Extracts `std_coords_cols`, `D`, `prin_coords_rows` and `top_rows`.
    ///
    /// Must fail with `CaError::MissingInput` rather than proceed when any of
    /// them is absent.
    fn extract(&self) -> Result<CaComp>;
}

/// Extracts the CA result stored in `source` and completes it against `mat`.
pub fn recompute_from<S: CaSource + ?Sized>(source: &S, mat: &LabeledMatrix) -> Result<CaComp> {
    let ca = source.extract()?;
    info!(
        "Extracted CA result from {} container ({} dims, top_rows = {})",
        source.kind(),
        ca.dims(),
        ca.top_rows()
    );
    recompute(&ca, mat)
}

/// Payload of a free-form metadata slot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum MiscValue {
    Vector(Array1<f64>),
    Matrix(LabeledMatrix),
    Count(usize),
    Text(String),
}

impl MiscValue {
    fn variant_name(&self) -> &'static str {
        match self {
            MiscValue::Vector(_) => "vector",
            MiscValue::Matrix(_) => "matrix",
            MiscValue::Count(_) => "count",
            MiscValue::Text(_) => "text",
        }
    }
}

fn expect_vector(key: &str, value: &MiscValue) -> Result<Array1<f64>> {
    match value {
        MiscValue::Vector(v) => Ok(v.clone()),
        other => Err(CaError::TypeMismatch(format!(
            "'{}' must hold a vector of singular values, found a {}",
            key,
            other.variant_name()
        ))),
    }
}

fn expect_matrix(key: &str, value: &MiscValue) -> Result<LabeledMatrix> {
    match value {
        MiscValue::Matrix(m) => Ok(m.clone()),
        other => Err(CaError::TypeMismatch(format!(
            "'{}' must hold a labeled matrix, found a {}",
            key,
            other.variant_name()
        ))),
    }
}

/// Dimensionality-reduction slot with separate cell embeddings, feature
/// loadings and a free-form metadata map.
///
/// Layout: embeddings are `std_coords_cols` (one row per column of the
/// original table), loadings are `prin_coords_rows`, `misc["D"]` holds the
/// singular values and `top_rows` is the number of loading rows.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ReductionSlot {
    pub embeddings: Option<LabeledMatrix>,
    pub loadings: Option<LabeledMatrix>,
    pub misc: HashMap<String, MiscValue>,
}

impl ReductionSlot {
    pub const SINGULAR_VALUES_KEY: &'static str = "D";

    /// Stores the ground-truth quantities of `ca` in this layout.
    pub fn from_cacomp(ca: &CaComp) -> Self {
        let mut misc = HashMap::new();
        misc.insert(
            Self::SINGULAR_VALUES_KEY.to_string(),
            MiscValue::Vector(ca.d().clone()),
        );
        Self {
            embeddings: Some(ca.std_coords_cols().clone()),
            loadings: Some(ca.prin_coords_rows().clone()),
            misc,
        }
    }
}

impl CaSource for ReductionSlot {
    fn kind(&self) -> &'static str {
        "reduction-slot"
    }

    fn extract(&self) -> Result<CaComp> {
        let d = self
            .misc
            .get(Self::SINGULAR_VALUES_KEY)
            .map(|value| expect_vector(Self::SINGULAR_VALUES_KEY, value))
            .transpose()?;
        let top_rows = self.loadings.as_ref().map(LabeledMatrix::nrows);
        CaCompParts {
            std_coords_cols: self.embeddings.clone(),
            d,
            prin_coords_rows: self.loadings.clone(),
            top_rows,
        }
        .into_cacomp()
    }
}

/// Column embedding matrix carrying the rest of the result as named
/// attributes. Attributes do not survive subsetting.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AnnotatedEmbedding {
    pub embedding: LabeledMatrix,
    pub attributes: HashMap<String, MiscValue>,
}

impl AnnotatedEmbedding {
    pub const SINGULAR_VALUES_KEY: &'static str = "singval";
    pub const ROW_COORDS_KEY: &'static str = "prin_coords_rows";

    /// Stores the ground-truth quantities of `ca` in this layout.
    pub fn from_cacomp(ca: &CaComp) -> Self {
        let mut attributes = HashMap::new();
        attributes.insert(
            Self::SINGULAR_VALUES_KEY.to_string(),
            MiscValue::Vector(ca.d().clone()),
        );
        attributes.insert(
            Self::ROW_COORDS_KEY.to_string(),
            MiscValue::Matrix(ca.prin_coords_rows().clone()),
        );
        Self {
            embedding: ca.std_coords_cols().clone(),
            attributes,
        }
    }

    /// Keeps only the embedding rows named in `labels`. The attributes are
    /// dropped, so the result no longer describes a complete CA.
    pub fn subset<S: AsRef<str>>(&self, labels: &[S]) -> Result<Self> {
        // embedding rows are the columns of the original table
        let embedding = self
            .embedding
            .select_rows(labels)
            .map_err(|e| match e {
                CaError::Alignment { label, missing, .. } => CaError::Alignment {
                    axis: MarginAxis::Columns,
                    label,
                    missing,
                },
                other => other,
            })?;
        debug!(
            "Subset embedding from {} to {} rows; dropping {} attributes",
            self.embedding.nrows(),
            embedding.nrows(),
            self.attributes.len()
        );
        Ok(Self {
            embedding,
            attributes: HashMap::new(),
        })
    }
}

impl CaSource for AnnotatedEmbedding {
    fn kind(&self) -> &'static str {
        "annotated-embedding"
    }

    fn extract(&self) -> Result<CaComp> {
        let d = self
            .attributes
            .get(Self::SINGULAR_VALUES_KEY)
            .map(|value| expect_vector(Self::SINGULAR_VALUES_KEY, value))
            .transpose()?;
        let prin_coords_rows = self
            .attributes
            .get(Self::ROW_COORDS_KEY)
            .map(|value| expect_matrix(Self::ROW_COORDS_KEY, value))
            .transpose()?;
        let top_rows = prin_coords_rows.as_ref().map(LabeledMatrix::nrows);
        CaCompParts {
            std_coords_cols: Some(self.embedding.clone()),
            d,
            prin_coords_rows,
            top_rows,
        }
        .into_cacomp()
    }
}

impl CaSource for CaComp {
    fn kind(&self) -> &'static str {
        "cacomp"
    }

    fn extract(&self) -> Result<CaComp> {
        let mut ca = self.clone();
        ca.clear_derived();
        Ok(ca)
    }
}
