// src/error.rs

use std::fmt;
use thiserror::Error;

/// Which margin of the original matrix a label lookup ran against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarginAxis {
    /// Row labels of the original matrix (matched against `prin_coords_rows`).
    Rows,
    /// Column labels of the original matrix (matched against `std_coords_cols`).
    Columns,
}

impl fmt::Display for MarginAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginAxis::Rows => write!(f, "row"),
            MarginAxis::Columns => write!(f, "column"),
        }
    }
}

/// Error types for the efficient_ca library.
#[derive(Error, Debug)]
pub enum CaError {
    /// A required field of a CA result is absent.
    #[error("Missing required input: `{field}` is not available")]
    MissingInput { field: &'static str },

    /// An argument is not the expected labeled numeric matrix or result type.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A label referenced by the CA result (or a subset request) is not present.
    /// `missing` counts all unmatched labels; `label` is the first one encountered.
    #[error("Alignment error: {axis} label '{label}' not found ({missing} unmatched in total)")]
    Alignment {
        axis: MarginAxis,
        label: String,
        missing: usize,
    },

    /// Shape or length mismatch between `D` and the coordinate matrices.
    #[error("Dimension mismatch: {0}")]
    Dimension(String),

    /// Values outside the admissible domain (negative counts, non-positive singular values).
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// The (row-restricted) table is empty or sums to zero.
    #[error("Degenerate table: {0}")]
    DegenerateTable(String),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding or decoding of a persisted CA result failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for efficient_ca operations.
pub type Result<T> = std::result::Result<T, CaError>;
