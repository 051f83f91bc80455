// Correspondence analysis (CA) result completion

#![doc = include_str!("../README.md")]

pub mod adapters;
pub mod cacomp;
pub mod error;
pub mod matrix;
pub mod recompute;
pub mod residuals;

pub use adapters::{recompute_from, AnnotatedEmbedding, CaSource, MiscValue, ReductionSlot};
pub use cacomp::{CaComp, CaCompParts, DerivedFields};
pub use error::{CaError, MarginAxis, Result};
pub use matrix::LabeledMatrix;
pub use recompute::{derive_fields, recompute, recompute_with_config, RecomputeConfig};
pub use residuals::{comp_margins, comp_std_residuals, Margins, Masses, StdResiduals};
