//! Dental finding engine.
//!
//! Pipeline: Extraction (text → findings) → Charting (findings → chart) →
//! Analysis (chart → recommendations)
//!
//! Everything here is deterministic and local. It never calls the
//! generation gateway, so charting keeps working when that service is down.

mod analysis;
mod chart;
mod extractor;

pub use analysis::*;
pub use chart::*;
pub use extractor::*;

use thiserror::Error;

use crate::vocab::NumberingScheme;

/// Dental engine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DentalError {
    #[error("Tooth {tooth} does not exist in the {scheme} numbering scheme")]
    InvalidToothReference { tooth: u16, scheme: NumberingScheme },
}

pub type DentalResult<T> = Result<T, DentalError>;
