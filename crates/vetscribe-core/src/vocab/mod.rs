//! Clinical vocabulary tables.
//!
//! Static, read-only reference data used by the dental engine:
//! - Tooth numbering schemes (modified Triadan, canine and feline)
//! - Recognized dental conditions with their trigger keywords
//! - Severity and negation cues
//!
//! The tables are data, not code. Bump [`VOCABULARY_VERSION`] whenever a
//! keyword, default severity or recommendation changes so that stored charts
//! can be traced back to the table that produced them.

mod conditions;
mod teeth;

pub use conditions::*;
pub use teeth::*;

/// Version of the keyword/condition tables.
pub const VOCABULARY_VERSION: &str = "2024.2";
