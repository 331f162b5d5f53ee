//! Export functionality: per-appointment text and full-store bundles.

mod bundle;
mod text;

pub use bundle::*;
pub use text::*;
