//! Domain models for the VetScribe system.

mod appointment;
mod dental;
mod patient;
mod pims;
mod template;

pub use appointment::*;
pub use dental::*;
pub use patient::*;
pub use pims::*;
pub use template::*;
