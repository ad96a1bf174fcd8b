//! Domain models for the interaction checking system.

mod drug;
mod interaction;
mod region;
mod report;
mod severity;

pub use drug::*;
pub use interaction::*;
pub use region::*;
pub use report::*;
pub use severity::*;
