//! Name resolution for drugs and allergens.
//!
//! Pipeline: Recorded text → Normalization → Fuzzy allergen matching

mod matcher;
mod normalizer;

pub use matcher::*;
pub use normalizer::*;
