//! External knowledge sources.
//!
//! Every clinical, regulatory and prediction collaborator is a trait so the
//! services can be wired to live services or to the in-process reference
//! implementations shipped here. All traits are `Send + Sync`: the services
//! fan out across them in parallel.

mod classes;
mod formulary;
#[cfg(test)]
pub(crate) mod offline;
mod patterns;
mod prediction;
mod regulator;
mod structure;

pub use classes::*;
pub use formulary::*;
pub use patterns::*;
pub use prediction::*;
pub use regulator::*;
pub use structure::*;

use std::path::Path;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{AllergyInfo, DoseAlert, DrugInfo, DrugInteraction, FoodInteraction, Regulator};
use crate::resolver::NormalizedDrug;

/// Source name for the British National Formulary.
pub const BNF: &str = "BNF";
/// Source name for NICE guidance.
pub const NICE: &str = "NICE";
/// Source name for DrugBank.
pub const DRUGBANK: &str = "DRUGBANK";

/// Source errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("{name} unavailable: {message}")]
    Unavailable { name: String, message: String },

    #[error("{name} returned malformed data: {message}")]
    Malformed { name: String, message: String },

    #[error("Cannot read {path}: {message}")]
    Io { path: String, message: String },
}

impl SourceError {
    pub fn unavailable(name: impl Into<String>, message: impl Into<String>) -> Self {
        SourceError::Unavailable {
            name: name.into(),
            message: message.into(),
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Load a source's JSON data file.
pub(crate) fn read_json<T: DeserializeOwned>(name: &str, path: &Path) -> SourceResult<T> {
    let raw = std::fs::read_to_string(path).map_err(|e| SourceError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&raw).map_err(|e| SourceError::Malformed {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// A clinical drug knowledge base (BNF, NICE).
pub trait ClinicalSource: Send + Sync {
    /// Name recorded in a finding's `sources`.
    fn name(&self) -> &str;

    /// Interactions between two drugs. Must be symmetric in `a` and `b`.
    fn check_drug_interaction(&self, a: &DrugInfo, b: &DrugInfo) -> SourceResult<Vec<DrugInteraction>>;

    /// Direct allergy warnings for a drug against one recorded allergy.
    fn check_allergy_interaction(
        &self,
        drug: &DrugInfo,
        allergy: &AllergyInfo,
    ) -> SourceResult<Vec<DrugInteraction>>;

    fn get_contraindications(&self, drug: &DrugInfo) -> SourceResult<Vec<DrugInteraction>>;

    fn get_food_interactions(&self, drug: &DrugInfo) -> SourceResult<Vec<FoodInteraction>>;

    fn get_dose_alerts(&self, drug: &DrugInfo) -> SourceResult<Vec<DoseAlert>>;

    /// Refresh the source's data.
    fn update_database(&self) -> SourceResult<()>;
}

/// A regional regulator's medicines rules for children's homes.
pub trait RegulatorySource: Send + Sync {
    fn regulator(&self) -> Regulator;

    /// Regulator-specific findings for giving `drug` alongside `current`.
    fn check_medication(
        &self,
        drug: &DrugInfo,
        current: &[DrugInfo],
    ) -> SourceResult<Vec<DrugInteraction>>;
}

/// A cross-reactivity pattern hit from a curated source.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch {
    /// Reported likelihood of cross-reaction, 0.0 - 1.0
    pub score: f64,
    pub description: String,
    pub evidence: Vec<String>,
    pub recommendation: String,
}

/// Curated cross-reactivity patterns (BNF, DrugBank).
pub trait PatternSource: Send + Sync {
    fn name(&self) -> &str;

    /// Known patterns linking a canonical allergen to a drug.
    fn lookup(&self, allergen: &str, drug: &NormalizedDrug) -> SourceResult<Vec<PatternMatch>>;

    /// Refresh the pattern data.
    fn refresh(&self) -> SourceResult<()>;
}

/// Chemical structure data for similarity analysis.
pub trait StructureSource: Send + Sync {
    fn name(&self) -> &str;

    /// Substructure fingerprint for a canonical substance name, if known.
    fn fingerprint(&self, substance: &str) -> SourceResult<Option<Fingerprint>>;
}

/// An ML model's cross-reactivity prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted probability of cross-reaction, 0.0 - 1.0
    pub probability: f64,
    pub model_version: String,
    /// Features the model reports as contributing
    pub features: Vec<String>,
}

/// Cross-reactivity prediction model.
pub trait CrossReactivityPredictor: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, allergen: &str, drug: &NormalizedDrug) -> SourceResult<Option<Prediction>>;
}
