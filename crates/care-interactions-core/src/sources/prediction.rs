//! Snapshot of a cross-reactivity model's class-level predictions.

use std::collections::HashMap;

use super::{CrossReactivityPredictor, DrugClassCatalog, Prediction, SourceResult};
use crate::resolver::NormalizedDrug;

/// Version label reported by the built-in snapshot.
pub const REFERENCE_MODEL_VERSION: &str = "class-snapshot-1";

/// Predictor answering from a frozen table of class-pair probabilities.
pub struct ReferencePredictor {
    name: String,
    model_version: String,
    /// (allergen class, drug class) → probability
    table: HashMap<(String, String), f64>,
    classes: DrugClassCatalog,
}

impl Default for ReferencePredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferencePredictor {
    pub fn new() -> Self {
        let mut predictor = Self::empty("ML_MODEL");
        predictor.insert("penicillin", "cephalosporin", 0.78);
        predictor.insert("penicillin", "carbapenem", 0.62);
        predictor.insert("cephalosporin", "penicillin", 0.76);
        predictor.insert("salicylate", "nsaid", 0.88);
        predictor.insert("nsaid", "nsaid", 0.91);
        predictor.insert("sulfonamide", "sulfonamide", 0.93);
        predictor.insert("macrolide", "macrolide", 0.82);
        predictor.insert("opioid", "opioid", 0.55);
        predictor
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model_version: REFERENCE_MODEL_VERSION.into(),
            table: HashMap::new(),
            classes: DrugClassCatalog::new(),
        }
    }

    pub fn insert(&mut self, allergen_class: &str, drug_class: &str, probability: f64) {
        self.table
            .insert((allergen_class.into(), drug_class.into()), probability.clamp(0.0, 1.0));
    }
}

impl CrossReactivityPredictor for ReferencePredictor {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, allergen: &str, drug: &NormalizedDrug) -> SourceResult<Option<Prediction>> {
        let mut allergen_classes = self.classes.classes_of_name(allergen);
        allergen_classes.insert(allergen.to_string());
        let drug_classes = self.classes.classes_of(drug);

        let mut best: Option<(f64, &str, &str)> = None;
        for a in &allergen_classes {
            for d in &drug_classes {
                if let Some(&p) = self.table.get(&(a.clone(), d.clone())) {
                    if best.map(|(bp, _, _)| p > bp).unwrap_or(true) {
                        best = Some((p, a.as_str(), d.as_str()));
                    }
                }
            }
        }

        Ok(best.map(|(probability, a, d)| Prediction {
            probability,
            model_version: self.model_version.clone(),
            features: vec![format!("allergen_class={}", a), format!("drug_class={}", d)],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DrugInfo;
    use crate::resolver::Normalizer;

    fn normalized(name: &str) -> NormalizedDrug {
        Normalizer::new().normalize_drug(&DrugInfo::new("d1", name))
    }

    #[test]
    fn test_predicts_best_class_pair() {
        let model = ReferencePredictor::new();
        let p = model.predict("aspirin", &normalized("ibuprofen")).unwrap().unwrap();
        // nsaid→nsaid (0.91) beats salicylate→nsaid (0.88)
        assert_eq!(p.probability, 0.91);
        assert_eq!(p.model_version, REFERENCE_MODEL_VERSION);
        assert!(p.features.contains(&"drug_class=nsaid".to_string()));
    }

    #[test]
    fn test_no_prediction_for_unrelated() {
        let model = ReferencePredictor::new();
        assert!(model.predict("latex", &normalized("warfarin")).unwrap().is_none());
    }

    #[test]
    fn test_probability_clamped() {
        let mut model = ReferencePredictor::empty("TEST");
        model.insert("egg", "nsaid", 1.7);
        let p = model.predict("egg", &normalized("naproxen")).unwrap().unwrap();
        assert_eq!(p.probability, 1.0);
    }
}
