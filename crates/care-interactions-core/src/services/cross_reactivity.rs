//! Cross-reactivity analysis: structural similarity, known patterns and
//! model predictions, merged into one deduplicated list.

use std::sync::Arc;

use super::dedup::{deduplicate_items, sort_by_severity};
use super::error::InteractionResult;
use super::fanout::{gather, Gathered};
use crate::models::{AllergyInfo, Confidence, CrossReactivity, CrossReactivityType, DrugInfo, Severity};
use crate::resolver::{NormalizedDrug, Normalizer};
use crate::sources::{
    tanimoto, CrossReactivityPredictor, PatternMatch, PatternSource, SourceResult, StructureSource,
};

/// Minimum structural similarity / model probability reported.
pub const SIMILARITY_THRESHOLD: f64 = 0.75;

/// Standard recommendation for a cross-reactivity severity.
pub fn recommendation_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Avoid: high likelihood of cross-reaction",
        Severity::High => "Avoid unless no alternative; prescriber review required",
        Severity::Medium => "Use with caution and monitor for hypersensitivity",
        Severity::Low => "Monitor for signs of hypersensitivity",
    }
}

pub struct CrossReactivityService {
    normalizer: Arc<Normalizer>,
    structures: Arc<dyn StructureSource>,
    patterns: Vec<Arc<dyn PatternSource>>,
    predictor: Arc<dyn CrossReactivityPredictor>,
    threshold: f64,
}

impl CrossReactivityService {
    pub fn new(
        normalizer: Arc<Normalizer>,
        structures: Arc<dyn StructureSource>,
        patterns: Vec<Arc<dyn PatternSource>>,
        predictor: Arc<dyn CrossReactivityPredictor>,
    ) -> Self {
        Self {
            normalizer,
            structures,
            patterns,
            predictor,
            threshold: SIMILARITY_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Cross-reactivity findings for giving `medication` to someone with `allergy`.
    pub fn analyze(&self, medication: &DrugInfo, allergy: &AllergyInfo) -> InteractionResult<Vec<CrossReactivity>> {
        Ok(self.analyze_detailed(medication, allergy)?.items)
    }

    /// As [`analyze`](Self::analyze), also reporting which analyses failed.
    pub fn analyze_detailed(
        &self,
        medication: &DrugInfo,
        allergy: &AllergyInfo,
    ) -> InteractionResult<Gathered<CrossReactivity>> {
        let drug = self.normalizer.normalize_drug(medication);
        let allergen = self.normalizer.canonical_allergen(&allergy.allergen);

        let (structural, (patterns, predicted)) = rayon::join(
            || self.structural(&allergen, &drug),
            || rayon::join(|| self.known_patterns(&allergen, &drug), || self.predicted(&allergen, &drug)),
        );

        let mut gathered = structural;
        gathered.merge(patterns);
        gathered.merge(predicted);
        let mut gathered = gathered.require_any("analyze_cross_reactivity")?;

        gathered.items = deduplicate_items(std::mem::take(&mut gathered.items));
        sort_by_severity(&mut gathered.items);

        tracing::debug!(
            medication = %medication.id,
            allergy = %allergy.id,
            findings = gathered.items.len(),
            failed = gathered.failures.len(),
            "Cross-reactivity analysed"
        );
        Ok(gathered)
    }

    /// Refresh every pattern source.
    pub fn refresh_patterns(&self) -> Gathered<String> {
        gather(&self.patterns, "refresh", |p| p.refresh().map(|_| vec![p.name().to_string()]))
    }

    fn structural(&self, allergen: &str, drug: &NormalizedDrug) -> Gathered<CrossReactivity> {
        let mut gathered = Gathered::new();
        let result = self.structural_matches(allergen, drug);
        gathered.absorb(self.structures.name(), "structural_similarity", result);
        gathered
    }

    fn structural_matches(&self, allergen: &str, drug: &NormalizedDrug) -> SourceResult<Vec<CrossReactivity>> {
        let Some(reference) = self.structures.fingerprint(allergen)? else {
            return Ok(Vec::new());
        };

        // Identical substances are a direct match, not cross-reactivity
        let mut best: Option<(f64, &str, Vec<String>)> = None;
        for substance in drug.ingredients.iter().filter(|i| i.as_str() != allergen) {
            let Some(candidate) = self.structures.fingerprint(substance)? else {
                continue;
            };
            let score = tanimoto(&reference, &candidate);
            if best.as_ref().map(|(s, _, _)| score > *s).unwrap_or(true) {
                let shared = reference.shared(&candidate).cloned().collect();
                best = Some((score, substance.as_str(), shared));
            }
        }

        Ok(best
            .filter(|(score, _, _)| *score >= self.threshold)
            .map(|(score, substance, shared)| {
                let severity = Severity::from_score(score);
                CrossReactivity {
                    kind: CrossReactivityType::Structural,
                    source: self.structures.name().to_string(),
                    description: format!(
                        "{} is structurally similar to {} (similarity {:.2})",
                        substance, allergen, score
                    ),
                    severity,
                    confidence: Confidence::from_score(score),
                    evidence: vec![format!("Shared substructures: {}", shared.join(", "))],
                    recommendation: recommendation_for(severity).to_string(),
                }
            })
            .into_iter()
            .collect())
    }

    fn known_patterns(&self, allergen: &str, drug: &NormalizedDrug) -> Gathered<CrossReactivity> {
        gather(&self.patterns, "known_patterns", |source| {
            let hits = source.lookup(allergen, drug)?;
            Ok(hits
                .into_iter()
                .map(|hit| pattern_finding(source.name(), hit))
                .collect())
        })
    }

    fn predicted(&self, allergen: &str, drug: &NormalizedDrug) -> Gathered<CrossReactivity> {
        let mut gathered = Gathered::new();
        let result = self.predictor.predict(allergen, drug).map(|prediction| {
            prediction
                .filter(|p| p.probability >= self.threshold)
                .map(|p| {
                    let severity = Severity::from_score(p.probability);
                    CrossReactivity {
                        kind: CrossReactivityType::Predicted,
                        source: self.predictor.name().to_string(),
                        description: format!(
                            "Model {} predicts a {:.0}% probability of cross-reaction between {} and {}",
                            p.model_version,
                            p.probability * 100.0,
                            allergen,
                            drug.name
                        ),
                        severity,
                        confidence: Confidence::from_score(p.probability),
                        evidence: p.features,
                        recommendation: recommendation_for(severity).to_string(),
                    }
                })
                .into_iter()
                .collect()
        });
        gathered.absorb(self.predictor.name(), "ml_prediction", result);
        gathered
    }
}

fn pattern_finding(source: &str, hit: PatternMatch) -> CrossReactivity {
    let severity = Severity::from_score(hit.score);
    CrossReactivity {
        kind: CrossReactivityType::KnownPattern,
        source: source.to_string(),
        description: hit.description,
        severity,
        confidence: Confidence::from_score(hit.score),
        evidence: hit.evidence,
        recommendation: hit.recommendation,
    }
}
