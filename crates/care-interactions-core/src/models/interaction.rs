//! Interaction findings produced by the checking services.

use serde::{Deserialize, Serialize};

use super::severity::{Confidence, Severity};

/// Length-prefixed join of key components: `2:d1;2:d2`.
///
/// Components may contain any character without two keys colliding.
pub fn composite_key<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts
        .into_iter()
        .map(|part| format!("{}:{}", part.len(), part))
        .collect::<Vec<_>>()
        .join(";")
}

/// Order-independent key for a pair of ids, smaller id first.
pub fn pair_key(a: &str, b: &str) -> String {
    if a <= b {
        composite_key([a, b])
    } else {
        composite_key([b, a])
    }
}

/// Kind of interaction finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    DrugDrug,
    Allergy,
    Contraindication,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::DrugDrug => "DRUG_DRUG",
            InteractionType::Allergy => "ALLERGY",
            InteractionType::Contraindication => "CONTRAINDICATION",
        }
    }
}

/// A single interaction finding reported by one or more sources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugInteraction {
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// Drug ids involved (the new drug first, as reported)
    pub affected_drugs: Vec<String>,
    /// Allergen (ALLERGY) or condition (CONTRAINDICATION) the finding is about
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    /// Names of the sources that reported this finding
    #[serde(default)]
    pub sources: Vec<String>,
}

impl DrugInteraction {
    pub fn new(
        kind: InteractionType,
        severity: Severity,
        description: impl Into<String>,
        affected_drugs: Vec<String>,
    ) -> Self {
        Self {
            kind,
            severity,
            description: description.into(),
            evidence: Vec::new(),
            recommendations: Vec::new(),
            affected_drugs,
            qualifier: None,
            sources: Vec::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.sources.push(source.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence.push(evidence.into());
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    /// Key over the sorted, distinct affected drug ids.
    pub fn drug_key(&self) -> String {
        let mut ids: Vec<&str> = self.affected_drugs.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();
        composite_key(ids)
    }
}

/// A drug-food interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodInteraction {
    pub drug_id: String,
    pub food: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// A dosing alert for a drug (maximum dose, renal adjustment, etc.).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoseAlert {
    pub drug_id: String,
    pub alert: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_daily_dose: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Kind of cross-reactivity evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrossReactivityType {
    Structural,
    KnownPattern,
    Predicted,
}

/// One piece of evidence contributing to an allergy interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossReactivity {
    #[serde(rename = "type")]
    pub kind: CrossReactivityType,
    pub source: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: Confidence,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub recommendation: String,
}

/// Combined result of checking a medication against one allergy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllergyInteraction {
    pub medication_id: String,
    pub allergy_id: String,
    pub severity: Severity,
    /// Whether a source reported a direct allergen match
    pub direct_match: bool,
    #[serde(default)]
    pub cross_reactivity: Vec<CrossReactivity>,
    #[serde(default)]
    pub class_warnings: Vec<String>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    /// RFC 3339 timestamp of the check
    pub checked_at: String,
}

impl AllergyInteraction {
    /// Flatten into the generic finding shape used in reports.
    pub fn to_drug_interaction(&self, description: impl Into<String>) -> DrugInteraction {
        let mut sources: Vec<String> = self
            .cross_reactivity
            .iter()
            .map(|c| c.source.clone())
            .collect();
        sources.sort();
        sources.dedup();

        DrugInteraction {
            kind: InteractionType::Allergy,
            severity: self.severity,
            description: description.into(),
            evidence: self.evidence.clone(),
            recommendations: self.recommendations.clone(),
            affected_drugs: vec![self.medication_id.clone()],
            qualifier: Some(self.allergy_id.clone()),
            sources,
        }
    }
}
