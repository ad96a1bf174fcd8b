//! Medication and allergy inputs.

use serde::{Deserialize, Serialize};

/// A medication as identified for lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugInfo {
    /// Stable medication identifier (formulary or local id)
    pub id: String,
    /// Drug name as prescribed (brand or generic)
    pub name: String,
    /// Therapeutic / chemical class (e.g., "penicillins", "nsaids")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Route of administration (e.g., "PO", "IV")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Active ingredients, for combination products
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_ingredients: Vec<String>,
    /// BNF chapter code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bnf_code: Option<String>,
}

impl DrugInfo {
    /// Create a drug with required fields.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            class: None,
            route: None,
            active_ingredients: Vec::new(),
            bnf_code: None,
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn with_ingredients<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.active_ingredients = ingredients.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_bnf_code(mut self, code: impl Into<String>) -> Self {
        self.bnf_code = Some(code.into());
        self
    }
}

/// A resident's recorded allergy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllergyInfo {
    pub id: String,
    /// Substance the resident reacts to (drug, class or excipient)
    pub allergen: String,
    /// Recorded reaction (e.g., "rash", "anaphylaxis")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<String>,
    /// Recorded severity label, free text from the care record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
}

impl AllergyInfo {
    pub fn new(id: impl Into<String>, allergen: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            allergen: allergen.into(),
            reaction: None,
            severity: None,
        }
    }

    pub fn with_reaction(mut self, reaction: impl Into<String>) -> Self {
        self.reaction = Some(reaction.into());
        self
    }

    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    /// Whether the recorded reaction was anaphylactic.
    pub fn is_anaphylactic(&self) -> bool {
        self.reaction
            .as_deref()
            .map(|r| r.to_lowercase().contains("anaphyla"))
            .unwrap_or(false)
    }

    /// Anaphylaxis, or a recorded severity of severe / life-threatening.
    pub fn is_life_threatening(&self) -> bool {
        if self.is_anaphylactic() {
            return true;
        }
        self.severity
            .as_deref()
            .map(|s| {
                let s = s.to_lowercase();
                LIFE_THREATENING_LABELS.iter().any(|label| s.contains(label))
            })
            .unwrap_or(false)
    }
}

/// Recorded severity wording treated as life-threatening.
const LIFE_THREATENING_LABELS: &[&str] = &["severe", "life", "anaphyla", "critical"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_skipped() {
        let json = serde_json::to_string(&DrugInfo::new("d1", "Warfarin")).unwrap();
        assert_eq!(json, r#"{"id":"d1","name":"Warfarin"}"#);
    }

    #[test]
    fn test_anaphylaxis() {
        let allergy = AllergyInfo::new("a1", "penicillin").with_reaction("Anaphylaxis 2019");
        assert!(allergy.is_anaphylactic());
        assert!(!AllergyInfo::new("a2", "latex").is_anaphylactic());
    }

    #[test]
    fn test_recorded_severity_counts() {
        assert!(AllergyInfo::new("a1", "warfarin").with_severity("Severe").is_life_threatening());
        assert!(AllergyInfo::new("a2", "penicillin").with_reaction("anaphylaxis").is_life_threatening());
        assert!(!AllergyInfo::new("a3", "latex").with_severity("mild").is_life_threatening());
        assert!(!AllergyInfo::new("a4", "latex").is_life_threatening());
    }
}
