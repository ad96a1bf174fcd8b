//! Curated cross-reactivity patterns between allergen and drug classes.

use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::{read_json, DrugClassCatalog, PatternMatch, PatternSource, SourceError, SourceResult};
use super::{BNF, DRUGBANK};
use crate::resolver::NormalizedDrug;

/// One known pattern: an allergy to `allergen_class` implies risk with
/// drugs in `drug_class`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternRule {
    pub allergen_class: String,
    pub drug_class: String,
    pub score: f64,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    pub recommendation: String,
}

impl PatternRule {
    fn new(allergen_class: &str, drug_class: &str, score: f64, description: &str, recommendation: &str) -> Self {
        Self {
            allergen_class: allergen_class.into(),
            drug_class: drug_class.into(),
            score,
            description: description.into(),
            evidence: Vec::new(),
            recommendation: recommendation.into(),
        }
    }

    fn cite(mut self, evidence: &str) -> Self {
        self.evidence.push(evidence.into());
        self
    }
}

/// In-process pattern source, optionally reloaded from a JSON rule file.
pub struct ReferencePatterns {
    name: String,
    rules: RwLock<Vec<PatternRule>>,
    classes: DrugClassCatalog,
    path: Option<PathBuf>,
}

impl ReferencePatterns {
    pub fn new(name: impl Into<String>, rules: Vec<PatternRule>) -> Self {
        Self {
            name: name.into(),
            rules: RwLock::new(rules),
            classes: DrugClassCatalog::new(),
            path: None,
        }
    }

    /// BNF cross-sensitivity guidance.
    pub fn bnf() -> Self {
        Self::new(
            BNF,
            vec![
                PatternRule::new(
                    "penicillin",
                    "cephalosporin",
                    0.8,
                    "Patients with penicillin allergy may react to cephalosporins",
                    "Avoid cephalosporins after immediate penicillin hypersensitivity",
                )
                .cite("BNF: Penicillins, hypersensitivity"),
                PatternRule::new(
                    "penicillin",
                    "carbapenem",
                    0.7,
                    "Patients with penicillin allergy may react to carbapenems",
                    "Use carbapenems with caution and monitor for hypersensitivity",
                )
                .cite("BNF: Carbapenems, cautions"),
                PatternRule::new(
                    "salicylate",
                    "nsaid",
                    0.85,
                    "Aspirin hypersensitivity commonly extends to other NSAIDs",
                    "Do not give NSAIDs where aspirin triggered asthma, angioedema or urticaria",
                )
                .cite("BNF: NSAIDs, contra-indications"),
                PatternRule::new(
                    "nsaid",
                    "salicylate",
                    0.85,
                    "NSAID hypersensitivity commonly extends to aspirin",
                    "Avoid aspirin where an NSAID provoked a hypersensitivity reaction",
                )
                .cite("BNF: Aspirin, contra-indications"),
            ],
        )
    }

    /// DrugBank class cross-reactivity data.
    pub fn drugbank() -> Self {
        Self::new(
            DRUGBANK,
            vec![
                PatternRule::new(
                    "penicillin",
                    "cephalosporin",
                    0.75,
                    "Beta-lactam ring shared between penicillins and cephalosporins",
                    "Consider a non-beta-lactam alternative",
                )
                .cite("DrugBank: beta-lactam antibacterials category"),
                PatternRule::new(
                    "cephalosporin",
                    "penicillin",
                    0.75,
                    "Beta-lactam ring shared between cephalosporins and penicillins",
                    "Consider a non-beta-lactam alternative",
                )
                .cite("DrugBank: beta-lactam antibacterials category"),
                PatternRule::new(
                    "sulfonamide",
                    "sulfonamide",
                    0.9,
                    "Sulfonamide antibacterials share the arylamine sulfonamide group",
                    "Avoid sulfonamide antibacterials",
                )
                .cite("DrugBank: sulfonamides category"),
            ],
        )
    }

    /// Reload rules from `path` on every refresh.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_classes(mut self, classes: DrugClassCatalog) -> Self {
        self.classes = classes;
        self
    }

    fn poisoned(&self) -> SourceError {
        SourceError::unavailable(&self.name, "pattern table lock poisoned")
    }
}

impl PatternSource for ReferencePatterns {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, allergen: &str, drug: &NormalizedDrug) -> SourceResult<Vec<PatternMatch>> {
        // An allergen may be a class ("penicillin") or a drug in one ("amoxicillin")
        let mut allergen_classes = self.classes.classes_of_name(allergen);
        allergen_classes.insert(allergen.to_string());
        let drug_classes = self.classes.classes_of(drug);

        let rules = self.rules.read().map_err(|_| self.poisoned())?;
        Ok(rules
            .iter()
            .filter(|r| allergen_classes.contains(&r.allergen_class) && drug_classes.contains(&r.drug_class))
            .map(|r| PatternMatch {
                score: r.score,
                description: r.description.clone(),
                evidence: r.evidence.clone(),
                recommendation: r.recommendation.clone(),
            })
            .collect())
    }

    fn refresh(&self) -> SourceResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let loaded: Vec<PatternRule> = read_json(&self.name, path)?;
        let mut rules = self.rules.write().map_err(|_| self.poisoned())?;
        *rules = loaded;
        tracing::debug!(source = %self.name, rules = rules.len(), "Pattern rules reloaded");
        Ok(())
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
    fn test_penicillin_to_cephalosporin() {
        let bnf = ReferencePatterns::bnf();
        let hits = bnf.lookup("penicillin", &normalized("Keflex")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, 0.8);
    }

    #[test]
    fn test_drug_allergen_uses_its_class() {
        let bnf = ReferencePatterns::bnf();
        // amoxicillin is a penicillin
        let hits = bnf.lookup("amoxicillin", &normalized("cefalexin")).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_aspirin_nsaid_cross_sensitivity() {
        let bnf = ReferencePatterns::bnf();
        let hits = bnf.lookup("aspirin", &normalized("Nurofen")).unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].description.contains("NSAIDs"));
    }

    #[test]
    fn test_no_pattern() {
        let drugbank = ReferencePatterns::drugbank();
        assert!(drugbank.lookup("latex", &normalized("warfarin")).unwrap().is_empty());
    }

    #[test]
    fn test_refresh_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patterns.json");
        let rules = vec![PatternRule::new("latex", "nsaid", 0.5, "test rule", "check")];
        std::fs::write(&path, serde_json::to_string(&rules).unwrap()).unwrap();

        let source = ReferencePatterns::new("LOCAL", Vec::new()).with_path(&path);
        assert!(source.lookup("latex", &normalized("ibuprofen")).unwrap().is_empty());

        source.refresh().unwrap();
        assert_eq!(source.lookup("latex", &normalized("ibuprofen")).unwrap().len(), 1);
    }

    #[test]
    fn test_refresh_missing_file_fails() {
        let source = ReferencePatterns::bnf().with_path("/nonexistent/patterns.json");
        assert!(matches!(source.refresh(), Err(SourceError::Io { .. })));
        // Old rules survive a failed refresh
        assert_eq!(source.lookup("penicillin", &normalized("cefalexin")).unwrap().len(), 1);
    }
}
