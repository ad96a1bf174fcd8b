//! Drug → allergy-relevant class membership.

use std::collections::{BTreeSet, HashMap};

use crate::resolver::NormalizedDrug;

/// Catalog of the allergy-relevant classes each canonical drug belongs to.
#[derive(Debug, Clone)]
pub struct DrugClassCatalog {
    classes: HashMap<String, Vec<String>>,
    /// BNF section prefix → class, for drugs the name table does not know
    sections: Vec<(String, String)>,
}

impl Default for DrugClassCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl DrugClassCatalog {
    /// Create a catalog with default memberships.
    pub fn new() -> Self {
        Self {
            classes: Self::default_classes(),
            sections: Self::default_sections(),
        }
    }

    /// Empty catalog.
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
            sections: Vec::new(),
        }
    }

    /// Register class memberships for a canonical drug name.
    pub fn add(&mut self, drug: &str, classes: &[&str]) {
        let entry = self.classes.entry(drug.to_lowercase()).or_default();
        for class in classes {
            let class = class.to_lowercase();
            if !entry.contains(&class) {
                entry.push(class);
            }
        }
    }

    /// Map a BNF section code prefix (e.g. "050101") to a class.
    pub fn add_section(&mut self, prefix: &str, class: &str) {
        self.sections.push((prefix.to_string(), class.to_lowercase()));
    }

    /// All classes of a drug: its recorded class, its BNF section's class
    /// and those of its ingredients.
    pub fn classes_of(&self, drug: &NormalizedDrug) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        if let Some(class) = &drug.class {
            out.insert(class.clone());
        }
        if let Some(code) = &drug.bnf_code {
            out.extend(
                self.sections
                    .iter()
                    .filter(|(prefix, _)| code.starts_with(prefix.as_str()))
                    .map(|(_, class)| class.clone()),
            );
        }
        let names = std::iter::once(&drug.name).chain(drug.ingredients.iter());
        for name in names {
            if let Some(classes) = self.classes.get(name) {
                out.extend(classes.iter().cloned());
            }
        }
        out
    }

    /// Classes recorded for a single canonical name.
    pub fn classes_of_name(&self, name: &str) -> BTreeSet<String> {
        self.classes
            .get(name)
            .map(|classes| classes.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn default_classes() -> HashMap<String, Vec<String>> {
        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        let mut add = |drug: &str, classes: &[&str]| {
            map.insert(drug.into(), classes.iter().map(|c| c.to_string()).collect());
        };

        // Beta-lactams
        add("amoxicillin", &["penicillin", "beta-lactam"]);
        add("ampicillin", &["penicillin", "beta-lactam"]);
        add("flucloxacillin", &["penicillin", "beta-lactam"]);
        add("phenoxymethylpenicillin", &["penicillin", "beta-lactam"]);
        add("benzylpenicillin", &["penicillin", "beta-lactam"]);
        add("piperacillin", &["penicillin", "beta-lactam"]);
        add("co-amoxiclav", &["penicillin", "beta-lactam"]);
        add("cefalexin", &["cephalosporin", "beta-lactam"]);
        add("cefuroxime", &["cephalosporin", "beta-lactam"]);
        add("ceftriaxone", &["cephalosporin", "beta-lactam"]);
        add("meropenem", &["carbapenem", "beta-lactam"]);

        // Other antibacterials
        add("clarithromycin", &["macrolide"]);
        add("erythromycin", &["macrolide"]);
        add("azithromycin", &["macrolide"]);
        add("ciprofloxacin", &["fluoroquinolone"]);
        add("levofloxacin", &["fluoroquinolone"]);
        add("co-trimoxazole", &["sulfonamide"]);
        add("sulfamethoxazole", &["sulfonamide"]);

        // Analgesics
        add("aspirin", &["salicylate", "nsaid"]);
        add("ibuprofen", &["nsaid"]);
        add("naproxen", &["nsaid"]);
        add("diclofenac", &["nsaid"]);
        add("codeine", &["opioid"]);
        add("morphine", &["opioid"]);
        add("tramadol", &["opioid"]);
        add("oxycodone", &["opioid"]);
        add("co-codamol", &["opioid"]);

        map
    }

    fn default_sections() -> Vec<(String, String)> {
        [
            ("050101", "penicillin"),
            ("050102", "cephalosporin"),
            ("050105", "macrolide"),
            ("050112", "fluoroquinolone"),
            ("040702", "opioid"),
            ("100101", "nsaid"),
        ]
        .iter()
        .map(|(prefix, class)| (prefix.to_string(), class.to_string()))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drug(name: &str, class: Option<&str>) -> NormalizedDrug {
        NormalizedDrug {
            id: "d1".into(),
            name: name.into(),
            ingredients: vec![name.into()],
            class: class.map(|c| c.into()),
            route: None,
            bnf_code: None,
        }
    }

    #[test]
    fn test_classes_of() {
        let catalog = DrugClassCatalog::new();
        let classes = catalog.classes_of(&drug("amoxicillin", None));
        assert!(classes.contains("penicillin"));
        assert!(classes.contains("beta-lactam"));
        assert!(!classes.contains("cephalosporin"));
    }

    #[test]
    fn test_recorded_class_included() {
        let catalog = DrugClassCatalog::new();
        let classes = catalog.classes_of(&drug("newcillin", Some("penicillin")));
        assert_eq!(classes.into_iter().collect::<Vec<_>>(), vec!["penicillin"]);
    }

    #[test]
    fn test_unknown_drug_has_no_classes() {
        let catalog = DrugClassCatalog::new();
        assert!(catalog.classes_of(&drug("warfarin", None)).is_empty());
    }

    #[test]
    fn test_bnf_section_class() {
        let catalog = DrugClassCatalog::new();
        let mut unknown = drug("newcillin", None);
        unknown.bnf_code = Some("0501012N0".into());
        assert!(catalog.classes_of(&unknown).contains("penicillin"));

        unknown.bnf_code = Some("0205".into());
        assert!(catalog.classes_of(&unknown).is_empty());
    }

    #[test]
    fn test_add_custom() {
        let mut catalog = DrugClassCatalog::empty();
        catalog.add("Temocillin", &["Penicillin"]);
        assert!(catalog.classes_of(&drug("temocillin", None)).contains("penicillin"));
    }
}
