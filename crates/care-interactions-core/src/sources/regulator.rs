//! Regulator medicines rules for children's homes.

use std::sync::Arc;

use super::{RegulatorySource, SourceResult};
use crate::models::{DrugInfo, DrugInteraction, InteractionType, Region, Regulator, Severity};
use crate::resolver::Normalizer;

/// Qualifier attached to every regulator finding.
pub const CHILDREN_HOME_QUALIFIER: &str = "children's home";

const CONTROLLED_DRUGS: &[&str] = &[
    "morphine",
    "oxycodone",
    "methylphenidate",
    "diazepam",
    "tramadol",
];

const SEDATIVES: &[&str] = &[
    "diazepam",
    "melatonin",
    "morphine",
    "codeine",
    "promethazine",
];

/// Rule describing a single-drug restriction.
#[derive(Debug, Clone, PartialEq)]
struct DrugRule {
    drug: &'static str,
    severity: Severity,
    description: &'static str,
}

/// Reference rules for one regulator.
pub struct ReferenceRegulator {
    regulator: Regulator,
    citation: &'static str,
    rules: Vec<DrugRule>,
    normalizer: Normalizer,
}

impl ReferenceRegulator {
    pub fn new(regulator: Regulator) -> Self {
        let citation = match regulator {
            Regulator::Ofsted => "Children's Homes (England) Regulations 2015, regulation 23",
            Regulator::Ciw => "CIW medicines management guidance for children's homes",
            Regulator::CareInspectorate => "Care Inspectorate guidance on medicines in care services for children",
            Regulator::Rqia => "RQIA minimum standards for children's homes, medicines management",
            Regulator::Hiqa => "HIQA national standards for children's residential centres, medication",
            Regulator::Cqc => "CQC medicines in care homes guidance",
        };

        Self {
            regulator,
            citation,
            rules: Self::default_rules(),
            normalizer: Normalizer::new(),
        }
    }

    fn default_rules() -> Vec<DrugRule> {
        let mut rules = vec![
            DrugRule {
                drug: "aspirin",
                severity: Severity::High,
                description: "Aspirin must not be given to a child under 16 without a prescriber's written instruction (Reye's syndrome)",
            },
            DrugRule {
                drug: "codeine",
                severity: Severity::High,
                description: "Codeine is contra-indicated in children under 12 and after tonsillectomy",
            },
            DrugRule {
                drug: "tramadol",
                severity: Severity::High,
                description: "Tramadol is not licensed for children under 12",
            },
        ];
        rules.extend(CONTROLLED_DRUGS.iter().map(|&drug| DrugRule {
            drug,
            severity: Severity::Medium,
            description: "Controlled drug: two-person witnessed administration and a register entry are required",
        }));
        rules
    }

    fn finding(&self, kind: InteractionType, severity: Severity, description: &str, affected: Vec<String>) -> DrugInteraction {
        DrugInteraction::new(
            kind,
            severity,
            format!("{}: {}", self.regulator, description),
            affected,
        )
        .with_qualifier(CHILDREN_HOME_QUALIFIER)
        .with_source(self.regulator.as_str())
        .with_evidence(self.citation)
    }
}

impl RegulatorySource for ReferenceRegulator {
    fn regulator(&self) -> Regulator {
        self.regulator
    }

    fn check_medication(&self, drug: &DrugInfo, current: &[DrugInfo]) -> SourceResult<Vec<DrugInteraction>> {
        let normalized = self.normalizer.normalize_drug(drug);
        let mut findings = Vec::new();

        for rule in self.rules.iter().filter(|r| normalized.contains(r.drug)) {
            findings.push(self.finding(
                InteractionType::Contraindication,
                rule.severity,
                rule.description,
                vec![drug.id.clone()],
            ));
        }

        if SEDATIVES.iter().any(|s| normalized.contains(s)) {
            for other in current {
                let other_normalized = self.normalizer.normalize_drug(other);
                if SEDATIVES.iter().any(|s| other_normalized.contains(s)) {
                    findings.push(
                        self.finding(
                            InteractionType::DrugDrug,
                            Severity::Medium,
                            "Two sedating medicines require a documented care plan review",
                            vec![drug.id.clone(), other.id.clone()],
                        )
                        .with_recommendation("Record the review in the child's placement plan"),
                    );
                }
            }
        }

        Ok(findings)
    }
}

/// One regulator service per region.
#[derive(Clone)]
pub struct RegulatorSet {
    pub ofsted: Arc<dyn RegulatorySource>,
    pub ciw: Arc<dyn RegulatorySource>,
    pub care_inspectorate: Arc<dyn RegulatorySource>,
    pub rqia: Arc<dyn RegulatorySource>,
    pub hiqa: Arc<dyn RegulatorySource>,
}

impl RegulatorSet {
    /// Reference rules for every regulator.
    pub fn reference() -> Self {
        Self {
            ofsted: Arc::new(ReferenceRegulator::new(Regulator::Ofsted)),
            ciw: Arc::new(ReferenceRegulator::new(Regulator::Ciw)),
            care_inspectorate: Arc::new(ReferenceRegulator::new(Regulator::CareInspectorate)),
            rqia: Arc::new(ReferenceRegulator::new(Regulator::Rqia)),
            hiqa: Arc::new(ReferenceRegulator::new(Regulator::Hiqa)),
        }
    }

    /// The children's-home regulator for a region.
    pub fn for_region(&self, region: Region) -> Arc<dyn RegulatorySource> {
        match region {
            Region::England => Arc::clone(&self.ofsted),
            Region::Wales => Arc::clone(&self.ciw),
            Region::Scotland => Arc::clone(&self.care_inspectorate),
            Region::NorthernIreland => Arc::clone(&self.rqia),
            Region::Ireland => Arc::clone(&self.hiqa),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspirin_flagged_for_children() {
        let ofsted = ReferenceRegulator::new(Regulator::Ofsted);
        let found = ofsted.check_medication(&DrugInfo::new("d1", "Disprin"), &[]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, InteractionType::Contraindication);
        assert_eq!(found[0].severity, Severity::High);
        assert_eq!(found[0].sources, vec!["OFSTED".to_string()]);
        assert!(found[0].description.starts_with("OFSTED:"));
    }

    #[test]
    fn test_controlled_drug() {
        let ciw = ReferenceRegulator::new(Regulator::Ciw);
        let found = ciw.check_medication(&DrugInfo::new("d1", "Ritalin"), &[]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity, Severity::Medium);
    }

    #[test]
    fn test_sedative_pair() {
        let rqia = ReferenceRegulator::new(Regulator::Rqia);
        let current = vec![DrugInfo::new("d2", "Circadin"), DrugInfo::new("d3", "paracetamol")];
        let found = rqia.check_medication(&DrugInfo::new("d1", "diazepam"), &current).unwrap();

        let pairs: Vec<_> = found.iter().filter(|f| f.kind == InteractionType::DrugDrug).collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].affected_drugs, vec!["d1".to_string(), "d2".to_string()]);
    }

    #[test]
    fn test_for_region() {
        let set = RegulatorSet::reference();
        for region in Region::ALL {
            assert_eq!(set.for_region(region).regulator(), region.children_regulator());
        }
    }

    #[test]
    fn test_unrestricted_drug() {
        let hiqa = ReferenceRegulator::new(Regulator::Hiqa);
        assert!(hiqa.check_medication(&DrugInfo::new("d1", "paracetamol"), &[]).unwrap().is_empty());
    }
}
