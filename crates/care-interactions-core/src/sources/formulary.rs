//! In-process clinical formulary (BNF / NICE reference data).
//!
//! Rules are written against canonical generic names; incoming drugs are
//! normalized first so brand names and strengths still hit. The data can be
//! replaced from a JSON file, which `update_database` reloads.

use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use super::{read_json, ClinicalSource, SourceError, SourceResult, BNF, NICE};
use crate::models::{
    AllergyInfo, DoseAlert, DrugInfo, DrugInteraction, FoodInteraction, InteractionType, Severity,
};
use crate::resolver::{match_allergen, NormalizedDrug, Normalizer};

/// Drug-drug interaction rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairRule {
    pub drugs: [String; 2],
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Allergen → drug warning for excipients and known class members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllergyRule {
    pub allergen: String,
    pub drug: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContraindicationRule {
    pub drug: String,
    pub condition: String,
    pub severity: Severity,
    pub description: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodRule {
    pub drug: String,
    pub food: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoseRule {
    pub drug: String,
    pub alert: String,
    pub severity: Severity,
    #[serde(default)]
    pub max_daily_dose: Option<String>,
}

/// Complete rule set of one formulary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FormularyData {
    #[serde(default)]
    pub interactions: Vec<PairRule>,
    #[serde(default)]
    pub allergies: Vec<AllergyRule>,
    #[serde(default)]
    pub contraindications: Vec<ContraindicationRule>,
    #[serde(default)]
    pub food: Vec<FoodRule>,
    #[serde(default)]
    pub dose: Vec<DoseRule>,
}

impl FormularyData {
    fn pair(mut self, a: &str, b: &str, severity: Severity, description: &str, recommendation: &str) -> Self {
        self.interactions.push(PairRule {
            drugs: [a.into(), b.into()],
            severity,
            description: description.into(),
            evidence: Vec::new(),
            recommendations: vec![recommendation.into()],
        });
        self
    }

    fn allergy(mut self, allergen: &str, drug: &str, severity: Severity, description: &str) -> Self {
        self.allergies.push(AllergyRule {
            allergen: allergen.into(),
            drug: drug.into(),
            severity,
            description: description.into(),
            recommendations: Vec::new(),
        });
        self
    }

    fn contraindication(mut self, drug: &str, condition: &str, severity: Severity, description: &str) -> Self {
        self.contraindications.push(ContraindicationRule {
            drug: drug.into(),
            condition: condition.into(),
            severity,
            description: description.into(),
            recommendations: Vec::new(),
        });
        self
    }

    fn food(mut self, drug: &str, food: &str, severity: Severity, description: &str) -> Self {
        self.food.push(FoodRule {
            drug: drug.into(),
            food: food.into(),
            severity,
            description: description.into(),
        });
        self
    }

    fn dose(mut self, drug: &str, alert: &str, severity: Severity, max_daily_dose: Option<&str>) -> Self {
        self.dose.push(DoseRule {
            drug: drug.into(),
            alert: alert.into(),
            severity,
            max_daily_dose: max_daily_dose.map(Into::into),
        });
        self
    }
}

/// Built-in BNF extract.
pub fn bnf_reference() -> FormularyData {
    use Severity::*;

    FormularyData::default()
        // Anticoagulants
        .pair("warfarin", "aspirin", High,
            "Aspirin increases the risk of bleeding when given with warfarin",
            "Avoid unless specialist advised; monitor INR and for signs of bleeding")
        .pair("warfarin", "ibuprofen", High,
            "NSAIDs increase the risk of bleeding when given with warfarin",
            "Avoid concomitant use; consider paracetamol for analgesia")
        .pair("warfarin", "naproxen", High,
            "NSAIDs increase the risk of bleeding when given with warfarin",
            "Avoid concomitant use; consider paracetamol for analgesia")
        .pair("warfarin", "diclofenac", High,
            "NSAIDs increase the risk of bleeding when given with warfarin",
            "Avoid concomitant use; consider paracetamol for analgesia")
        .pair("warfarin", "clarithromycin", High,
            "Clarithromycin enhances the anticoagulant effect of warfarin",
            "Monitor INR closely during and after the course")
        .pair("warfarin", "erythromycin", Medium,
            "Erythromycin may enhance the anticoagulant effect of warfarin",
            "Monitor INR")
        .pair("citalopram", "aspirin", Medium,
            "SSRIs with aspirin increase the risk of gastro-intestinal bleeding",
            "Consider gastro-protection")
        // Statins
        .pair("simvastatin", "clarithromycin", Critical,
            "Clarithromycin markedly raises simvastatin levels; risk of rhabdomyolysis",
            "Contra-indicated: suspend simvastatin for the duration of the course")
        .pair("simvastatin", "amiodarone", High,
            "Amiodarone increases the risk of myopathy with simvastatin",
            "Do not exceed simvastatin 20 mg daily")
        // Cardiovascular
        .pair("digoxin", "amiodarone", High,
            "Amiodarone increases plasma digoxin concentration",
            "Halve the digoxin dose and monitor levels")
        .pair("ramipril", "spironolactone", High,
            "Risk of severe hyperkalaemia",
            "Monitor potassium and renal function")
        .pair("lithium", "ibuprofen", High,
            "NSAIDs reduce lithium excretion; risk of toxicity",
            "Avoid or monitor lithium levels closely")
        .pair("lithium", "furosemide", Medium,
            "Loop diuretics may increase lithium levels",
            "Monitor lithium levels")
        // CNS
        .pair("sertraline", "tramadol", High,
            "Risk of serotonin syndrome and lowered seizure threshold",
            "Avoid where possible; monitor for agitation, tremor and hyperthermia")
        .pair("morphine", "diazepam", High,
            "Opioids with benzodiazepines cause profound sedation and respiratory depression",
            "Use lowest effective doses and monitor respiration")
        .pair("clopidogrel", "omeprazole", Medium,
            "Omeprazole reduces the antiplatelet effect of clopidogrel",
            "Consider lansoprazole or pantoprazole")
        // Excipients and class members
        .allergy("peanut", "arachis oil", High, "Arachis oil is derived from peanuts")
        .allergy("egg", "influenza vaccine", Medium, "Some influenza vaccines are prepared in hens' eggs")
        .allergy("sulfonamide", "furosemide", Low,
            "Furosemide is a sulfonamide derivative; cross-sensitivity is rare")
        // Contra-indications
        .contraindication("warfarin", "active bleeding", Medium,
            "Contra-indicated in haemorrhagic stroke and clinically significant bleeding")
        .contraindication("aspirin", "under 16 years", Medium,
            "Avoid in children under 16 years (Reye's syndrome) unless specifically indicated")
        .contraindication("aspirin", "peptic ulceration", Medium,
            "Contra-indicated in active peptic ulceration")
        .contraindication("ibuprofen", "gastro-intestinal bleeding", Low,
            "Avoid with a history of gastro-intestinal bleeding or severe heart failure")
        .contraindication("codeine", "under 12 years", Medium,
            "Contra-indicated in children under 12 years and known CYP2D6 ultra-rapid metabolisers")
        .contraindication("metformin", "renal impairment", Low,
            "Avoid where eGFR is below 30 mL/minute/1.73 m2")
        // Food
        .food("warfarin", "cranberry juice", Medium, "Cranberry juice may enhance the anticoagulant effect")
        .food("simvastatin", "grapefruit juice", High, "Grapefruit juice raises simvastatin levels")
        .food("metronidazole", "alcohol", High, "Disulfiram-like reaction with alcohol")
        .food("levothyroxine", "soya", Low, "Soya may reduce absorption; separate administration")
        // Dosing
        .dose("paracetamol", "Maximum 4 g in 24 hours; reduce in low body weight or hepatic impairment",
            Medium, Some("4 g"))
        .dose("codeine", "Maximum 240 mg daily", Medium, Some("240 mg"))
        .dose("warfarin", "Dose according to INR; record INR before each dose change", Medium, None)
        .dose("lithium", "Dose according to serum lithium; target 0.4-1.0 mmol/L", High, None)
}

/// Built-in NICE guidance extract.
pub fn nice_reference() -> FormularyData {
    use Severity::*;

    FormularyData::default()
        .pair("warfarin", "aspirin", Medium,
            "Concomitant antiplatelet therapy increases bleeding risk in anticoagulated patients",
            "Review the indication for aspirin in patients taking warfarin")
        .pair("simvastatin", "clarithromycin", High,
            "Macrolides inhibit simvastatin metabolism",
            "Temporarily stop the statin during macrolide treatment")
        .pair("sertraline", "tramadol", Medium,
            "Combined serotonergic drugs raise the risk of serotonin syndrome",
            "Counsel on symptoms of serotonin toxicity")
        .pair("ramipril", "spironolactone", Medium,
            "ACE inhibitors with aldosterone antagonists raise potassium",
            "Check potassium within one week of starting")
        .allergy("penicillin", "co-amoxiclav", High, "Co-amoxiclav contains a penicillin")
        .contraindication("methylphenidate", "cardiovascular disease", Medium,
            "Assess cardiovascular status before starting stimulants")
        .food("warfarin", "vitamin K rich foods", Low,
            "Large changes in vitamin K intake alter INR")
        .dose("melatonin", "Children: usual maximum 5 mg at night", Low, Some("5 mg"))
}

/// Reference clinical source backed by a [`FormularyData`] rule set.
pub struct ReferenceFormulary {
    name: String,
    data: RwLock<FormularyData>,
    normalizer: Normalizer,
    path: Option<PathBuf>,
}

impl ReferenceFormulary {
    pub fn new(name: impl Into<String>, data: FormularyData) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(data),
            normalizer: Normalizer::new(),
            path: None,
        }
    }

    pub fn bnf() -> Self {
        Self::new(BNF, bnf_reference())
    }

    pub fn nice() -> Self {
        Self::new(NICE, nice_reference())
    }

    /// Load rules from a JSON file and reload it on `update_database`.
    pub fn from_file(name: impl Into<String>, path: impl Into<PathBuf>) -> SourceResult<Self> {
        let name = name.into();
        let path = path.into();
        let data: FormularyData = read_json(&name, &path)?;
        Ok(Self {
            name,
            data: RwLock::new(data),
            normalizer: Normalizer::new(),
            path: Some(path),
        })
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    fn read(&self) -> SourceResult<std::sync::RwLockReadGuard<'_, FormularyData>> {
        self.data
            .read()
            .map_err(|_| SourceError::unavailable(&self.name, "formulary lock poisoned"))
    }

    fn direct_match(&self, drug: &DrugInfo, normalized: &NormalizedDrug, allergy: &AllergyInfo, allergen: &str) -> Option<DrugInteraction> {
        let hit = match_allergen(allergen, normalized)?;
        let severity = if allergy.is_life_threatening() {
            Severity::Critical
        } else {
            Severity::High
        };

        let mut finding = DrugInteraction::new(
            InteractionType::Allergy,
            severity,
            format!("{} contains {}, recorded as an allergen", drug.name, hit.matched),
            vec![drug.id.clone()],
        )
        .with_qualifier(allergy.id.clone())
        .with_source(self.name.clone())
        .with_evidence(format!("Allergy record {}: {}", allergy.id, allergy.allergen))
        .with_recommendation("Do not administer; contact the prescriber for an alternative");

        if hit.score < 1.0 {
            finding = finding.with_evidence(format!("Name match score {:.2}", hit.score));
        }
        Some(finding)
    }
}

impl ClinicalSource for ReferenceFormulary {
    fn name(&self) -> &str {
        &self.name
    }

    fn check_drug_interaction(&self, a: &DrugInfo, b: &DrugInfo) -> SourceResult<Vec<DrugInteraction>> {
        let na = self.normalizer.normalize_drug(a);
        let nb = self.normalizer.normalize_drug(b);
        let data = self.read()?;

        Ok(data
            .interactions
            .iter()
            .filter(|r| {
                let [x, y] = &r.drugs;
                (na.contains(x) && nb.contains(y)) || (na.contains(y) && nb.contains(x))
            })
            .map(|r| {
                let mut finding = DrugInteraction::new(
                    InteractionType::DrugDrug,
                    r.severity,
                    r.description.clone(),
                    vec![a.id.clone(), b.id.clone()],
                )
                .with_source(self.name.clone());
                finding.evidence = r.evidence.clone();
                finding.recommendations = r.recommendations.clone();
                finding
            })
            .collect())
    }

    fn check_allergy_interaction(&self, drug: &DrugInfo, allergy: &AllergyInfo) -> SourceResult<Vec<DrugInteraction>> {
        let normalized = self.normalizer.normalize_drug(drug);
        let allergen = self.normalizer.canonical_allergen(&allergy.allergen);
        let data = self.read()?;

        let mut findings: Vec<DrugInteraction> = self
            .direct_match(drug, &normalized, allergy, &allergen)
            .into_iter()
            .collect();

        for rule in data
            .allergies
            .iter()
            .filter(|r| r.allergen == allergen && normalized.contains(&r.drug))
        {
            let mut finding = DrugInteraction::new(
                InteractionType::Allergy,
                rule.severity,
                rule.description.clone(),
                vec![drug.id.clone()],
            )
            .with_qualifier(allergy.id.clone())
            .with_source(self.name.clone());
            finding.recommendations = rule.recommendations.clone();
            findings.push(finding);
        }
        Ok(findings)
    }

    fn get_contraindications(&self, drug: &DrugInfo) -> SourceResult<Vec<DrugInteraction>> {
        let normalized = self.normalizer.normalize_drug(drug);
        let data = self.read()?;

        Ok(data
            .contraindications
            .iter()
            .filter(|r| normalized.contains(&r.drug))
            .map(|r| {
                let mut finding = DrugInteraction::new(
                    InteractionType::Contraindication,
                    r.severity,
                    r.description.clone(),
                    vec![drug.id.clone()],
                )
                .with_qualifier(r.condition.clone())
                .with_source(self.name.clone());
                finding.recommendations = r.recommendations.clone();
                finding
            })
            .collect())
    }

    fn get_food_interactions(&self, drug: &DrugInfo) -> SourceResult<Vec<FoodInteraction>> {
        let normalized = self.normalizer.normalize_drug(drug);
        let data = self.read()?;

        Ok(data
            .food
            .iter()
            .filter(|r| normalized.contains(&r.drug))
            .map(|r| FoodInteraction {
                drug_id: drug.id.clone(),
                food: r.food.clone(),
                severity: r.severity,
                description: r.description.clone(),
                sources: vec![self.name.clone()],
            })
            .collect())
    }

    fn get_dose_alerts(&self, drug: &DrugInfo) -> SourceResult<Vec<DoseAlert>> {
        let normalized = self.normalizer.normalize_drug(drug);
        let data = self.read()?;

        Ok(data
            .dose
            .iter()
            .filter(|r| normalized.contains(&r.drug))
            .map(|r| DoseAlert {
                drug_id: drug.id.clone(),
                alert: r.alert.clone(),
                severity: r.severity,
                max_daily_dose: r.max_daily_dose.clone(),
                sources: vec![self.name.clone()],
            })
            .collect())
    }

    fn update_database(&self) -> SourceResult<()> {
        let Some(path) = &self.path else {
            tracing::debug!(source = %self.name, "Built-in formulary, nothing to reload");
            return Ok(());
        };

        let loaded: FormularyData = read_json(&self.name, path)?;
        let mut data = self
            .data
            .write()
            .map_err(|_| SourceError::unavailable(&self.name, "formulary lock poisoned"))?;
        *data = loaded;
        tracing::info!(
            source = %self.name,
            interactions = data.interactions.len(),
            "Formulary reloaded"
        );
        Ok(())
    }
}
