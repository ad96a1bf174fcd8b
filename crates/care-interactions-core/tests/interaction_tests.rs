//! End-to-end interaction checks through the unified service.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use care_interactions_core::clock::SystemClock;
use care_interactions_core::db::Database;
use care_interactions_core::models::{
    AllergyInfo, DrugInfo, DrugInteraction, InteractionType, Regulator, Severity,
};
use care_interactions_core::resolver::Normalizer;
use care_interactions_core::services::{
    AllergyDatabase, CrossReactivityService, DrugInteractionService, UnifiedDrugInteractionService, CHECK_OPERATION,
};
use care_interactions_core::sources::{
    ClinicalSource, ReferenceFormulary, ReferencePatterns, ReferencePredictor, ReferenceRegulator,
    ReferenceStructures, RegulatorSet, RegulatorySource, SourceError, SourceResult,
};
use care_interactions_core::{AuditLog, DoseAlert, FoodInteraction};

/// Counts calls and optionally fails every one of them.
struct Counting<S: ?Sized> {
    inner: Arc<S>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl<S: ?Sized> Counting<S> {
    fn new(inner: Arc<S>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    fn failing(inner: Arc<S>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(true),
        })
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self, name: &str) -> SourceResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::unavailable(name, "connection refused"));
        }
        Ok(())
    }
}

impl ClinicalSource for Counting<dyn ClinicalSource> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn check_drug_interaction(&self, a: &DrugInfo, b: &DrugInfo) -> SourceResult<Vec<DrugInteraction>> {
        self.enter(self.inner.name())?;
        self.inner.check_drug_interaction(a, b)
    }

    fn check_allergy_interaction(&self, drug: &DrugInfo, allergy: &AllergyInfo) -> SourceResult<Vec<DrugInteraction>> {
        self.enter(self.inner.name())?;
        self.inner.check_allergy_interaction(drug, allergy)
    }

    fn get_contraindications(&self, drug: &DrugInfo) -> SourceResult<Vec<DrugInteraction>> {
        self.enter(self.inner.name())?;
        self.inner.get_contraindications(drug)
    }

    fn get_food_interactions(&self, drug: &DrugInfo) -> SourceResult<Vec<FoodInteraction>> {
        self.enter(self.inner.name())?;
        self.inner.get_food_interactions(drug)
    }

    fn get_dose_alerts(&self, drug: &DrugInfo) -> SourceResult<Vec<DoseAlert>> {
        self.enter(self.inner.name())?;
        self.inner.get_dose_alerts(drug)
    }

    fn update_database(&self) -> SourceResult<()> {
        self.enter(self.inner.name())?;
        self.inner.update_database()
    }
}

impl RegulatorySource for Counting<dyn RegulatorySource> {
    fn regulator(&self) -> Regulator {
        self.inner.regulator()
    }

    fn check_medication(&self, drug: &DrugInfo, current: &[DrugInfo]) -> SourceResult<Vec<DrugInteraction>> {
        self.enter(self.inner.regulator().as_str())?;
        self.inner.check_medication(drug, current)
    }
}

fn regulator(r: Regulator) -> Arc<dyn RegulatorySource> {
    Arc::new(ReferenceRegulator::new(r))
}

fn counted(source: Arc<dyn ClinicalSource>, fail: bool) -> Arc<Counting<dyn ClinicalSource>> {
    if fail {
        Counting::failing(source)
    } else {
        Counting::new(source)
    }
}

struct Harness {
    bnf: Arc<Counting<dyn ClinicalSource>>,
    nice: Arc<Counting<dyn ClinicalSource>>,
    ofsted: Arc<Counting<dyn RegulatorySource>>,
    regulators: RegulatorSet,
    base: Arc<DrugInteractionService>,
    allergies: Arc<AllergyDatabase>,
    audit: Arc<AuditLog>,
}

impl Harness {
    fn new() -> Self {
        Self::with(false, false, false)
    }

    fn with(bnf_fails: bool, nice_fails: bool, ofsted_fails: bool) -> Self {
        let bnf = counted(Arc::new(ReferenceFormulary::bnf()), bnf_fails);
        let nice = counted(Arc::new(ReferenceFormulary::nice()), nice_fails);
        let ofsted = if ofsted_fails {
            Counting::failing(regulator(Regulator::Ofsted))
        } else {
            Counting::new(regulator(Regulator::Ofsted))
        };

        let mut regulators = RegulatorSet::reference();
        let replacement: Arc<dyn RegulatorySource> = ofsted.clone();
        regulators.ofsted = replacement;

        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let clinical: Vec<Arc<dyn ClinicalSource>> = vec![bnf.clone(), nice.clone()];
        let normalizer = Arc::new(Normalizer::new());

        let cross = Arc::new(CrossReactivityService::new(
            Arc::clone(&normalizer),
            Arc::new(ReferenceStructures::new()),
            vec![Arc::new(ReferencePatterns::bnf()), Arc::new(ReferencePatterns::drugbank())],
            Arc::new(ReferencePredictor::new()),
        ));
        let base = Arc::new(DrugInteractionService::new(
            Arc::clone(&db),
            Arc::new(SystemClock),
            clinical.clone(),
        ));
        let allergies = Arc::new(AllergyDatabase::new(
            Arc::clone(&db),
            Arc::new(SystemClock),
            normalizer,
            clinical,
            cross,
        ));
        let audit = Arc::new(AuditLog::new(db, Arc::new(SystemClock)));

        Self {
            bnf,
            nice,
            ofsted,
            regulators,
            base,
            allergies,
            audit,
        }
    }

    fn service(&self, region: &str, care_home_type: &str) -> UnifiedDrugInteractionService {
        UnifiedDrugInteractionService::new(
            region,
            care_home_type,
            Arc::clone(&self.base),
            Arc::clone(&self.allergies),
            &self.regulators,
        )
        .unwrap()
        .with_audit(Arc::clone(&self.audit))
    }

    fn clinical_calls(&self) -> usize {
        self.bnf.calls() + self.nice.calls()
    }
}

fn warfarin() -> DrugInfo {
    DrugInfo::new("d-warfarin", "Warfarin")
}

fn aspirin() -> DrugInfo {
    DrugInfo::new("d-aspirin", "Aspirin")
}

#[test]
fn test_warfarin_aspirin_adult_england() {
    let harness = Harness::new();
    let service = harness.service("ENGLAND", "ADULT");
    assert_eq!(service.regulator(), None);

    let report = service.check_interactions(&warfarin(), &[aspirin()], &[]).unwrap();

    let drug_drug: Vec<_> = report
        .drug_interactions
        .iter()
        .filter(|i| i.kind == InteractionType::DrugDrug)
        .collect();
    assert_eq!(drug_drug.len(), 1);
    assert!(drug_drug[0].severity >= Severity::Medium);
    // BNF HIGH beats NICE MEDIUM, both cited
    assert_eq!(drug_drug[0].severity, Severity::High);
    assert_eq!(drug_drug[0].sources, vec!["BNF".to_string(), "NICE".to_string()]);

    assert_eq!(harness.ofsted.calls(), 0);
    assert!(report.is_complete());
}

#[test]
fn test_pair_order_does_not_matter() {
    let harness = Harness::new();
    let service = harness.service("ENGLAND", "ADULT");

    let forward = service.check_interactions(&warfarin(), &[aspirin()], &[]).unwrap();
    let reverse = service.check_interactions(&aspirin(), &[warfarin()], &[]).unwrap();

    let key = |r: &care_interactions_core::InteractionReport| {
        r.drug_interactions
            .iter()
            .filter(|i| i.kind == InteractionType::DrugDrug)
            .map(|i| (i.drug_key(), i.severity))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&forward), key(&reverse));
}

#[test]
fn test_invalid_region_rejected_before_any_source_call() {
    let harness = Harness::new();
    let err = UnifiedDrugInteractionService::new(
        "ATLANTIS",
        "ADULT",
        Arc::clone(&harness.base),
        Arc::clone(&harness.allergies),
        &harness.regulators,
    )
    .err()
    .unwrap();

    assert!(err.is_validation());
    assert_eq!(err.code(), "INVALID_REGION");
    assert_eq!(err.status_code(), 400);
    assert_eq!(harness.clinical_calls(), 0);
    assert_eq!(harness.ofsted.calls(), 0);
}

#[test]
fn test_invalid_input_rejected_before_any_source_call() {
    let harness = Harness::new();
    let service = harness.service("ENGLAND", "CHILDREN");

    let err = service
        .check_interactions(&warfarin(), &[], &[AllergyInfo::new("a1", "  ")])
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ALLERGY");
    assert_eq!(harness.clinical_calls(), 0);
    assert_eq!(harness.ofsted.calls(), 0);
    assert!(harness.audit.events().unwrap().is_empty());
}

#[test]
fn test_children_home_consults_regulator() {
    let harness = Harness::new();
    let service = harness.service("ENGLAND", "CHILDREN");
    assert_eq!(service.regulator(), Some(Regulator::Ofsted));

    let report = service.check_interactions(&aspirin(), &[], &[]).unwrap();
    assert_eq!(harness.ofsted.calls(), 1);

    let regulatory: Vec<_> = report
        .drug_interactions
        .iter()
        .filter(|i| i.sources.iter().any(|s| s == "OFSTED"))
        .collect();
    assert_eq!(regulatory.len(), 1);
    assert_eq!(regulatory[0].severity, Severity::High);
    assert!(regulatory[0].description.starts_with("OFSTED: "));
}

#[test]
fn test_regulator_failure_is_reported_not_fatal() {
    let harness = Harness::with(false, false, true);
    let service = harness.service("ENGLAND", "CHILDREN");

    let report = service.check_interactions(&warfarin(), &[aspirin()], &[]).unwrap();
    assert_eq!(report.source_failures.len(), 1);
    assert_eq!(report.source_failures[0].source, "OFSTED");
    assert_eq!(report.source_failures[0].operation, "check_medication");
    // BNF / NICE findings survive
    assert!(report
        .drug_interactions
        .iter()
        .any(|i| i.kind == InteractionType::DrugDrug));
}

#[test]
fn test_required_regulator_failure_is_regional_error() {
    let harness = Harness::with(false, false, true);
    let service = harness.service("ENGLAND", "CHILDREN").with_required_regional_checks(true);

    let err = service.check_interactions(&aspirin(), &[], &[]).unwrap_err();
    assert_eq!(err.code(), "REGIONAL_SERVICE_ERROR");
    assert_eq!(err.status_code(), 502);
    assert_eq!(err.details()["regulator"], "OFSTED");
}

#[test]
fn test_one_clinical_source_down() {
    let harness = Harness::with(false, true, false);
    let service = harness.service("ENGLAND", "ADULT");

    let report = service.check_interactions(&warfarin(), &[aspirin()], &[]).unwrap();
    assert!(!report.is_complete());
    assert!(report.source_failures.iter().all(|f| f.source == "NICE"));

    let pair = report
        .drug_interactions
        .iter()
        .find(|i| i.kind == InteractionType::DrugDrug)
        .unwrap();
    assert_eq!(pair.sources, vec!["BNF".to_string()]);
}

#[test]
fn test_every_source_down_is_unavailable() {
    let harness = Harness::with(true, true, false);
    let service = harness.service("ENGLAND", "ADULT");

    let err = service.check_interactions(&warfarin(), &[aspirin()], &[]).unwrap_err();
    assert_eq!(err.code(), "SOURCE_UNAVAILABLE");
    assert_eq!(err.status_code(), 502);
    assert!(harness.audit.events().unwrap().is_empty());
}

#[test]
fn test_allergy_findings_in_report() {
    let harness = Harness::new();
    let service = harness.service("WALES", "ADULT");

    let allergy = AllergyInfo::new("a1", "penicillin").with_reaction("anaphylaxis");
    let report = service
        .check_interactions(&DrugInfo::new("d1", "Amoxicillin"), &[], &[allergy])
        .unwrap();

    assert_eq!(report.allergy_interactions.len(), 1);
    assert_eq!(report.allergy_interactions[0].severity, Severity::Critical);
    assert_eq!(report.highest_severity(), Some(Severity::Critical));
}

#[test]
fn test_checks_are_audited() {
    let harness = Harness::new();
    let service = harness.service("ENGLAND", "ADULT");

    service.check_interactions(&warfarin(), &[aspirin()], &[]).unwrap();
    service.check_interactions(&aspirin(), &[], &[]).unwrap();

    let events = harness.audit.events().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.operation == CHECK_OPERATION));

    let payload: serde_json::Value = serde_json::from_str(&events[0].payload).unwrap();
    assert_eq!(payload["new_drug"], "d-warfarin");
    assert_eq!(payload["highest_severity"], "HIGH");

    assert!(harness.audit.verify_chain().unwrap().valid);
}

#[test]
fn test_cached_findings_survive_source_outage() {
    let harness = Harness::new();
    let service = harness.service("ENGLAND", "ADULT");
    let allergies = [AllergyInfo::new("a1", "penicillin").with_reaction("anaphylaxis")];

    let warm = service.check_interactions(&warfarin(), &[aspirin()], &allergies).unwrap();
    assert!(warm.is_complete());
    assert!(!warm.drug_interactions.is_empty());

    harness.bnf.set_failing(true);
    harness.nice.set_failing(true);

    // Pair and allergy answers come from the cache; only uncached branches fail
    let report = service.check_interactions(&warfarin(), &[aspirin()], &allergies).unwrap();
    let drug_drug: Vec<_> = report
        .drug_interactions
        .iter()
        .filter(|i| i.kind == InteractionType::DrugDrug)
        .collect();
    assert_eq!(drug_drug.len(), 1);
    assert_eq!(drug_drug[0].severity, Severity::High);
    assert!(!report.source_failures.is_empty());
    assert!(report
        .source_failures
        .iter()
        .all(|f| f.operation != "check_drug_interaction" && f.operation != "check_allergy_interaction"));
}
