//! Pre-administration gate for MAR (medication administration record) entries.
//!
//! Every administration runs the unified check first. The worst finding
//! decides the outcome:
//!
//! | worst severity | decision           |
//! |----------------|--------------------|
//! | CRITICAL       | `Blocked`          |
//! | HIGH           | `RequiresOverride` |
//! | MEDIUM / LOW   | `Proceed`          |
//!
//! A check with any `source_failures` is never better than
//! `RequiresOverride`: a finding the failed source would have reported is
//! unknown. A held administration can be recorded with an [`Override`] naming who
//! authorised it and why, unless it was blocked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::audit::AuditLog;
use crate::models::{AllergyInfo, DrugInfo, InteractionReport, Severity};
use crate::services::{InteractionError, InteractionResult, UnifiedDrugInteractionService};

/// Audit operation for a recorded administration.
pub const ADMINISTER_OPERATION: &str = "administer_medication";
/// Audit operation for an administration the gate held back.
pub const HELD_OPERATION: &str = "administration_held";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdministrationDecision {
    Proceed,
    RequiresOverride,
    Blocked,
}

impl AdministrationDecision {
    pub fn from_report(report: &InteractionReport) -> Self {
        match report.highest_severity() {
            Some(Severity::Critical) => AdministrationDecision::Blocked,
            Some(Severity::High) => AdministrationDecision::RequiresOverride,
            _ if !report.is_complete() => AdministrationDecision::RequiresOverride,
            _ => AdministrationDecision::Proceed,
        }
    }
}

/// One dose about to be given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdministrationRequest {
    pub resident_id: String,
    pub drug: DrugInfo,
    #[serde(default)]
    pub current_medications: Vec<DrugInfo>,
    #[serde(default)]
    pub allergies: Vec<AllergyInfo>,
    /// Dose as written on the MAR (e.g., "500 mg")
    pub dose: String,
    pub administered_by: String,
    /// As-needed dose; requires `prn_reason`
    #[serde(default)]
    pub prn: bool,
    #[serde(default)]
    pub prn_reason: Option<String>,
}

/// Authorisation to give a dose the gate held.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Override {
    pub authorised_by: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AdministrationOutcome {
    pub decision: AdministrationDecision,
    /// Whether the MAR entry was recorded
    pub recorded: bool,
    /// Audit sequence of the entry written for this attempt
    pub audit_sequence: u64,
    pub report: InteractionReport,
}

pub struct MedicationAdministrationService {
    checker: Arc<UnifiedDrugInteractionService>,
    audit: Arc<AuditLog>,
}

impl MedicationAdministrationService {
    pub fn new(checker: Arc<UnifiedDrugInteractionService>, audit: Arc<AuditLog>) -> Self {
        Self { checker, audit }
    }

    /// Check a dose and record it if nothing HIGH or CRITICAL was found.
    pub fn administer(&self, request: &AdministrationRequest) -> InteractionResult<AdministrationOutcome> {
        self.run(request, None)
    }

    /// Record a dose the gate would otherwise hold. Blocked doses stay blocked.
    pub fn administer_with_override(
        &self,
        request: &AdministrationRequest,
        authorisation: &Override,
    ) -> InteractionResult<AdministrationOutcome> {
        if authorisation.authorised_by.trim().is_empty() || authorisation.reason.trim().is_empty() {
            return Err(InteractionError::validation(
                "INVALID_OVERRIDE",
                "An override must name who authorised it and why",
                json!({ "resident_id": request.resident_id, "drug": request.drug.id }),
            ));
        }
        self.run(request, Some(authorisation))
    }

    fn run(&self, request: &AdministrationRequest, authorisation: Option<&Override>) -> InteractionResult<AdministrationOutcome> {
        validate(request)?;

        let report = self
            .checker
            .check_interactions(&request.drug, &request.current_medications, &request.allergies)?;
        let decision = AdministrationDecision::from_report(&report);

        let recorded = match decision {
            AdministrationDecision::Proceed => true,
            AdministrationDecision::RequiresOverride => authorisation.is_some(),
            AdministrationDecision::Blocked => false,
        };

        let operation = if recorded { ADMINISTER_OPERATION } else { HELD_OPERATION };
        let event = self.audit.record(
            operation,
            &json!({
                "resident_id": request.resident_id,
                "drug": request.drug.id,
                "dose": request.dose,
                "administered_by": request.administered_by,
                "prn": request.prn,
                "prn_reason": request.prn_reason,
                "decision": decision,
                "highest_severity": report.highest_severity(),
                "source_failures": report.source_failures.len(),
                "override": authorisation,
            }),
        )?;

        if recorded {
            tracing::info!(resident = %request.resident_id, drug = %request.drug.id, ?decision, "Administration recorded");
        } else {
            tracing::warn!(resident = %request.resident_id, drug = %request.drug.id, ?decision, "Administration held");
        }

        Ok(AdministrationOutcome {
            decision,
            recorded,
            audit_sequence: event.sequence,
            report,
        })
    }
}

fn validate(request: &AdministrationRequest) -> InteractionResult<()> {
    if request.resident_id.trim().is_empty() {
        return Err(InteractionError::validation(
            "INVALID_RESIDENT",
            "Administration must name a resident",
            json!({ "drug": request.drug.id }),
        ));
    }
    if request.administered_by.trim().is_empty() {
        return Err(InteractionError::validation(
            "INVALID_ADMINISTRATOR",
            "Administration must name who gave the dose",
            json!({ "resident_id": request.resident_id }),
        ));
    }
    if request.dose.trim().is_empty() {
        return Err(InteractionError::validation(
            "INVALID_DOSE",
            "Administration must record the dose",
            json!({ "resident_id": request.resident_id, "drug": request.drug.id }),
        ));
    }
    let has_reason = request.prn_reason.as_deref().map(|r| !r.trim().is_empty()).unwrap_or(false);
    if request.prn && !has_reason {
        return Err(InteractionError::validation(
            "PRN_REASON_REQUIRED",
            "PRN administrations must record a reason",
            json!({ "resident_id": request.resident_id, "drug": request.drug.id }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::EngineConfig;
    use crate::engine::{InteractionEngine, SourceSet};
    use crate::sources::offline::OfflineSource;
    use crate::sources::ClinicalSource;

    fn gate() -> (MedicationAdministrationService, Arc<AuditLog>) {
        gate_with(SourceSet::reference())
    }

    fn gate_with(sources: SourceSet) -> (MedicationAdministrationService, Arc<AuditLog>) {
        let engine = InteractionEngine::from_config(&EngineConfig::default(), sources, Arc::new(SystemClock)).unwrap();
        (engine.administration(), Arc::clone(engine.audit()))
    }

    fn request(drug: DrugInfo) -> AdministrationRequest {
        AdministrationRequest {
            resident_id: "r1".into(),
            drug,
            current_medications: Vec::new(),
            allergies: Vec::new(),
            dose: "500 mg".into(),
            administered_by: "nurse-7".into(),
            prn: false,
            prn_reason: None,
        }
    }

    #[test]
    fn test_clear_dose_proceeds() {
        let (gate, audit) = gate();
        let outcome = gate.administer(&request(DrugInfo::new("d1", "Paracetamol"))).unwrap();
        assert_eq!(outcome.decision, AdministrationDecision::Proceed);
        assert!(outcome.recorded);

        // The check itself is audited first
        let events = audit.events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].operation, crate::services::CHECK_OPERATION);
        assert_eq!(events[1].operation, ADMINISTER_OPERATION);
    }

    #[test]
    fn test_high_finding_requires_override() {
        let (gate, _) = gate();
        let mut req = request(DrugInfo::new("d1", "Aspirin"));
        req.current_medications.push(DrugInfo::new("d2", "Warfarin"));

        let held = gate.administer(&req).unwrap();
        assert_eq!(held.decision, AdministrationDecision::RequiresOverride);
        assert!(!held.recorded);

        let authorisation = Override {
            authorised_by: "dr-smith".into(),
            reason: "Specialist advised, INR monitored".into(),
        };
        let given = gate.administer_with_override(&req, &authorisation).unwrap();
        assert!(given.recorded);
        assert_eq!(given.audit_sequence, 3);
    }

    #[test]
    fn test_critical_finding_blocks_even_with_override() {
        let (gate, _) = gate();
        let mut req = request(DrugInfo::new("d1", "Clarithromycin"));
        req.current_medications.push(DrugInfo::new("d2", "Simvastatin"));

        let authorisation = Override {
            authorised_by: "dr-smith".into(),
            reason: "urgent".into(),
        };
        let outcome = gate.administer_with_override(&req, &authorisation).unwrap();
        assert_eq!(outcome.decision, AdministrationDecision::Blocked);
        assert!(!outcome.recorded);
    }

    #[test]
    fn test_incomplete_check_is_held() {
        let mut sources = SourceSet::reference();
        let offline: Vec<Arc<dyn ClinicalSource>> =
            vec![Arc::new(OfflineSource("BNF")), Arc::new(OfflineSource("NICE"))];
        sources.clinical = offline;
        let (gate, audit) = gate_with(sources);

        let mut req = request(DrugInfo::new("d1", "Warfarin"));
        req.allergies
            .push(AllergyInfo::new("a1", "warfarin").with_reaction("anaphylaxis"));

        let outcome = gate.administer(&req).unwrap();
        assert_eq!(outcome.decision, AdministrationDecision::RequiresOverride);
        assert!(!outcome.recorded);
        assert!(!outcome.report.source_failures.is_empty());
        assert_eq!(audit.events().unwrap().last().unwrap().operation, HELD_OPERATION);
    }

    #[test]
    fn test_prn_requires_reason() {
        let (gate, audit) = gate();
        let mut req = request(DrugInfo::new("d1", "Paracetamol"));
        req.prn = true;

        let err = gate.administer(&req).unwrap_err();
        assert_eq!(err.code(), "PRN_REASON_REQUIRED");
        assert!(audit.events().unwrap().is_empty());

        req.prn_reason = Some("Headache".into());
        assert!(gate.administer(&req).unwrap().recorded);
    }

    #[test]
    fn test_empty_override_rejected() {
        let (gate, _) = gate();
        let authorisation = Override {
            authorised_by: "".into(),
            reason: "x".into(),
        };
        let err = gate
            .administer_with_override(&request(DrugInfo::new("d1", "Paracetamol")), &authorisation)
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_OVERRIDE");
    }
}
