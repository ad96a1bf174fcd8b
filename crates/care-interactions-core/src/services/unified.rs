//! Region-aware interaction checking.
//!
//! ```text
//!                     check_interactions(new_drug, current, allergies)
//!                                       │
//!        ┌──────────────┬───────────────┼────────────────┬──────────────────┐
//!        ▼              ▼               ▼                ▼                  ▼
//!   drug pairs   contraindications   allergies     food / dose       regulator
//!   (BNF, NICE)    (BNF, NICE)    (AllergyDatabase) (BNF, NICE)  (children's homes)
//!        └──────────────┴───────────────┼────────────────┴──────────────────┘
//!                                       ▼
//!                        dedup → rank → audit → InteractionReport
//! ```

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use serde_json::json;

use super::allergy_database::AllergyDatabase;
use super::drug_interaction::{merged, DrugInteractionService, Tally};
use super::error::{InteractionError, InteractionResult};
use super::fanout::Gathered;
use crate::audit::AuditLog;
use crate::models::{
    AllergyInfo, AllergyInteraction, CareHomeType, DrugInfo, DrugInteraction, InteractionReport, Region,
    Regulator, Severity, SourceFailure,
};
use crate::sources::{RegulatorSet, RegulatorySource};

/// Audit operation name for a completed check.
pub const CHECK_OPERATION: &str = "check_interactions";

pub struct UnifiedDrugInteractionService {
    region: Region,
    care_home_type: CareHomeType,
    base: Arc<DrugInteractionService>,
    allergies: Arc<AllergyDatabase>,
    /// Only set for children's homes
    regulator: Option<Arc<dyn RegulatorySource>>,
    audit: Option<Arc<AuditLog>>,
    require_regional_checks: bool,
}

#[derive(Serialize)]
struct CheckAudit<'a> {
    region: Region,
    care_home_type: CareHomeType,
    new_drug: &'a str,
    current_medications: Vec<&'a str>,
    allergies: Vec<&'a str>,
    highest_severity: Option<Severity>,
    findings: usize,
    source_failures: &'a [SourceFailure],
}

impl UnifiedDrugInteractionService {
    /// Build a service for a region and care-home type.
    ///
    /// Both labels are validated here, before any source is called.
    pub fn new(
        region: &str,
        care_home_type: &str,
        base: Arc<DrugInteractionService>,
        allergies: Arc<AllergyDatabase>,
        regulators: &RegulatorSet,
    ) -> InteractionResult<Self> {
        let (region, care_home_type) = parse_labels(region, care_home_type)?;

        let regulator = match care_home_type {
            CareHomeType::Children => Some(regulators.for_region(region)),
            CareHomeType::Adult => None,
        };

        Ok(Self {
            region,
            care_home_type,
            base,
            allergies,
            regulator,
            audit: None,
            require_regional_checks: false,
        })
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Fail the whole check when the regulator cannot be reached.
    pub fn with_required_regional_checks(mut self, required: bool) -> Self {
        self.require_regional_checks = required;
        self
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn care_home_type(&self) -> CareHomeType {
        self.care_home_type
    }

    /// Regulator consulted on every check, if any.
    pub fn regulator(&self) -> Option<Regulator> {
        self.regulator.as_ref().map(|r| r.regulator())
    }

    /// Check a new drug against a resident's medications and allergies.
    pub fn check_interactions(
        &self,
        new_drug: &DrugInfo,
        current: &[DrugInfo],
        allergies: &[AllergyInfo],
    ) -> InteractionResult<InteractionReport> {
        validate(new_drug, current, allergies)?;

        let span = tracing::info_span!(
            "check_interactions",
            region = %self.region,
            care_home_type = self.care_home_type.as_str(),
            drug = %new_drug.id
        );
        let _entered = span.enter();

        let base = &self.base;
        let ((pairs, contraindications), ((allergy, regulatory), (food, dose))) = rayon::join(
            || {
                rayon::join(
                    || base.check_current_medications(new_drug, current),
                    || base.contraindications(new_drug),
                )
            },
            || {
                rayon::join(
                    || {
                        rayon::join(
                            || self.allergy_findings(new_drug, allergies),
                            || self.regulatory_findings(new_drug, current),
                        )
                    },
                    || rayon::join(|| base.food_interactions(new_drug), || base.dose_alerts(new_drug)),
                )
            },
        );
        let pairs = pairs?;
        let allergy = allergy?;
        let regulatory = regulatory?;

        let mut tally = Tally::default();
        tally.add(&pairs);
        tally.add(&contraindications);
        tally.add(&allergy);
        tally.add(&regulatory);
        tally.add(&food);
        tally.add(&dose);

        let mut source_failures = pairs.failures;
        source_failures.extend(contraindications.failures);
        source_failures.extend(allergy.failures);
        source_failures.extend(regulatory.failures);
        source_failures.extend(food.failures);
        source_failures.extend(dose.failures);

        if tally.all_failed() {
            return Err(InteractionError::SourceUnavailable {
                operation: CHECK_OPERATION,
                failures: source_failures,
            });
        }

        let mut drug_interactions = pairs.items;
        drug_interactions.extend(contraindications.items);
        drug_interactions.extend(regulatory.items);

        let report = InteractionReport {
            drug_interactions: merged(drug_interactions),
            allergy_interactions: merged(allergy.items),
            food_interactions: merged(food.items),
            dose_alerts: merged(dose.items),
            source_failures,
        };

        if let Some(audit) = &self.audit {
            audit.record(
                CHECK_OPERATION,
                &CheckAudit {
                    region: self.region,
                    care_home_type: self.care_home_type,
                    new_drug: &new_drug.id,
                    current_medications: current.iter().map(|d| d.id.as_str()).collect(),
                    allergies: allergies.iter().map(|a| a.id.as_str()).collect(),
                    highest_severity: report.highest_severity(),
                    findings: report.finding_count(),
                    source_failures: &report.source_failures,
                },
            )?;
        }

        tracing::info!(
            findings = report.finding_count(),
            highest = ?report.highest_severity(),
            failed = report.source_failures.len(),
            "Interaction check complete"
        );
        Ok(report)
    }

    fn allergy_findings(&self, drug: &DrugInfo, allergies: &[AllergyInfo]) -> InteractionResult<Gathered<DrugInteraction>> {
        let checks: Vec<_> = allergies
            .par_iter()
            .map(|allergy| {
                self.allergies
                    .check_interaction_detailed(drug, allergy)
                    .map(|check| (allergy, check))
            })
            .collect();

        let mut gathered = Gathered::new();
        for result in checks {
            let (allergy, check) = result?;
            gathered.attempted += check.attempted;
            if check.cached {
                gathered.cache_hits += 1;
            }
            gathered.failures.extend(check.failures);
            if let Some(interaction) = check.interaction {
                let description = describe_allergy(drug, allergy, &interaction);
                gathered.items.push(interaction.to_drug_interaction(description));
            }
        }
        Ok(gathered)
    }

    fn regulatory_findings(&self, drug: &DrugInfo, current: &[DrugInfo]) -> InteractionResult<Gathered<DrugInteraction>> {
        let mut gathered = Gathered::new();
        let Some(regulator) = &self.regulator else {
            return Ok(gathered);
        };

        match regulator.check_medication(drug, current) {
            Err(e) if self.require_regional_checks => {
                tracing::error!(regulator = %regulator.regulator(), error = %e, "Regional check failed");
                Err(InteractionError::RegionalService {
                    region: self.region,
                    regulator: regulator.regulator(),
                    operation: "check_medication",
                    message: e.to_string(),
                })
            }
            result => {
                gathered.absorb(regulator.regulator().as_str(), "check_medication", result);
                Ok(gathered)
            }
        }
    }
}

fn describe_allergy(drug: &DrugInfo, allergy: &AllergyInfo, interaction: &AllergyInteraction) -> String {
    if interaction.direct_match {
        format!("{} matches the recorded allergy to {}", drug.name, allergy.allergen)
    } else if !interaction.class_warnings.is_empty() {
        format!("{} belongs to a drug class the resident is allergic to ({})", drug.name, allergy.allergen)
    } else {
        format!("{} may cross-react with the recorded allergy to {}", drug.name, allergy.allergen)
    }
}

/// Parse a region and care-home type label, raising the validation error
/// a caller would get from [`UnifiedDrugInteractionService::new`].
pub fn parse_labels(region: &str, care_home_type: &str) -> InteractionResult<(Region, CareHomeType)> {
    let parsed_region = Region::parse(region).ok_or_else(|| {
        InteractionError::validation(
            "INVALID_REGION",
            format!("Unknown region '{}'", region),
            json!({
                "region": region,
                "allowed": Region::ALL.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            }),
        )
    })?;
    let parsed_type = CareHomeType::parse(care_home_type).ok_or_else(|| {
        InteractionError::validation(
            "INVALID_CARE_HOME_TYPE",
            format!("Unknown care home type '{}'", care_home_type),
            json!({ "care_home_type": care_home_type, "allowed": ["ADULT", "CHILDREN"] }),
        )
    })?;
    Ok((parsed_region, parsed_type))
}

fn require_drug(drug: &DrugInfo, code: &'static str, position: Option<usize>) -> InteractionResult<()> {
    let mut missing = Vec::new();
    if drug.id.trim().is_empty() {
        missing.push("id");
    }
    if drug.name.trim().is_empty() {
        missing.push("name");
    }
    if missing.is_empty() {
        return Ok(());
    }

    Err(InteractionError::validation(
        code,
        format!("Medication is missing required fields: {}", missing.join(", ")),
        json!({ "index": position, "missing": missing, "id": drug.id }),
    ))
}

/// Reject malformed input before any source is called.
pub fn validate(new_drug: &DrugInfo, current: &[DrugInfo], allergies: &[AllergyInfo]) -> InteractionResult<()> {
    require_drug(new_drug, "INVALID_DRUG", None)?;
    for (i, drug) in current.iter().enumerate() {
        require_drug(drug, "INVALID_MEDICATION", Some(i))?;
    }
    for (i, allergy) in allergies.iter().enumerate() {
        if allergy.allergen.trim().is_empty() {
            return Err(InteractionError::validation(
                "INVALID_ALLERGY",
                "Allergy must name an allergen",
                json!({ "index": i, "id": allergy.id }),
            ));
        }
    }
    Ok(())
}
