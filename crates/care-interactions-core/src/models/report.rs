//! Aggregated check results.

use serde::{Deserialize, Serialize};

use super::interaction::{DoseAlert, DrugInteraction, FoodInteraction};
use super::severity::Severity;

/// A fan-out branch that failed while others succeeded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceFailure {
    /// Source name (e.g., "BNF", "OFSTED")
    pub source: String,
    /// Operation that failed (e.g., "check_drug_interaction")
    pub operation: String,
    pub message: String,
}

/// Full result of checking a new drug for a resident.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionReport {
    pub drug_interactions: Vec<DrugInteraction>,
    pub allergy_interactions: Vec<DrugInteraction>,
    pub food_interactions: Vec<FoodInteraction>,
    pub dose_alerts: Vec<DoseAlert>,
    /// Branches that failed; empty when every source answered
    #[serde(default)]
    pub source_failures: Vec<SourceFailure>,
}

impl InteractionReport {
    /// Worst severity across every finding in the report.
    pub fn highest_severity(&self) -> Option<Severity> {
        let drug = self.drug_interactions.iter().map(|i| i.severity);
        let allergy = self.allergy_interactions.iter().map(|i| i.severity);
        let food = self.food_interactions.iter().map(|i| i.severity);
        let dose = self.dose_alerts.iter().map(|a| a.severity);
        Severity::worst(drug.chain(allergy).chain(food).chain(dose))
    }

    /// Total number of findings.
    pub fn finding_count(&self) -> usize {
        self.drug_interactions.len()
            + self.allergy_interactions.len()
            + self.food_interactions.len()
            + self.dose_alerts.len()
    }

    /// Whether every source answered.
    pub fn is_complete(&self) -> bool {
        self.source_failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InteractionType;

    #[test]
    fn test_highest_severity() {
        let mut report = InteractionReport::default();
        assert_eq!(report.highest_severity(), None);
        assert!(report.is_complete());

        report.drug_interactions.push(DrugInteraction::new(
            InteractionType::DrugDrug,
            Severity::Medium,
            "x",
            vec!["a".into(), "b".into()],
        ));
        report.dose_alerts.push(DoseAlert {
            drug_id: "a".into(),
            alert: "max 4g".into(),
            severity: Severity::High,
            max_daily_dose: Some("4 g".into()),
            sources: vec![],
        });

        assert_eq!(report.highest_severity(), Some(Severity::High));
        assert_eq!(report.finding_count(), 2);
    }
}
