//! A clinical source that refuses every call.

use crate::models::{AllergyInfo, DoseAlert, DrugInfo, DrugInteraction, FoodInteraction};

use super::{ClinicalSource, SourceError, SourceResult};

pub(crate) struct OfflineSource(pub &'static str);

impl OfflineSource {
    fn refuse<T>(&self) -> SourceResult<T> {
        Err(SourceError::unavailable(self.0, "connection refused"))
    }
}

impl ClinicalSource for OfflineSource {
    fn name(&self) -> &str {
        self.0
    }

    fn check_drug_interaction(&self, _: &DrugInfo, _: &DrugInfo) -> SourceResult<Vec<DrugInteraction>> {
        self.refuse()
    }

    fn check_allergy_interaction(&self, _: &DrugInfo, _: &AllergyInfo) -> SourceResult<Vec<DrugInteraction>> {
        self.refuse()
    }

    fn get_contraindications(&self, _: &DrugInfo) -> SourceResult<Vec<DrugInteraction>> {
        self.refuse()
    }

    fn get_food_interactions(&self, _: &DrugInfo) -> SourceResult<Vec<FoodInteraction>> {
        self.refuse()
    }

    fn get_dose_alerts(&self, _: &DrugInfo) -> SourceResult<Vec<DoseAlert>> {
        self.refuse()
    }

    fn update_database(&self) -> SourceResult<()> {
        self.refuse()
    }
}
