//! Base BNF / NICE interaction checking with a drug-pair cache.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;

use super::dedup::{deduplicate_items, sort_by_severity, Deduplicate};
use super::error::{InteractionError, InteractionResult};
use super::fanout::{gather, Gathered};
use crate::clock::Clock;
use crate::db::Database;
use crate::models::{pair_key, AllergyInfo, DoseAlert, DrugInfo, DrugInteraction, FoodInteraction, InteractionReport};
use crate::sources::ClinicalSource;

/// Default drug-pair cache lifetime.
pub const PAIR_CACHE_TTL_HOURS: i64 = 12;

pub struct DrugInteractionService {
    db: Arc<Mutex<Database>>,
    clock: Arc<dyn Clock>,
    sources: Vec<Arc<dyn ClinicalSource>>,
    ttl: Duration,
}

impl DrugInteractionService {
    pub fn new(db: Arc<Mutex<Database>>, clock: Arc<dyn Clock>, sources: Vec<Arc<dyn ClinicalSource>>) -> Self {
        Self {
            db,
            clock,
            sources,
            ttl: Duration::hours(PAIR_CACHE_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn sources(&self) -> &[Arc<dyn ClinicalSource>] {
        &self.sources
    }

    /// Interactions between two drugs, merged across sources.
    ///
    /// Served from the pair cache when fresh. Results are only cached when
    /// every source answered.
    pub fn check_drug_pair(&self, a: &DrugInfo, b: &DrugInfo) -> InteractionResult<Gathered<DrugInteraction>> {
        let key = pair_key(&a.id, &b.id);
        let now = self.clock.now();

        if let Some(items) = self.cached(&key, now) {
            return Ok(Gathered::from_cache(items));
        }

        let mut gathered = gather(&self.sources, "check_drug_interaction", |s| s.check_drug_interaction(a, b))
            .require_any("check_drug_pair")?;
        gathered.items = deduplicate_items(std::mem::take(&mut gathered.items));
        sort_by_severity(&mut gathered.items);

        if gathered.is_complete() {
            self.store(&key, &gathered.items, now)?;
        } else {
            tracing::warn!(pair = %key, failed = gathered.failures.len(), "Partial pair result, not cached");
        }
        Ok(gathered)
    }

    /// Pairwise checks of `drug` against every current medication.
    pub fn check_current_medications(
        &self,
        drug: &DrugInfo,
        current: &[DrugInfo],
    ) -> InteractionResult<Gathered<DrugInteraction>> {
        let results: Vec<InteractionResult<Gathered<DrugInteraction>>> = current
            .par_iter()
            .filter(|other| other.id != drug.id)
            .map(|other| self.check_drug_pair(drug, other))
            .collect();

        let mut merged = Gathered::new();
        for result in results {
            match result {
                Ok(gathered) => merged.merge(gathered),
                Err(InteractionError::SourceUnavailable { failures, .. }) => merged.merge(Gathered::unavailable(failures)),
                Err(e) => return Err(e),
            }
        }
        Ok(merged)
    }

    /// Direct allergy warnings from every source for every allergy.
    pub fn check_allergies(&self, drug: &DrugInfo, allergies: &[AllergyInfo]) -> Gathered<DrugInteraction> {
        let per_allergy: Vec<Gathered<DrugInteraction>> = allergies
            .par_iter()
            .map(|allergy| {
                gather(&self.sources, "check_allergy_interaction", |s| {
                    s.check_allergy_interaction(drug, allergy)
                })
            })
            .collect();

        let mut merged = Gathered::new();
        for gathered in per_allergy {
            merged.merge(gathered);
        }
        merged
    }

    pub fn contraindications(&self, drug: &DrugInfo) -> Gathered<DrugInteraction> {
        gather(&self.sources, "get_contraindications", |s| s.get_contraindications(drug))
    }

    pub fn food_interactions(&self, drug: &DrugInfo) -> Gathered<FoodInteraction> {
        gather(&self.sources, "get_food_interactions", |s| s.get_food_interactions(drug))
    }

    pub fn dose_alerts(&self, drug: &DrugInfo) -> Gathered<DoseAlert> {
        gather(&self.sources, "get_dose_alerts", |s| s.get_dose_alerts(drug))
    }

    /// Full base check: current medications, allergies and contraindications.
    pub fn check(
        &self,
        drug: &DrugInfo,
        current: &[DrugInfo],
        allergies: &[AllergyInfo],
    ) -> InteractionResult<InteractionReport> {
        let ((pairs, contraindications), (allergy_warnings, (food, dose))) = rayon::join(
            || rayon::join(|| self.check_current_medications(drug, current), || self.contraindications(drug)),
            || {
                rayon::join(
                    || self.check_allergies(drug, allergies),
                    || rayon::join(|| self.food_interactions(drug), || self.dose_alerts(drug)),
                )
            },
        );

        let mut drug_interactions = pairs?;
        drug_interactions.merge(contraindications);

        let mut tally = Tally::default();
        tally.add(&drug_interactions);
        tally.add(&allergy_warnings);
        tally.add(&food);
        tally.add(&dose);
        if tally.all_failed() {
            let mut failures = drug_interactions.failures;
            failures.extend(allergy_warnings.failures);
            failures.extend(food.failures);
            failures.extend(dose.failures);
            return Err(InteractionError::SourceUnavailable {
                operation: "check",
                failures,
            });
        }

        let mut source_failures = drug_interactions.failures;
        source_failures.extend(allergy_warnings.failures);
        source_failures.extend(food.failures);
        source_failures.extend(dose.failures);

        Ok(InteractionReport {
            drug_interactions: merged(drug_interactions.items),
            allergy_interactions: merged(allergy_warnings.items),
            food_interactions: merged(food.items),
            dose_alerts: merged(dose.items),
            source_failures,
        })
    }

    /// Drop every cached pair. Returns rows removed.
    pub fn clear_cache(&self) -> InteractionResult<usize> {
        Ok(self.db.lock()?.clear_pair_cache()?)
    }

    fn cached(&self, key: &str, now: DateTime<Utc>) -> Option<Vec<DrugInteraction>> {
        let entry = match self.db.lock() {
            Ok(db) => db.get_pair_cache(key),
            Err(e) => {
                tracing::warn!(error = %e, "Pair cache unavailable");
                return None;
            }
        };

        match entry {
            Ok(Some(entry)) if entry.is_fresh(self.ttl, now) => match serde_json::from_str(&entry.payload) {
                Ok(items) => {
                    tracing::debug!(pair = %key, "Pair cache hit");
                    Some(items)
                }
                Err(e) => {
                    tracing::warn!(pair = %key, error = %e, "Discarding unreadable pair cache entry");
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(pair = %key, error = %e, "Pair cache read failed");
                None
            }
        }
    }

    fn store(&self, key: &str, items: &[DrugInteraction], now: DateTime<Utc>) -> InteractionResult<()> {
        let payload = serde_json::to_string(items)?;
        let written = self
            .db
            .lock()
            .map_err(|e| e.to_string())
            .and_then(|db| db.put_pair_cache(key, &payload, now).map_err(|e| e.to_string()));
        if let Err(e) = written {
            tracing::warn!(pair = %key, error = %e, "Pair cache write failed");
        }
        Ok(())
    }
}

/// Dedup then rank most severe first.
pub(crate) fn merged<T: Deduplicate>(items: Vec<T>) -> Vec<T> {
    let mut items = deduplicate_items(items);
    sort_by_severity(&mut items);
    items
}

/// Counts branch outcomes across differently-typed fan-outs.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Tally {
    attempted: usize,
    failed: usize,
    cache_hits: usize,
}

impl Tally {
    pub(crate) fn add<T>(&mut self, gathered: &Gathered<T>) {
        self.attempted += gathered.attempted;
        self.failed += gathered.failures.len();
        self.cache_hits += gathered.cache_hits;
    }

    /// No live branch answered and nothing came from the cache.
    pub(crate) fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failed == self.attempted && self.cache_hits == 0
    }
}
