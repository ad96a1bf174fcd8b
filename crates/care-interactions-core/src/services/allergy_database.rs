//! Combined allergy checking with a per (medication, allergy) cache.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use super::cross_reactivity::CrossReactivityService;
use super::error::{InteractionError, InteractionResult};
use super::fanout::{gather, Gathered};
use crate::clock::Clock;
use crate::db::Database;
use crate::models::{
    AllergyInfo, AllergyInteraction, CrossReactivity, DrugInfo, DrugInteraction, Severity, SourceFailure,
};
use crate::resolver::Normalizer;
use crate::sources::{ClinicalSource, DrugClassCatalog};

/// Default allergy cache lifetime.
pub const ALLERGY_CACHE_TTL_HOURS: i64 = 24;

const CRITICAL_RECOMMENDATIONS: &[&str] = &[
    "Do not administer; contact the prescriber immediately",
    "Record the allergy alert on the MAR chart",
];

const HIGH_RECOMMENDATIONS: &[&str] = &[
    "Prescriber review required before administration",
    "Monitor closely for signs of an allergic reaction",
];

/// A warning raised because the drug belongs to an allergen's class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassWarning {
    pub message: String,
    pub severity: Severity,
}

/// Outcome of one allergy check.
#[derive(Debug, Clone, PartialEq)]
pub struct AllergyCheck {
    pub interaction: Option<AllergyInteraction>,
    pub failures: Vec<SourceFailure>,
    /// Source calls made; zero on a cache hit
    pub attempted: usize,
    /// Whether the result came from the cache
    pub cached: bool,
    /// Every direct source (BNF, NICE) failed
    pub direct_unavailable: bool,
}

/// What a refresh did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshSummary {
    /// Sources that refreshed
    pub refreshed: Vec<String>,
    pub failures: Vec<SourceFailure>,
    /// Cache rows cleared
    pub cleared: usize,
}

pub struct AllergyDatabase {
    db: Arc<Mutex<Database>>,
    clock: Arc<dyn Clock>,
    normalizer: Arc<Normalizer>,
    sources: Vec<Arc<dyn ClinicalSource>>,
    cross_reactivity: Arc<CrossReactivityService>,
    classes: DrugClassCatalog,
    ttl: Duration,
}

impl AllergyDatabase {
    pub fn new(
        db: Arc<Mutex<Database>>,
        clock: Arc<dyn Clock>,
        normalizer: Arc<Normalizer>,
        sources: Vec<Arc<dyn ClinicalSource>>,
        cross_reactivity: Arc<CrossReactivityService>,
    ) -> Self {
        Self {
            db,
            clock,
            normalizer,
            sources,
            cross_reactivity,
            classes: DrugClassCatalog::new(),
            ttl: Duration::hours(ALLERGY_CACHE_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_classes(mut self, classes: DrugClassCatalog) -> Self {
        self.classes = classes;
        self
    }

    /// Check one medication against one allergy. `None` means nothing found.
    ///
    /// Fails with `SourceUnavailable` when no direct source answered and the
    /// other checks found nothing, so an unchecked allergy never reads as clear.
    pub fn check_interaction(
        &self,
        medication: &DrugInfo,
        allergy: &AllergyInfo,
    ) -> InteractionResult<Option<AllergyInteraction>> {
        let check = self.check_interaction_detailed(medication, allergy)?;
        if check.interaction.is_none() && check.direct_unavailable {
            return Err(InteractionError::SourceUnavailable {
                operation: "check_allergy_interaction",
                failures: check.failures,
            });
        }
        Ok(check.interaction)
    }

    pub fn check_interaction_detailed(
        &self,
        medication: &DrugInfo,
        allergy: &AllergyInfo,
    ) -> InteractionResult<AllergyCheck> {
        if allergy.allergen.trim().is_empty() {
            return Err(InteractionError::validation(
                "INVALID_ALLERGY",
                "Allergy must name an allergen",
                serde_json::json!({ "allergy_id": allergy.id }),
            ));
        }

        let now = self.clock.now();
        if let Some(interaction) = self.cached(medication, allergy, now) {
            return Ok(AllergyCheck {
                interaction,
                failures: Vec::new(),
                attempted: 0,
                cached: true,
                direct_unavailable: false,
            });
        }

        let (direct, (cross, class_warnings)) = rayon::join(
            || {
                gather(&self.sources, "check_allergy_interaction", |s| {
                    s.check_allergy_interaction(medication, allergy)
                })
            },
            || {
                rayon::join(
                    || self.cross_reactivity.analyze_detailed(medication, allergy),
                    || self.class_warnings(medication, allergy),
                )
            },
        );

        let cross = match cross {
            Ok(gathered) => gathered,
            Err(InteractionError::SourceUnavailable { failures, .. }) => Gathered::unavailable(failures),
            Err(e) => return Err(e),
        };

        let attempted = direct.attempted + cross.attempted;
        let direct_unavailable = direct.all_failed();
        let mut failures = direct.failures;
        failures.extend(cross.failures);

        let interaction = combine(
            &medication.id,
            &allergy.id,
            direct.items,
            cross.items,
            class_warnings,
            now,
        );

        if failures.is_empty() {
            self.store(medication, allergy, &interaction, now);
        } else {
            tracing::warn!(
                medication = %medication.id,
                allergy = %allergy.id,
                failed = failures.len(),
                "Partial allergy result, not cached"
            );
        }

        Ok(AllergyCheck {
            interaction,
            failures,
            attempted,
            cached: false,
            direct_unavailable,
        })
    }

    /// Refresh BNF, NICE and the cross-reactivity patterns, then clear the cache.
    pub fn update_database(&self) -> InteractionResult<RefreshSummary> {
        let (clinical, patterns) = rayon::join(
            || {
                gather(&self.sources, "update_database", |s| {
                    s.update_database().map(|_| vec![s.name().to_string()])
                })
            },
            || self.cross_reactivity.refresh_patterns(),
        );

        let mut gathered = clinical;
        gathered.merge(patterns);
        let gathered = gathered.require_any("update_database")?;

        let cleared = self.db.lock()?.clear_allergy_cache()?;
        tracing::info!(
            refreshed = gathered.items.len(),
            failed = gathered.failures.len(),
            cleared,
            "Allergy database refreshed"
        );

        Ok(RefreshSummary {
            refreshed: gathered.items,
            failures: gathered.failures,
            cleared,
        })
    }

    fn class_warnings(&self, medication: &DrugInfo, allergy: &AllergyInfo) -> Vec<ClassWarning> {
        let drug = self.normalizer.normalize_drug(medication);
        let allergen = self.normalizer.canonical_allergen(&allergy.allergen);
        let drug_classes = self.classes.classes_of(&drug);
        let anaphylactic = allergy.is_life_threatening();

        if drug_classes.contains(&allergen) {
            return vec![ClassWarning {
                message: format!("{} is a {}; resident is allergic to {}", medication.name, allergen, allergy.allergen),
                severity: if anaphylactic { Severity::Critical } else { Severity::High },
            }];
        }

        if drug.contains(&allergen) {
            return Vec::new();
        }

        self.classes
            .classes_of_name(&allergen)
            .intersection(&drug_classes)
            .map(|class| ClassWarning {
                message: format!("{} shares the {} class with recorded allergen {}", medication.name, class, allergy.allergen),
                severity: if anaphylactic { Severity::High } else { Severity::Medium },
            })
            .collect()
    }

    fn cached(
        &self,
        medication: &DrugInfo,
        allergy: &AllergyInfo,
        now: DateTime<Utc>,
    ) -> Option<Option<AllergyInteraction>> {
        let entry = match self.db.lock() {
            Ok(db) => db.get_allergy_cache(&medication.id, &allergy.id),
            Err(e) => {
                tracing::warn!(error = %e, "Allergy cache unavailable");
                return None;
            }
        };

        match entry {
            Ok(Some(entry)) if entry.is_fresh(self.ttl, now) => match serde_json::from_str(&entry.payload) {
                Ok(interaction) => {
                    tracing::debug!(medication = %medication.id, allergy = %allergy.id, "Allergy cache hit");
                    Some(interaction)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding unreadable allergy cache entry");
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Allergy cache read failed");
                None
            }
        }
    }

    fn store(
        &self,
        medication: &DrugInfo,
        allergy: &AllergyInfo,
        interaction: &Option<AllergyInteraction>,
        now: DateTime<Utc>,
    ) {
        let payload = match serde_json::to_string(interaction) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot serialize allergy result");
                return;
            }
        };

        let written = self
            .db
            .lock()
            .map_err(|e| e.to_string())
            .and_then(|db| {
                db.put_allergy_cache(&medication.id, &allergy.id, &payload, now)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = written {
            tracing::warn!(error = %e, "Allergy cache write failed");
        }
    }
}

/// Combine the three checks into one ranked record.
///
/// Returns `None` when no check found anything. Severity is the worst
/// across every contributing finding.
pub fn combine(
    medication_id: &str,
    allergy_id: &str,
    direct: Vec<DrugInteraction>,
    cross_reactivity: Vec<CrossReactivity>,
    class_warnings: Vec<ClassWarning>,
    checked_at: DateTime<Utc>,
) -> Option<AllergyInteraction> {
    let severities = direct
        .iter()
        .map(|d| d.severity)
        .chain(cross_reactivity.iter().map(|c| c.severity))
        .chain(class_warnings.iter().map(|w| w.severity));
    let severity = Severity::worst(severities)?;

    let mut evidence: Vec<String> = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();
    let push = |list: &mut Vec<String>, value: &str| {
        if !list.iter().any(|v| v == value) {
            list.push(value.to_string());
        }
    };

    for finding in &direct {
        push(&mut evidence, &finding.description);
        for e in &finding.evidence {
            push(&mut evidence, e);
        }
        for r in &finding.recommendations {
            push(&mut recommendations, r);
        }
    }
    for cross in &cross_reactivity {
        push(&mut evidence, &format!("{}: {}", cross.source, cross.description));
        for e in &cross.evidence {
            push(&mut evidence, e);
        }
        push(&mut recommendations, &cross.recommendation);
    }
    for warning in &class_warnings {
        push(&mut evidence, &warning.message);
    }

    let boilerplate: &[&str] = match severity {
        Severity::Critical => CRITICAL_RECOMMENDATIONS,
        Severity::High => HIGH_RECOMMENDATIONS,
        _ => &[],
    };
    for r in boilerplate {
        push(&mut recommendations, r);
    }

    Some(AllergyInteraction {
        medication_id: medication_id.to_string(),
        allergy_id: allergy_id.to_string(),
        severity,
        direct_match: !direct.is_empty(),
        cross_reactivity,
        class_warnings: class_warnings.into_iter().map(|w| w.message).collect(),
        evidence,
        recommendations,
        checked_at: checked_at.to_rfc3339(),
    })
}
