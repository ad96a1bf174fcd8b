//! Wiring: build every service from an [`EngineConfig`].

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::administration::MedicationAdministrationService;
use crate::audit::{AuditLog, ChainVerification};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::db::Database;
use crate::models::InteractionReport;
use crate::resolver::Normalizer;
use crate::services::{
    parse_labels, AllergyDatabase, CheckRequest, CrossReactivityService, DrugInteractionService, InteractionError,
    InteractionResult, RefreshSummary, UnifiedDrugInteractionService,
};
use crate::sources::{
    ClinicalSource, CrossReactivityPredictor, PatternSource, ReferenceFormulary, ReferencePatterns,
    ReferencePredictor, ReferenceStructures, RegulatorSet, SourceError, StructureSource, BNF, NICE,
};

/// Every external collaborator the services consult.
#[derive(Clone)]
pub struct SourceSet {
    pub clinical: Vec<Arc<dyn ClinicalSource>>,
    pub patterns: Vec<Arc<dyn PatternSource>>,
    pub structures: Arc<dyn StructureSource>,
    pub predictor: Arc<dyn CrossReactivityPredictor>,
    pub regulators: RegulatorSet,
}

impl SourceSet {
    /// Built-in reference data for every source.
    pub fn reference() -> Self {
        Self {
            clinical: vec![Arc::new(ReferenceFormulary::bnf()), Arc::new(ReferenceFormulary::nice())],
            patterns: vec![Arc::new(ReferencePatterns::bnf()), Arc::new(ReferencePatterns::drugbank())],
            structures: Arc::new(ReferenceStructures::new()),
            predictor: Arc::new(ReferencePredictor::new()),
            regulators: RegulatorSet::reference(),
        }
    }

    /// Reference sources, with any data files named in the config loaded
    /// in place of the built-in rules.
    pub fn from_config(config: &EngineConfig) -> Result<Self, SourceError> {
        let paths = &config.sources;
        let mut sources = Self::reference();

        let bnf: Arc<dyn ClinicalSource> = match &paths.bnf_path {
            Some(path) => Arc::new(ReferenceFormulary::from_file(BNF, path)?),
            None => Arc::new(ReferenceFormulary::bnf()),
        };
        let nice: Arc<dyn ClinicalSource> = match &paths.nice_path {
            Some(path) => Arc::new(ReferenceFormulary::from_file(NICE, path)?),
            None => Arc::new(ReferenceFormulary::nice()),
        };
        sources.clinical = vec![bnf, nice];

        let mut bnf_patterns = ReferencePatterns::bnf();
        if let Some(path) = &paths.bnf_patterns_path {
            bnf_patterns = bnf_patterns.with_path(path);
            bnf_patterns.refresh()?;
        }
        let mut drugbank_patterns = ReferencePatterns::drugbank();
        if let Some(path) = &paths.drugbank_patterns_path {
            drugbank_patterns = drugbank_patterns.with_path(path);
            drugbank_patterns.refresh()?;
        }
        sources.patterns = vec![Arc::new(bnf_patterns), Arc::new(drugbank_patterns)];

        Ok(sources)
    }
}

/// What [`InteractionEngine::refresh`] did.
#[derive(Debug, Clone, Serialize)]
pub struct EngineRefresh {
    pub refreshed: Vec<String>,
    pub failures: Vec<crate::models::SourceFailure>,
    pub allergy_cache_cleared: usize,
    pub pair_cache_cleared: usize,
}

impl From<(RefreshSummary, usize)> for EngineRefresh {
    fn from((summary, pair_cache_cleared): (RefreshSummary, usize)) -> Self {
        Self {
            refreshed: summary.refreshed,
            failures: summary.failures,
            allergy_cache_cleared: summary.cleared,
            pair_cache_cleared,
        }
    }
}

/// The assembled services sharing one database and audit log.
pub struct InteractionEngine {
    config: EngineConfig,
    db: Arc<Mutex<Database>>,
    audit: Arc<AuditLog>,
    base: Arc<DrugInteractionService>,
    allergies: Arc<AllergyDatabase>,
    unified: Arc<UnifiedDrugInteractionService>,
}

impl InteractionEngine {
    pub fn from_config(config: &EngineConfig, sources: SourceSet, clock: Arc<dyn Clock>) -> InteractionResult<Self> {
        let config = config.clone();
        // Unknown labels raise INVALID_REGION / INVALID_CARE_HOME_TYPE (400)
        parse_labels(&config.region, &config.care_home_type)?;
        config.validate()?;

        let db = match &config.database_path {
            Some(path) => Database::open(path)?,
            None => Database::open_in_memory()?,
        };
        let db = Arc::new(Mutex::new(db));
        let normalizer = Arc::new(Normalizer::new());

        let cross_reactivity = Arc::new(
            CrossReactivityService::new(
                Arc::clone(&normalizer),
                sources.structures,
                sources.patterns,
                sources.predictor,
            )
            .with_threshold(config.similarity_threshold),
        );

        let base = Arc::new(
            DrugInteractionService::new(Arc::clone(&db), Arc::clone(&clock), sources.clinical.clone())
                .with_ttl(config.pair_cache_ttl()),
        );

        let allergies = Arc::new(
            AllergyDatabase::new(
                Arc::clone(&db),
                Arc::clone(&clock),
                normalizer,
                sources.clinical,
                cross_reactivity,
            )
            .with_ttl(config.allergy_cache_ttl()),
        );

        let audit = Arc::new(AuditLog::new(Arc::clone(&db), clock));

        let unified = UnifiedDrugInteractionService::new(
            &config.region,
            &config.care_home_type,
            Arc::clone(&base),
            Arc::clone(&allergies),
            &sources.regulators,
        )?
        .with_audit(Arc::clone(&audit))
        .with_required_regional_checks(config.require_regional_checks);
        let unified = Arc::new(unified);

        tracing::info!(
            region = %unified.region(),
            care_home_type = unified.care_home_type().as_str(),
            regulator = ?unified.regulator(),
            persistent = config.database_path.is_some(),
            "Interaction engine ready"
        );

        Ok(Self {
            config,
            db,
            audit,
            base,
            allergies,
            unified,
        })
    }

    /// Engine with built-in reference sources.
    pub fn from_config_with_reference_sources(config: &EngineConfig, clock: Arc<dyn Clock>) -> InteractionResult<Self> {
        let sources = SourceSet::from_config(config).map_err(|e| InteractionError::Config(e.to_string()))?;
        Self::from_config(config, sources, clock)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn unified(&self) -> &UnifiedDrugInteractionService {
        &self.unified
    }

    /// Administration gate sharing this engine's checker and audit log.
    pub fn administration(&self) -> MedicationAdministrationService {
        MedicationAdministrationService::new(Arc::clone(&self.unified), Arc::clone(&self.audit))
    }

    pub fn drug_interactions(&self) -> &DrugInteractionService {
        &self.base
    }

    pub fn allergy_database(&self) -> &AllergyDatabase {
        &self.allergies
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn database(&self) -> &Arc<Mutex<Database>> {
        &self.db
    }

    pub fn check(&self, request: &CheckRequest) -> InteractionResult<InteractionReport> {
        self.unified
            .check_interactions(&request.new_drug, &request.current_medications, &request.allergies)
    }

    /// Parse a JSON request body and check it.
    pub fn check_json(&self, raw: &str) -> InteractionResult<InteractionReport> {
        self.check(&CheckRequest::from_json(raw)?)
    }

    /// Refresh every source, then drop both caches.
    pub fn refresh(&self) -> InteractionResult<EngineRefresh> {
        let summary = self.allergies.update_database()?;
        let pairs = self.base.clear_cache()?;
        Ok((summary, pairs).into())
    }

    pub fn verify_audit(&self) -> InteractionResult<ChainVerification> {
        Ok(self.audit.verify_chain()?)
    }
}
