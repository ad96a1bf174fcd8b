//! Care-Interactions Core Library
//!
//! Drug interaction, allergy and cross-reactivity checking for UK and Irish
//! care homes.
//!
//! # Architecture
//!
//! ```text
//!             CheckRequest (new drug, current medications, allergies)
//!                                     │
//!                     UnifiedDrugInteractionService (region, care home type)
//!                                     │
//!        ┌────────────────────────────┼────────────────────────────┐
//!        ▼                            ▼                            ▼
//! DrugInteractionService       AllergyDatabase             RegulatorySource
//!  BNF + NICE, pair cache    direct + class checks      (children's homes only)
//!                                     │
//!                          CrossReactivityService
//!                    structure · patterns · prediction
//!        └────────────────────────────┼────────────────────────────┘
//!                                     ▼
//!                 dedup → rank → InteractionReport + source_failures
//!                                     │
//!                         hash-chained audit event
//! ```
//!
//! # Core Principle
//!
//! **A failed source never hides a finding.** Branches that fail are
//! reported in `source_failures` beside the findings of the branches that
//! answered; only when every branch fails does a check return an error.
//!
//! # Modules
//!
//! - [`db`]: SQLite caches and audit chain storage
//! - [`models`]: Domain types (DrugInfo, DrugInteraction, Severity, etc.)
//! - [`resolver`]: Brand / alias normalisation and allergen matching
//! - [`sources`]: Knowledge source traits and built-in reference data
//! - [`services`]: Interaction, allergy, cross-reactivity and unified checks
//! - [`audit`]: Tamper-evident audit log
//! - [`administration`]: Pre-administration gate
//! - [`config`] / [`engine`]: TOML configuration and service wiring

pub mod administration;
pub mod audit;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod models;
pub mod resolver;
pub mod services;
pub mod sources;

// Re-export commonly used types
pub use administration::{
    AdministrationDecision, AdministrationOutcome, AdministrationRequest, MedicationAdministrationService, Override,
};
pub use audit::{AuditError, AuditLog, ChainVerification};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use db::Database;
pub use engine::{EngineRefresh, InteractionEngine, SourceSet};
pub use models::{
    AllergyInfo, AllergyInteraction, CareHomeType, Confidence, CrossReactivity, CrossReactivityType, DoseAlert,
    DrugInfo, DrugInteraction, FoodInteraction, InteractionReport, InteractionType, Region, Regulator, Severity,
    SourceFailure,
};
pub use resolver::Normalizer;
pub use services::{
    AllergyDatabase, CheckRequest, CrossReactivityService, DrugInteractionService, InteractionError,
    InteractionResult, UnifiedDrugInteractionService,
};
