//! Interaction checking services.
//!
//! - [`DrugInteractionService`]: BNF / NICE pair, allergy and contraindication checks
//! - [`AllergyDatabase`]: direct, cross-reactivity and class allergy checks
//! - [`CrossReactivityService`]: structural, pattern and model evidence
//! - [`UnifiedDrugInteractionService`]: region-aware façade adding regulator checks

mod allergy_database;
mod cross_reactivity;
mod dedup;
mod drug_interaction;
mod error;
mod fanout;
mod request;
mod unified;

pub use allergy_database::*;
pub use cross_reactivity::*;
pub use dedup::*;
pub use drug_interaction::{DrugInteractionService, PAIR_CACHE_TTL_HOURS};
pub use error::*;
pub use fanout::*;
pub use request::*;
pub use unified::*;
