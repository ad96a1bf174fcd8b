//! Partial-success aggregation for parallel source calls.
//!
//! Each branch of a fan-out either contributes items or a [`SourceFailure`].
//! Successful branches are never discarded because another branch failed;
//! only a fan-out in which every branch failed is an error.

use std::sync::Arc;

use rayon::prelude::*;

use super::error::{InteractionError, InteractionResult};
use crate::models::SourceFailure;
use crate::sources::{ClinicalSource, CrossReactivityPredictor, PatternSource, RegulatorySource, SourceResult, StructureSource};

/// Name recorded for a source in failures.
pub trait SourceName {
    fn source_name(&self) -> String;
}

impl SourceName for dyn ClinicalSource {
    fn source_name(&self) -> String {
        self.name().to_string()
    }
}

impl SourceName for dyn PatternSource {
    fn source_name(&self) -> String {
        self.name().to_string()
    }
}

impl SourceName for dyn StructureSource {
    fn source_name(&self) -> String {
        self.name().to_string()
    }
}

impl SourceName for dyn CrossReactivityPredictor {
    fn source_name(&self) -> String {
        self.name().to_string()
    }
}

impl SourceName for dyn RegulatorySource {
    fn source_name(&self) -> String {
        self.regulator().as_str().to_string()
    }
}

/// Items gathered from several branches plus the branches that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Gathered<T> {
    pub items: Vec<T>,
    pub failures: Vec<SourceFailure>,
    /// Number of branches attempted
    pub attempted: usize,
    /// Branches answered from a fresh cache entry instead of a source
    pub cache_hits: usize,
}

impl<T> Default for Gathered<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
            attempted: 0,
            cache_hits: 0,
        }
    }
}

impl<T> Gathered<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A branch answered from the cache.
    pub fn from_cache(items: Vec<T>) -> Self {
        Self {
            items,
            cache_hits: 1,
            ..Self::default()
        }
    }

    /// Every branch failed, no cache entry answered.
    pub fn unavailable(failures: Vec<SourceFailure>) -> Self {
        Self {
            items: Vec::new(),
            attempted: failures.len(),
            failures,
            cache_hits: 0,
        }
    }

    /// Record one branch's outcome.
    pub fn absorb(&mut self, source: &str, operation: &str, result: SourceResult<Vec<T>>) {
        self.attempted += 1;
        match result {
            Ok(items) => self.items.extend(items),
            Err(e) => {
                tracing::warn!(source, operation, error = %e, "Source call failed");
                self.failures.push(SourceFailure {
                    source: source.to_string(),
                    operation: operation.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    /// Fold another fan-out's outcome into this one.
    pub fn merge(&mut self, other: Gathered<T>) {
        self.items.extend(other.items);
        self.failures.extend(other.failures);
        self.attempted += other.attempted;
        self.cache_hits += other.cache_hits;
    }

    /// Whether branches ran and none of them succeeded or hit the cache.
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failures.len() == self.attempted && self.cache_hits == 0
    }

    /// Whether every branch answered.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Error out if every branch failed.
    pub fn require_any(self, operation: &'static str) -> InteractionResult<Self> {
        if self.all_failed() {
            return Err(InteractionError::SourceUnavailable {
                operation,
                failures: self.failures,
            });
        }
        Ok(self)
    }
}

/// Call every source in parallel and gather the results in source order.
pub fn gather<S, T, F>(sources: &[Arc<S>], operation: &'static str, call: F) -> Gathered<T>
where
    S: SourceName + Send + Sync + ?Sized,
    T: Send,
    F: Fn(&S) -> SourceResult<Vec<T>> + Sync,
{
    let outcomes: Vec<(String, SourceResult<Vec<T>>)> = sources
        .par_iter()
        .map(|source| (source.source_name(), call(source.as_ref())))
        .collect();

    let mut gathered = Gathered::new();
    for (name, result) in outcomes {
        gathered.absorb(&name, operation, result);
    }
    gathered
}
