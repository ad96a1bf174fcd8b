//! Append-only, hash-chained audit log of completed checks.
//!
//! Each event commits to its position, the previous event's hash and its
//! own content:
//!
//! ```text
//! this_hash = sha256( sequence (u64 LE) ‖ prev_hash ‖ operation ‖ created_at ‖ payload )
//! ```
//!
//! The first event links to [`GENESIS_HASH`]. Rewriting any stored event
//! breaks every hash after it.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::{AuditEvent, Database, DbError};

/// `prev_hash` of the first event.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Audit errors.
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

impl<T> From<std::sync::PoisonError<T>> for AuditError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        AuditError::Lock(e.to_string())
    }
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Result of walking the chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainVerification {
    pub events: usize,
    pub valid: bool,
    /// Sequence of the first event that fails verification
    pub first_invalid: Option<u64>,
}

/// Hash of one event's fields.
pub fn hash_event(sequence: u64, prev_hash: &str, operation: &str, created_at: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(operation.as_bytes());
    hasher.update(created_at.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Check linkage and hashes of an ordered event list.
pub fn verify_events(events: &[AuditEvent]) -> ChainVerification {
    let mut expected_prev = GENESIS_HASH.to_string();
    let mut expected_sequence = 0u64;

    for event in events {
        let recomputed = hash_event(
            event.sequence,
            &event.prev_hash,
            &event.operation,
            &event.created_at,
            &event.payload,
        );
        if event.sequence != expected_sequence || event.prev_hash != expected_prev || event.this_hash != recomputed {
            return ChainVerification {
                events: events.len(),
                valid: false,
                first_invalid: Some(event.sequence),
            };
        }
        expected_prev = event.this_hash.clone();
        expected_sequence += 1;
    }

    ChainVerification {
        events: events.len(),
        valid: true,
        first_invalid: None,
    }
}

/// Audit log service, shared by every component that records events.
pub struct AuditLog {
    db: Arc<Mutex<Database>>,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(db: Arc<Mutex<Database>>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Append an event. The payload is stored as canonical JSON.
    pub fn record<T: Serialize>(&self, operation: &str, payload: &T) -> AuditResult<AuditEvent> {
        // Value maps are sorted, so the stored text is key-order independent
        let payload = serde_json::to_string(&serde_json::to_value(payload)?)?;
        let created_at = self.clock.now().to_rfc3339();

        let db = self.db.lock()?;
        let last = db.last_audit_event()?;
        let (sequence, prev_hash) = match last {
            Some(last) => (last.sequence + 1, last.this_hash),
            None => (0, GENESIS_HASH.to_string()),
        };

        let this_hash = hash_event(sequence, &prev_hash, operation, &created_at, &payload);
        let event = AuditEvent {
            sequence,
            event_id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
            payload,
            prev_hash,
            this_hash,
            created_at,
        };
        db.insert_audit_event(&event)?;

        tracing::debug!(sequence, operation, "Audit event recorded");
        Ok(event)
    }

    /// Verify every stored event.
    pub fn verify_chain(&self) -> AuditResult<ChainVerification> {
        let events = self.db.lock()?.list_audit_events()?;
        let verification = verify_events(&events);
        if !verification.valid {
            tracing::warn!(first_invalid = ?verification.first_invalid, "Audit chain verification failed");
        }
        Ok(verification)
    }

    pub fn events(&self) -> AuditResult<Vec<AuditEvent>> {
        Ok(self.db.lock()?.list_audit_events()?)
    }
}
