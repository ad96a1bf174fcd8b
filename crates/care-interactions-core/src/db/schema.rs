//! SQLite schema definition.

/// Complete database schema for the interaction caches and audit chain.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Drug Pair Cache (DrugInteractionService)
-- ============================================================================

CREATE TABLE IF NOT EXISTS drug_pair_cache (
    pair_key TEXT PRIMARY KEY,                   -- length-prefixed sorted ids (pair_key)
    payload TEXT NOT NULL,                       -- JSON array of DrugInteraction
    updated_at TEXT NOT NULL                     -- RFC 3339, used for TTL
);

-- ============================================================================
-- Allergy Cache (AllergyDatabase)
-- ============================================================================

CREATE TABLE IF NOT EXISTS allergy_cache (
    drug_id TEXT NOT NULL,
    allergy_id TEXT NOT NULL,
    payload TEXT NOT NULL,                       -- JSON AllergyInteraction or 'null'
    updated_at TEXT NOT NULL,
    PRIMARY KEY (drug_id, allergy_id)
);

CREATE INDEX IF NOT EXISTS idx_allergy_cache_updated ON allergy_cache(updated_at);

-- ============================================================================
-- Audit Chain (Append-Only)
-- ============================================================================

CREATE TABLE IF NOT EXISTS audit_events (
    sequence INTEGER PRIMARY KEY,                -- 0-based, contiguous
    event_id TEXT NOT NULL UNIQUE,
    operation TEXT NOT NULL,
    payload TEXT NOT NULL,                       -- canonical JSON
    prev_hash TEXT NOT NULL,
    this_hash TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS audit_events_no_update BEFORE UPDATE ON audit_events
BEGIN
    SELECT RAISE(ABORT, 'Audit events are append-only');
END;

CREATE TRIGGER IF NOT EXISTS audit_events_no_delete BEFORE DELETE ON audit_events
BEGIN
    SELECT RAISE(ABORT, 'Audit events are append-only');
END;
"#;
