//! TTL-checked JSON caches for drug pairs and (drug, allergy) pairs.
//!
//! Writes are independent upserts; concurrent writers for the same key
//! resolve as last-writer-wins.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};

/// A cached JSON payload with its write time.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether this entry is still valid at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.updated_at < ttl
    }
}

impl Database {
    /// Get a drug-pair cache entry by its sorted pair key.
    pub fn get_pair_cache(&self, pair_key: &str) -> DbResult<Option<CacheEntry>> {
        self.conn
            .query_row(
                "SELECT payload, updated_at FROM drug_pair_cache WHERE pair_key = ?",
                [pair_key],
                |row| {
                    Ok(CacheRow {
                        payload: row.get(0)?,
                        updated_at: row.get(1)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.into_entry("drug_pair_cache"))
            .transpose()
    }

    /// Insert or replace a drug-pair cache entry.
    pub fn put_pair_cache(&self, pair_key: &str, payload: &str, now: DateTime<Utc>) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO drug_pair_cache (pair_key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(pair_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
            params![pair_key, payload, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove every drug-pair cache entry. Returns rows removed.
    pub fn clear_pair_cache(&self) -> DbResult<usize> {
        Ok(self.conn.execute("DELETE FROM drug_pair_cache", [])?)
    }

    /// Get an allergy cache entry.
    pub fn get_allergy_cache(&self, drug_id: &str, allergy_id: &str) -> DbResult<Option<CacheEntry>> {
        self.conn
            .query_row(
                r#"
                SELECT payload, updated_at FROM allergy_cache
                WHERE drug_id = ?1 AND allergy_id = ?2
                "#,
                params![drug_id, allergy_id],
                |row| {
                    Ok(CacheRow {
                        payload: row.get(0)?,
                        updated_at: row.get(1)?,
                    })
                },
            )
            .optional()?
            .map(|row| row.into_entry("allergy_cache"))
            .transpose()
    }

    /// Insert or replace an allergy cache entry.
    pub fn put_allergy_cache(
        &self,
        drug_id: &str,
        allergy_id: &str,
        payload: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO allergy_cache (drug_id, allergy_id, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(drug_id, allergy_id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
            params![drug_id, allergy_id, payload, now.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove every allergy cache entry. Returns rows removed.
    pub fn clear_allergy_cache(&self) -> DbResult<usize> {
        Ok(self.conn.execute("DELETE FROM allergy_cache", [])?)
    }

    /// Count of rows in each cache: (pair, allergy).
    pub fn cache_sizes(&self) -> DbResult<(u64, u64)> {
        let pairs: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM drug_pair_cache", [], |row| row.get(0))?;
        let allergies: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM allergy_cache", [], |row| row.get(0))?;
        Ok((pairs as u64, allergies as u64))
    }
}

/// Intermediate row struct for database mapping.
struct CacheRow {
    payload: String,
    updated_at: String,
}

impl CacheRow {
    fn into_entry(self, table: &'static str) -> DbResult<CacheEntry> {
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map_err(|_| DbError::Timestamp {
                table,
                value: self.updated_at.clone(),
            })?
            .with_timezone(&Utc);
        Ok(CacheEntry {
            payload: self.payload,
            updated_at,
        })
    }
}
