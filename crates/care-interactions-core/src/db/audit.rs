//! Audit chain database operations.

use rusqlite::{params, OptionalExtension};

use super::DbResult;
use super::Database;

/// A stored audit event.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub sequence: u64,
    pub event_id: String,
    pub operation: String,
    pub payload: String,
    pub prev_hash: String,
    pub this_hash: String,
    pub created_at: String,
}

impl Database {
    /// Append an audit event.
    pub fn insert_audit_event(&self, event: &AuditEvent) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO audit_events (
                sequence, event_id, operation, payload, prev_hash, this_hash, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                event.sequence as i64,
                event.event_id,
                event.operation,
                event.payload,
                event.prev_hash,
                event.this_hash,
                event.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get the most recent audit event.
    pub fn last_audit_event(&self) -> DbResult<Option<AuditEvent>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT sequence, event_id, operation, payload, prev_hash, this_hash, created_at
                FROM audit_events
                ORDER BY sequence DESC
                LIMIT 1
                "#,
                [],
                map_audit_row,
            )
            .optional()?)
    }

    /// List all audit events in chain order.
    pub fn list_audit_events(&self) -> DbResult<Vec<AuditEvent>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT sequence, event_id, operation, payload, prev_hash, this_hash, created_at
            FROM audit_events
            ORDER BY sequence ASC
            "#,
        )?;

        let rows = stmt.query_map([], map_audit_row)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

fn map_audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    let sequence: i64 = row.get(0)?;
    Ok(AuditEvent {
        sequence: sequence as u64,
        event_id: row.get(1)?,
        operation: row.get(2)?,
        payload: row.get(3)?,
        prev_hash: row.get(4)?,
        this_hash: row.get(5)?,
        created_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(sequence: u64, hash: &str) -> AuditEvent {
        AuditEvent {
            sequence,
            event_id: format!("evt-{}", sequence),
            operation: "check_interactions".into(),
            payload: "{}".into(),
            prev_hash: "genesis".into(),
            this_hash: hash.into(),
            created_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn test_insert_and_list() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.last_audit_event().unwrap().is_none());

        db.insert_audit_event(&event(0, "h0")).unwrap();
        db.insert_audit_event(&event(1, "h1")).unwrap();

        let events = db.list_audit_events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, 0);
        assert_eq!(db.last_audit_event().unwrap().unwrap().this_hash, "h1");
    }

    #[test]
    fn test_duplicate_sequence_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_audit_event(&event(0, "h0")).unwrap();
        assert!(db.insert_audit_event(&event(0, "h0b")).is_err());
    }
}
