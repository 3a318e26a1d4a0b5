//! Audit event storage and retrieval.
//!
//! Events track every write to the local store: baseline commits, tombstone
//! changes, pending confirmations. `marksync status --json` surfaces them.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BaselineSaved,
    TombstonesRecorded,
    TombstonesPruned,
    TombstonesCleared,
    PendingStored,
    PendingCleared,
    StatusUpdated,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BaselineSaved => "baseline_saved",
            Self::TombstonesRecorded => "tombstones_recorded",
            Self::TombstonesPruned => "tombstones_pruned",
            Self::TombstonesCleared => "tombstones_cleared",
            Self::PendingStored => "pending_stored",
            Self::PendingCleared => "pending_cleared",
            Self::StatusUpdated => "status_updated",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "baseline_saved" => Self::BaselineSaved,
            "tombstones_recorded" => Self::TombstonesRecorded,
            "tombstones_pruned" => Self::TombstonesPruned,
            "tombstones_cleared" => Self::TombstonesCleared,
            "pending_stored" => Self::PendingStored,
            "pending_cleared" => Self::PendingCleared,
            "status_updated" => Self::StatusUpdated,
            _ => return None,
        })
    }
}

/// An audit event record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    pub actor: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            comment: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add a comment to the event.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, actor, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.comment,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent events, newest first. Unknown event types are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn recent_events(conn: &Connection, limit: u32) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, comment, created_at
         FROM events
         ORDER BY created_at DESC, id DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit], |row| {
        let event_type: String = row.get(3)?;
        let Some(event_type) = EventType::parse(&event_type) else {
            return Ok(None);
        };
        Ok(Some(Event {
            id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            event_type,
            actor: row.get(4)?,
            comment: row.get(5)?,
            created_at: row.get(6)?,
        }))
    })?;

    let mut events = Vec::new();
    for row in rows {
        if let Some(event) = row? {
            events.push(event);
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    #[test]
    fn test_event_insert_and_recent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let event = Event::new("kv", "baseline", EventType::BaselineSaved, "sync")
            .with_comment("12 records");
        let id = insert_event(&conn, &event).unwrap();
        assert!(id > 0);

        let events = recent_events(&conn, 10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::BaselineSaved);
        assert_eq!(events[0].comment.as_deref(), Some("12 records"));
    }

    #[test]
    fn test_unknown_event_types_are_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO events (entity_type, entity_id, event_type, actor, created_at)
             VALUES ('kv', 'x', 'something_else', 'cli', 1)",
            [],
        )
        .unwrap();
        assert!(recent_events(&conn, 10).unwrap().is_empty());
    }
}
