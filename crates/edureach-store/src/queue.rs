//! Pending-action queue on top of the `offline_queue` collection.
//!
//! Entries are only ever flipped to synced, never removed automatically.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde_json::{json, Map, Value};

use edureach_shared::constants::STORE_OFFLINE_QUEUE;

use crate::database::Database;
use crate::error::Result;
use crate::models::QueueEntry;
use crate::records::RecordId;

/// An `offline_queue` row that is not a valid [`QueueEntry`], e.g. one written
/// through the generic collection API or by another schema version.
#[derive(Debug)]
pub struct UndecodableEntry {
    pub id: Option<RecordId>,
    pub error: serde_json::Error,
}

impl Database {
    /// Record an action for later delivery. Returns the entry id.
    pub fn enqueue(&self, action: &str, payload: Value) -> Result<RecordId> {
        let entry = QueueEntry {
            id: None,
            action: action.to_string(),
            data: payload,
            timestamp: Utc::now().timestamp_millis(),
            synced: false,
            synced_at: None,
        };
        let id = self.insert_as(STORE_OFFLINE_QUEUE, &entry)?;
        tracing::info!(id, action, "action queued for sync");
        Ok(id)
    }

    /// Entries still waiting for a remote acknowledgment, oldest first.
    /// Rows that do not decode as a [`QueueEntry`] are logged and left out.
    pub fn list_unsynced(&self) -> Result<Vec<QueueEntry>> {
        Ok(self
            .scan_unsynced()?
            .into_iter()
            .filter_map(|row| match row {
                Ok(entry) => Some(entry),
                Err(bad) => {
                    tracing::warn!(id = ?bad.id, error = %bad.error, "skipping undecodable queue entry");
                    None
                }
            })
            .collect())
    }

    /// Unsynced rows, each decoded on its own so one malformed row cannot
    /// hide the others.
    pub fn scan_unsynced(&self) -> Result<Vec<std::result::Result<QueueEntry, UndecodableEntry>>> {
        let rows = self.query_by_index(STORE_OFFLINE_QUEUE, "synced", &json!(false))?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.get("id").and_then(Value::as_i64);
                serde_json::from_value(row).map_err(|error| UndecodableEntry { id, error })
            })
            .collect())
    }

    pub fn get_queue_entry(&self, id: RecordId) -> Result<Option<QueueEntry>> {
        self.get_as(STORE_OFFLINE_QUEUE, id)
    }

    /// Flag an entry as delivered. A missing entry is a no-op (`Ok(false)`);
    /// marking twice keeps the first `syncedAt`.
    pub fn mark_synced(&self, id: RecordId) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let data: Option<String> = tx
            .query_row(
                "SELECT data FROM offline_queue WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(data) = data else {
            tracing::debug!(id, "queue entry vanished before it could be marked synced");
            return Ok(false);
        };

        let mut doc: Map<String, Value> = serde_json::from_str(&data)?;
        if doc.get("synced") != Some(&Value::Bool(true)) {
            doc.insert("synced".to_string(), Value::Bool(true));
            doc.insert(
                "syncedAt".to_string(),
                Value::from(Utc::now().timestamp_millis()),
            );
            tx.execute(
                "UPDATE offline_queue SET data = ?1 WHERE id = ?2",
                params![Value::Object(doc).to_string(), id],
            )?;
        }
        tx.commit()?;

        tracing::debug!(id, "queue entry marked synced");
        Ok(true)
    }

    /// Explicitly drop an entry from the audit trail.
    pub fn delete_queue_entry(&self, id: RecordId) -> Result<bool> {
        self.delete_by_id(STORE_OFFLINE_QUEUE, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn enqueued_entries_are_unsynced_until_marked() {
        let db = db();
        let a = db.enqueue("quiz/submit", json!({"quizId": 1})).unwrap();
        let b = db.enqueue("attendance/mark", json!({"classId": 9})).unwrap();

        let pending: Vec<_> = db.list_unsynced().unwrap().iter().filter_map(|e| e.id).collect();
        assert_eq!(pending, vec![a, b]);

        assert!(db.mark_synced(a).unwrap());
        let pending: Vec<_> = db.list_unsynced().unwrap().iter().filter_map(|e| e.id).collect();
        assert_eq!(pending, vec![b]);
    }

    #[test]
    fn mark_synced_is_idempotent() {
        let db = db();
        let id = db.enqueue("notes/save", json!({"title": "t"})).unwrap();
        db.mark_synced(id).unwrap();
        let first = db.get_queue_entry(id).unwrap().unwrap();

        db.mark_synced(id).unwrap();
        let second = db.get_queue_entry(id).unwrap().unwrap();

        assert!(second.synced);
        assert_eq!(second.id, Some(id));
        assert_eq!(first.synced_at, second.synced_at);
        assert_eq!(db.count(STORE_OFFLINE_QUEUE).unwrap(), 1);
    }

    #[test]
    fn mark_synced_missing_is_noop() {
        let db = db();
        assert!(!db.mark_synced(404).unwrap());
        assert_eq!(db.count(STORE_OFFLINE_QUEUE).unwrap(), 0);
    }

    #[test]
    fn synced_entries_are_retained() {
        let db = db();
        let id = db.enqueue("quiz/submit", json!({})).unwrap();
        db.mark_synced(id).unwrap();

        let entry = db.get_queue_entry(id).unwrap().unwrap();
        assert!(entry.synced);
        assert!(entry.synced_at.is_some());
        assert_eq!(entry.action, "quiz/submit");

        assert!(db.delete_queue_entry(id).unwrap());
        assert!(db.get_queue_entry(id).unwrap().is_none());
    }

    #[test]
    fn malformed_rows_do_not_hide_valid_entries() {
        let db = db();
        let a = db.enqueue("quiz/submit", json!({"quizId": 1})).unwrap();
        let legacy = db
            .insert(STORE_OFFLINE_QUEUE, &json!({"synced": false, "note": "legacy"}))
            .unwrap();
        let b = db.enqueue("attendance/mark", json!({"classId": 9})).unwrap();

        let scan = db.scan_unsynced().unwrap();
        assert_eq!(scan.len(), 3);
        let bad: Vec<_> = scan.iter().filter_map(|r| r.as_ref().err()).collect();
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].id, Some(legacy));

        let pending: Vec<_> = db.list_unsynced().unwrap().iter().filter_map(|e| e.id).collect();
        assert_eq!(pending, vec![a, b]);
    }
}
