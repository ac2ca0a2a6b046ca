//! Generic CRUD over collections of JSON records.
//!
//! A record is a JSON object. Its `id` field is the primary key: stored in the
//! `id` column, stripped from the stored document, and put back on read.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use edureach_shared::DecodeFault;

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Auto-assigned, store-scoped record identifier.
pub type RecordId = i64;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a record, assigning a fresh id unless the record carries one.
    ///
    /// Inserting an id that already exists is an error; use [`update`] to
    /// overwrite.
    ///
    /// [`update`]: Database::update
    pub fn insert(&self, collection: &str, record: &Value) -> Result<RecordId> {
        let table = self.catalog().collection(collection)?;
        let (id, body) = split_record(record)?;
        let conn = self.conn();

        let id = match id {
            Some(id) => {
                conn.execute(
                    &format!("INSERT INTO {table} (id, data) VALUES (?1, ?2)"),
                    params![id, body],
                )?;
                id
            }
            None => {
                conn.execute(
                    &format!("INSERT INTO {table} (data) VALUES (?1)"),
                    params![body],
                )?;
                conn.last_insert_rowid()
            }
        };

        tracing::debug!(collection = table, id, "record inserted");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single record. Absence is `Ok(None)`.
    pub fn get_by_id(&self, collection: &str, id: RecordId) -> Result<Option<Value>> {
        let table = self.catalog().collection(collection)?;
        let row = self
            .conn()
            .query_row(
                &format!("SELECT id, data FROM {table} WHERE id = ?1"),
                params![id],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        row.map(|(id, data)| join_record(id, &data)).transpose()
    }

    /// Every record in the collection.
    pub fn get_all(&self, collection: &str) -> Result<Vec<Value>> {
        let table = self.catalog().collection(collection)?;
        self.select(&format!("SELECT id, data FROM {table} ORDER BY id"), Vec::new())
    }

    /// All records whose indexed field equals `value`.
    pub fn query_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &Value,
    ) -> Result<Vec<Value>> {
        let table = self.catalog().collection(collection)?;
        let expr = self.catalog().index(table, index)?.expr();

        match index_key(value) {
            Some(key) => self.select(
                &format!("SELECT id, data FROM {table} WHERE {expr} = ?1 ORDER BY id"),
                vec![key],
            ),
            None => self.select(
                &format!("SELECT id, data FROM {table} WHERE {expr} IS NULL ORDER BY id"),
                Vec::new(),
            ),
        }
    }

    /// Number of records in the collection.
    pub fn count(&self, collection: &str) -> Result<u64> {
        let table = self.catalog().collection(collection)?;
        let n: i64 = self
            .conn()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as u64)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Upsert by id. A record without an id is inserted with a fresh one.
    pub fn update(&self, collection: &str, record: &Value) -> Result<RecordId> {
        let table = self.catalog().collection(collection)?;
        let (id, body) = split_record(record)?;
        let Some(id) = id else {
            return self.insert(table, record);
        };

        self.conn().execute(
            &format!(
                "INSERT INTO {table} (id, data) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data"
            ),
            params![id, body],
        )?;

        tracing::debug!(collection = table, id, "record updated");
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a record. Deleting a missing id succeeds; returns whether a row
    /// was removed.
    pub fn delete_by_id(&self, collection: &str, id: RecordId) -> Result<bool> {
        let table = self.catalog().collection(collection)?;
        let affected = self
            .conn()
            .execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
        Ok(affected > 0)
    }

    /// Remove every record from the collection.
    pub fn clear(&self, collection: &str) -> Result<()> {
        let table = self.catalog().collection(collection)?;
        let removed = self.conn().execute(&format!("DELETE FROM {table}"), [])?;
        tracing::info!(collection = table, removed, "collection cleared");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Typed helpers
    // ------------------------------------------------------------------

    pub fn insert_as<T: Serialize>(&self, collection: &str, record: &T) -> Result<RecordId> {
        self.insert(collection, &to_value(record)?)
    }

    pub fn update_as<T: Serialize>(&self, collection: &str, record: &T) -> Result<RecordId> {
        self.update(collection, &to_value(record)?)
    }

    pub fn get_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: RecordId,
    ) -> Result<Option<T>> {
        self.get_by_id(collection, id)?
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .transpose()
    }

    pub fn get_all_as<T: DeserializeOwned>(&self, collection: &str) -> Result<Vec<T>> {
        from_values(self.get_all(collection)?)
    }

    pub fn query_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        index: &str,
        value: &Value,
    ) -> Result<Vec<T>> {
        from_values(self.query_by_index(collection, index, value)?)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn select(&self, sql: &str, args: Vec<SqlValue>) -> Result<Vec<Value>> {
        let rows: Vec<(i64, String)> = {
            let conn = self.conn();
            let mut stmt = conn.prepare(sql)?;
            let mapped = stmt.query_map(params_from_iter(args), |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            let rows = mapped.collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        rows.iter()
            .map(|(id, data)| join_record(*id, data))
            .collect()
    }
}

/// Separate the primary key from the document body.
fn split_record(record: &Value) -> Result<(Option<RecordId>, String)> {
    let Value::Object(map) = record else {
        return Err(StoreError::InvalidRecord(
            "record must be a JSON object".to_string(),
        ));
    };

    let id = match map.get("id") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_i64().ok_or_else(|| {
            StoreError::InvalidRecord(format!("id must be an integer, got {v}"))
        })?),
    };

    let mut body = map.clone();
    body.remove("id");
    Ok((id, Value::Object(body).to_string()))
}

fn join_record(id: RecordId, data: &str) -> Result<Value> {
    let mut map: Map<String, Value> = serde_json::from_str(data).map_err(DecodeFault::Json)?;
    map.insert("id".to_string(), Value::from(id));
    Ok(Value::Object(map))
}

/// SQL value comparable with `json_extract` output. `None` means JSON null.
fn index_key(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        }),
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Some(SqlValue::Text(value.to_string())),
    }
}

fn to_value<T: Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| StoreError::InvalidRecord(e.to_string()))
}

fn from_values<T: DeserializeOwned>(values: Vec<Value>) -> Result<Vec<T>> {
    values
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(StoreError::from))
        .collect()
}
