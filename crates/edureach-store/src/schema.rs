//! Schema vocabulary shared by the migration list and the runtime catalog.
//!
//! A migration is a list of [`Step`]s. There is deliberately no step that
//! drops or alters anything: schema evolution is additive only.

use std::collections::BTreeMap;

use crate::error::{Result, StoreError};

/// One additive schema change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Create a record collection keyed by an auto-incrementing id.
    Collection(&'static str),
    /// Create a non-unique secondary index over a JSON field.
    Index {
        collection: &'static str,
        name: &'static str,
        key_path: &'static str,
    },
    /// Create the key/value table backing local settings and the session token.
    KeyValue,
}

impl Step {
    /// SQL for this step. Every statement is `IF NOT EXISTS`, so re-running a
    /// step is harmless.
    pub fn sql(&self) -> String {
        match self {
            Step::Collection(name) => format!(
                "CREATE TABLE IF NOT EXISTS {name} (
                    id   INTEGER PRIMARY KEY AUTOINCREMENT,
                    data TEXT NOT NULL              -- JSON object, without the id
                );"
            ),
            Step::Index {
                collection,
                name,
                key_path,
            } => format!(
                "CREATE INDEX IF NOT EXISTS {} ON {collection}({});",
                index_table_name(collection, name),
                key_expr(key_path)
            ),
            Step::KeyValue => "CREATE TABLE IF NOT EXISTS local_storage (
                    key   TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL
                );"
            .to_string(),
        }
    }
}

/// Declared secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub key_path: &'static str,
}

impl IndexSpec {
    pub fn expr(&self) -> String {
        key_expr(self.key_path)
    }
}

/// The collections and indexes that exist once every migration has run.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    collections: BTreeMap<&'static str, Vec<IndexSpec>>,
}

impl Catalog {
    pub fn from_steps<'a>(steps: impl IntoIterator<Item = &'a Step>) -> Self {
        let mut catalog = Self::default();
        for step in steps {
            match *step {
                Step::Collection(name) => {
                    catalog.collections.entry(name).or_default();
                }
                Step::Index {
                    collection,
                    name,
                    key_path,
                } => {
                    let indexes = catalog.collections.entry(collection).or_default();
                    if !indexes.iter().any(|i| i.name == name) {
                        indexes.push(IndexSpec { name, key_path });
                    }
                }
                Step::KeyValue => {}
            }
        }
        catalog
    }

    /// Resolve a caller-supplied collection name to its canonical table name.
    ///
    /// Only catalog names ever reach SQL text.
    pub fn collection(&self, name: &str) -> Result<&'static str> {
        self.collections
            .get_key_value(name)
            .map(|(k, _)| *k)
            .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
    }

    pub fn index(&self, collection: &str, index: &str) -> Result<&IndexSpec> {
        let indexes = self
            .collections
            .get(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        indexes
            .iter()
            .find(|i| i.name == index)
            .ok_or_else(|| StoreError::UnknownIndex {
                collection: collection.to_string(),
                index: index.to_string(),
            })
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.collections.keys().copied()
    }

    pub fn indexes(&self, collection: &str) -> &[IndexSpec] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub(crate) fn index_table_name(collection: &str, index: &str) -> String {
    format!("idx_{collection}_{index}")
}

fn key_expr(key_path: &str) -> String {
    format!("json_extract(data, '$.{key_path}')")
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS: &[Step] = &[
        Step::Collection("notes"),
        Step::Index {
            collection: "notes",
            name: "courseId",
            key_path: "courseId",
        },
        Step::Index {
            collection: "notes",
            name: "courseId",
            key_path: "courseId",
        },
    ];

    #[test]
    fn catalog_dedups_indexes() {
        let catalog = Catalog::from_steps(STEPS);
        assert_eq!(catalog.indexes("notes").len(), 1);
        assert_eq!(catalog.collection("notes").unwrap(), "notes");
    }

    #[test]
    fn unknown_names_are_rejected() {
        let catalog = Catalog::from_steps(STEPS);
        assert!(matches!(
            catalog.collection("notes; DROP TABLE notes"),
            Err(StoreError::UnknownCollection(_))
        ));
        assert!(matches!(
            catalog.index("notes", "title"),
            Err(StoreError::UnknownIndex { .. })
        ));
    }

    #[test]
    fn index_sql_uses_json_expression() {
        let sql = STEPS[1].sql();
        assert!(sql.contains("idx_notes_courseId"));
        assert!(sql.contains("json_extract(data, '$.courseId')"));
    }
}
