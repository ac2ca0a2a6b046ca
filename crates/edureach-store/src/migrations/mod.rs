//! Database migration runner.
//!
//! Migrations are an ordered list tagged with monotonically increasing
//! versions. [`run_migrations`] reads `PRAGMA user_version`, applies every
//! newer migration inside its own transaction and bumps the pragma, so each
//! migration runs exactly once. Steps are `IF NOT EXISTS` only, so a step
//! replayed against a schema that already has it changes nothing.

pub mod v001_initial;
pub mod v002_queue_synced_index;
pub mod v003_local_storage;

use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::schema::{Catalog, Step};

/// A version-tagged group of additive schema steps.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub steps: &'static [Step],
}

/// Every migration, in application order. Append only.
pub const MIGRATIONS: &[Migration] = &[
    v001_initial::MIGRATION,
    v002_queue_synced_index::MIGRATION,
    v003_local_storage::MIGRATION,
];

/// Schema version reached after all migrations have run.
pub fn current_version() -> u32 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// The catalog described by the full migration list.
pub fn catalog() -> Catalog {
    Catalog::from_steps(MIGRATIONS.iter().flat_map(|m| m.steps.iter()))
}

/// Run all pending migrations against the open connection.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    run(conn, MIGRATIONS)
}

fn run(conn: &mut Connection, migrations: &[Migration]) -> Result<()> {
    let mut previous = 0;
    for migration in migrations {
        if migration.version <= previous {
            return Err(StoreError::Migration(format!(
                "{} is out of order (version {} after {})",
                migration.name, migration.version, previous
            )));
        }
        previous = migration.version;
    }

    let current: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    let target = migrations.last().map(|m| m.version).unwrap_or(0);

    tracing::info!(
        current_version = current,
        target_version = target,
        "checking database migrations"
    );

    if current > target {
        tracing::warn!(
            current_version = current,
            "database schema is newer than this build; leaving it untouched"
        );
        return Ok(());
    }

    for migration in migrations.iter().filter(|m| m.version > current) {
        tracing::info!(migration = migration.name, "applying migration");
        let tx = conn.transaction()?;
        for step in migration.steps {
            tx.execute_batch(&step.sql())
                .map_err(|e| StoreError::Migration(format!("{}: {e}", migration.name)))?;
        }
        tx.pragma_update(None, "user_version", migration.version)?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_version(conn: &Connection) -> u32 {
        conn.pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn applies_all_and_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        assert_eq!(user_version(&conn), current_version());

        run_migrations(&mut conn).unwrap();
        assert_eq!(user_version(&conn), current_version());
    }

    #[test]
    fn upgrade_from_v1_keeps_existing_data() {
        let mut conn = Connection::open_in_memory().unwrap();
        run(&mut conn, &MIGRATIONS[..1]).unwrap();
        conn.execute(
            "INSERT INTO offline_queue (data) VALUES ('{\"synced\":false}')",
            [],
        )
        .unwrap();

        run_migrations(&mut conn).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM offline_queue", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        let idx: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'index' AND name = 'idx_offline_queue_synced'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(idx, 1);
    }

    #[test]
    fn out_of_order_list_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        let bad = [MIGRATIONS[1], MIGRATIONS[0]];
        assert!(matches!(
            run(&mut conn, &bad),
            Err(StoreError::Migration(_))
        ));
    }

    #[test]
    fn catalog_covers_persisted_layout() {
        let catalog = catalog();
        let names: Vec<_> = catalog.collection_names().collect();
        for expected in [
            "users",
            "courses",
            "quizzes",
            "submissions",
            "notes",
            "videos",
            "offline_queue",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert!(catalog.index("offline_queue", "synced").is_ok());
        assert!(catalog.index("quizzes", "isOffline").is_ok());
    }
}
