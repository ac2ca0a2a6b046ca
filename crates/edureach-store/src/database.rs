//! Database connection management.
//!
//! [`Database`] owns the SQLite connection and guarantees that migrations have
//! run before any other operation. [`LocalStore`] is the explicit lifecycle
//! handle the client context holds: `open()` hands out the same live
//! connection until `close()` is called.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use directories::ProjectDirs;
use edureach_shared::constants::{DB_NAME, MAX_STORAGE_BYTES};
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;
use crate::schema::Catalog;

/// Options applied when a database is opened.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound on the database size. Writes beyond it fail with
    /// [`StoreError::QuotaExceeded`]. `None` leaves the size unbounded.
    pub quota_bytes: Option<u64>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            quota_bytes: Some(MAX_STORAGE_BYTES),
        }
    }
}

/// Wrapper around a [`rusqlite::Connection`].
///
/// Every public operation takes the connection lock for the duration of one
/// statement or one short transaction, never across an await point.
pub struct Database {
    conn: Mutex<Connection>,
    catalog: Catalog,
    quota_bytes: Option<u64>,
}

impl Database {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/edureach/edureach_db.sqlite`
    /// - macOS:   `~/Library/Application Support/org.edureach.edureach/edureach_db.sqlite`
    /// - Windows: `{FOLDERID_RoamingAppData}\edureach\edureach\data\edureach_db.sqlite`
    pub fn new(options: StoreOptions) -> Result<Self> {
        Self::open_at(&default_path()?, options)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path, options: StoreOptions) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "opening database");

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn, options)
    }

    /// Open a private in-memory database. Nothing survives the handle.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(
            Connection::open_in_memory()?,
            StoreOptions { quota_bytes: None },
        )
    }

    fn from_connection(mut conn: Connection, options: StoreOptions) -> Result<Self> {
        migrations::run_migrations(&mut conn)?;

        // A zero quota means no quota rather than a store that can never grow.
        let quota_bytes = options.quota_bytes.filter(|q| *q > 0);
        if let Some(quota) = quota_bytes {
            let page_size: i64 = conn.pragma_query_value(None, "page_size", |row| row.get(0))?;
            let quota = i64::try_from(quota).unwrap_or(i64::MAX);
            let max_pages = (quota / page_size.max(1)).max(1);
            let applied: i64 =
                conn.pragma_update_and_check(None, "max_page_count", max_pages, |row| row.get(0))?;
            tracing::debug!(quota, max_pages = applied, "storage quota applied");
        }

        Ok(Self {
            conn: Mutex::new(conn),
            catalog: migrations::catalog(),
            quota_bytes,
        })
    }

    /// Lock the underlying connection.
    ///
    /// Callers should prefer the typed CRUD helpers; the guard must not be
    /// held across an await point.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn quota_bytes(&self) -> Option<u64> {
        self.quota_bytes
    }

    /// Return the filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        self.conn()
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

fn default_path() -> Result<PathBuf> {
    let project_dirs =
        ProjectDirs::from("org", "edureach", "edureach").ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().join(format!("{DB_NAME}.sqlite")))
}

// ---------------------------------------------------------------------------
// Lifecycle handle
// ---------------------------------------------------------------------------

/// Where a [`LocalStore`] keeps its data.
#[derive(Debug, Clone)]
pub enum StoreLocation {
    /// Platform data directory.
    Default,
    Path(PathBuf),
    Memory,
}

/// Explicitly opened/closed store shared by every component of the client.
pub struct LocalStore {
    location: StoreLocation,
    options: StoreOptions,
    live: Mutex<Option<Arc<Database>>>,
}

impl LocalStore {
    pub fn new(location: StoreLocation, options: StoreOptions) -> Self {
        Self {
            location,
            options,
            live: Mutex::new(None),
        }
    }

    pub fn at_path(path: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self::new(StoreLocation::Path(path.into()), options)
    }

    pub fn in_memory() -> Self {
        Self::new(StoreLocation::Memory, StoreOptions { quota_bytes: None })
    }

    /// Open the store, or return the live connection if it is already open.
    pub fn open(&self) -> Result<Arc<Database>> {
        let mut live = self.live.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = live.as_ref() {
            return Ok(Arc::clone(db));
        }

        let db = match &self.location {
            StoreLocation::Default => Database::new(self.options.clone())?,
            StoreLocation::Path(path) => Database::open_at(path, self.options.clone())?,
            StoreLocation::Memory => Database::open_in_memory()?,
        };
        let db = Arc::new(db);
        *live = Some(Arc::clone(&db));
        Ok(db)
    }

    pub fn is_open(&self) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop the store's reference to the connection. Outstanding `Arc`s keep
    /// it alive until they are dropped; the next `open()` reconnects.
    pub fn close(&self) {
        let previous = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if previous.is_some() {
            tracing::info!("local store closed");
        }
    }
}
