use edureach_shared::DecodeFault;
use thiserror::Error;

/// Errors produced by the store layer.
///
/// Absence of a record is not an error; lookups return `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// The write would grow the database past its configured quota.
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// The collection is not part of the schema.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// The collection has no index with this name.
    #[error("Unknown index '{index}' on collection '{collection}'")]
    UnknownIndex { collection: String, index: String },

    /// The record is not a JSON object or carries an unusable `id`.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A stored document could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeFault),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref err, _)
                if err.code == rusqlite::ErrorCode::DiskFull =>
            {
                StoreError::QuotaExceeded
            }
            other => StoreError::Sqlite(other),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(DecodeFault::Json(e))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
