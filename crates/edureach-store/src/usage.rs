use serde::Serialize;

use crate::database::Database;

/// Storage usage against the configured quota.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum StorageEstimate {
    #[serde(rename_all = "camelCase")]
    Available {
        usage: u64,
        quota: u64,
        percent_used: f64,
    },
    /// The medium cannot tell (in-memory store, no quota, or the query failed).
    Unavailable,
}

impl Database {
    /// Report used bytes against the quota. Never fails.
    pub fn estimate_usage(&self) -> StorageEstimate {
        let Some(quota) = self.quota_bytes().filter(|q| *q > 0) else {
            return StorageEstimate::Unavailable;
        };
        if self.path().is_none() {
            return StorageEstimate::Unavailable;
        }

        let usage = {
            let conn = self.conn();
            let pages = conn.pragma_query_value(None, "page_count", |row| row.get::<_, i64>(0));
            let size = conn.pragma_query_value(None, "page_size", |row| row.get::<_, i64>(0));
            match (pages, size) {
                (Ok(pages), Ok(size)) => (pages.max(0) * size.max(0)) as u64,
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!(error = %e, "storage estimate unavailable");
                    return StorageEstimate::Unavailable;
                }
            }
        };

        let percent_used = (usage as f64 / quota as f64 * 10_000.0).round() / 100.0;
        StorageEstimate::Available {
            usage,
            quota,
            percent_used,
        }
    }
}
