use thiserror::Error;

use edureach_cache::CacheError;
use edureach_net::NetworkFault;
use edureach_shared::DecodeFault;
use edureach_store::StoreError;

/// A sync attempt could not complete.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Network(#[from] NetworkFault),

    #[error("Session token rejected: {0}")]
    Token(#[from] DecodeFault),

    #[error("Session token expired")]
    TokenExpired,

    #[error("Unknown sync tag: {0}")]
    UnknownTag(String),

    /// Some entries are still pending after a drain.
    #[error("{failed} of {attempted} pending actions failed to sync")]
    Incomplete { failed: usize, attempted: usize },
}

/// Failures while assembling the client.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Network(#[from] NetworkFault),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
