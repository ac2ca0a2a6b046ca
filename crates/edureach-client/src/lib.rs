//! EduReach offline client: wires the local store, the network quality
//! estimator and the interception cache into one context, and owns the sync
//! orchestrator that drains queued actions when connectivity returns.

pub mod background;
pub mod config;
pub mod context;
pub mod error;
pub mod remote;
pub mod sync;

use tracing_subscriber::{fmt, EnvFilter};

pub use background::{BackgroundSync, DeferredRetry, DeferredTask, RetryPolicy};
pub use config::ClientConfig;
pub use context::AppContext;
pub use error::{ClientError, SyncError};
pub use remote::{HttpRemote, RemoteApi, TokenSource};
pub use sync::{DrainReport, SyncDomain, SyncOrchestrator};

/// Install the global tracing subscriber (respects `RUST_LOG`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "edureach_client=debug,edureach_net=info,edureach_store=info,edureach_cache=info,warn",
        )
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
