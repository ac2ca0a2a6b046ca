//! # edureach-agent
//!
//! Headless EduReach offline client. It keeps the local store open, installs
//! and activates the static asset cache, watches connectivity and link
//! quality, and drains queued actions whenever the API becomes reachable.

use tracing::{info, warn};

use edureach_client::{init_tracing, AppContext, ClientConfig};
use edureach_net::SyncTrigger;
use edureach_shared::constants::{APP_NAME, STATIC_MANIFEST};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Tracing and configuration
    // -----------------------------------------------------------------------
    init_tracing();
    info!("Starting {APP_NAME} offline agent v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 2. Context and store
    // -----------------------------------------------------------------------
    let ctx = AppContext::build(config).await?;
    let db = ctx.store.open()?;
    info!(usage = ?db.estimate_usage(), pending = db.list_unsynced()?.len(), "Local store open");
    match db.session_user() {
        Ok(Some(user)) => info!(user = %user.name, role = %user.role, "Session restored"),
        Ok(None) => info!("No saved session; queued actions sync without credentials"),
        Err(e) => warn!(error = %e, "Saved session user is unreadable"),
    }

    // -----------------------------------------------------------------------
    // 3. Cache generation: install, then take over right away since no
    //    older agent is serving clients
    // -----------------------------------------------------------------------
    let report = ctx.cache.install(STATIC_MANIFEST).await?;
    if !report.failed.is_empty() {
        warn!(failed = report.failed.len(), "Some static assets were not cached");
    }
    ctx.cache.release_clients().await?;

    // -----------------------------------------------------------------------
    // 4. Network monitoring
    // -----------------------------------------------------------------------
    ctx.estimator.subscribe(|status| {
        let preset = status.recommended_preset();
        info!(
            online = status.is_online,
            quality = %status.quality,
            width = preset.width,
            height = preset.height,
            bitrate_kbps = preset.bitrate_kbps,
            "Network status"
        );
        Ok(())
    });
    let (monitor, watcher) = ctx.spawn_network_tasks();

    // Flush whatever a previous run left behind.
    if ctx.estimator.is_online() {
        ctx.sync.request_sync();
    }

    info!("Agent running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    // -----------------------------------------------------------------------
    // 5. Shutdown
    // -----------------------------------------------------------------------
    info!("Shutting down");
    watcher.abort();
    monitor.abort();
    drop(db);
    ctx.store.close();

    Ok(())
}
