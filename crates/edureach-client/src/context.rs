//! The object graph of a running client, built once at startup.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;

use edureach_cache::{CacheStorage, CacheWorker, HttpFetcher};
use edureach_net::{
    is_reachable, spawn_connectivity_watcher, Estimator, FixedBandwidthHint, HttpProbe,
    HttpTransport, OfflineIndicator,
};
use edureach_store::{LocalStore, StoreOptions};

use crate::background::{BackgroundSync, DeferredRetry};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::remote::HttpRemote;
use crate::sync::SyncOrchestrator;

/// Stand-in for the page's offline banner.
pub struct LogIndicator;

impl OfflineIndicator for LogIndicator {
    fn show(&self) {
        warn!("offline: working from local data");
    }

    fn hide(&self) {
        info!("connection restored");
    }
}

pub struct AppContext {
    pub config: ClientConfig,
    pub store: Arc<LocalStore>,
    pub estimator: Arc<Estimator>,
    pub cache: Arc<CacheWorker>,
    pub sync: SyncOrchestrator,
    pub background: Arc<BackgroundSync>,
}

impl AppContext {
    /// Wire every component together. The store is not opened yet.
    pub async fn build(config: ClientConfig) -> Result<Self, ClientError> {
        let app_origin = Url::parse(&config.app_origin)
            .map_err(|e| ClientError::Config(format!("app origin {}: {e}", config.app_origin)))?;

        let transport = HttpTransport::new(config.request_timeout, config.retry_attempts)?;

        let store = Arc::new(LocalStore::at_path(
            config.database_path(),
            StoreOptions {
                quota_bytes: Some(config.storage_quota_bytes),
            },
        ));

        let probe = HttpProbe::new(transport.clone(), &config.api_base_url)?;
        let initially_online = is_reachable(&config.api_base_url).await;
        let mut estimator = Estimator::new(initially_online, Arc::new(probe))
            .with_indicator(Arc::new(LogIndicator));
        if let Some(mbps) = config.downlink_mbps {
            estimator = estimator.with_bandwidth_hint(Arc::new(FixedBandwidthHint(mbps)));
        }
        let estimator = Arc::new(estimator);

        let background = Arc::new(BackgroundSync::default());
        let remote = HttpRemote::new(transport.clone(), &config.api_base_url, store.clone());
        let deferred: Arc<dyn DeferredRetry> = background.clone();
        let sync = SyncOrchestrator::new(store.clone(), Arc::new(remote), Some(deferred));
        estimator.set_sync_trigger(Arc::new(sync.clone()));

        let storage = CacheStorage::open(config.cache_dir()).await?;
        let fetcher = HttpFetcher::new(transport, &app_origin);
        let cache = Arc::new(CacheWorker::new(
            config.cache_version.clone(),
            app_origin,
            storage,
            Arc::new(fetcher),
        ));

        info!(
            online = initially_online,
            api = %config.api_base_url,
            cache_version = %config.cache_version,
            "client context ready"
        );

        Ok(Self {
            config,
            store,
            estimator,
            cache,
            sync,
            background,
        })
    }

    /// Start the estimator's monitor loop and the reachability watcher that
    /// feeds it. Both stop when the returned handles are aborted.
    pub fn spawn_network_tasks(&self) -> (JoinHandle<()>, JoinHandle<()>) {
        let interval: Duration = self.config.quality_check_interval;
        let (tx, rx) = mpsc::channel(16);
        let monitor = Arc::clone(&self.estimator).spawn_monitor(rx, interval);
        let watcher = spawn_connectivity_watcher(
            self.config.api_base_url.clone(),
            self.estimator.is_online(),
            interval,
            tx,
        );
        (monitor, watcher)
    }
}
