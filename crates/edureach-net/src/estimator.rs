//! Network quality estimator.
//!
//! Owns the current [`NetworkStatus`] and is its only writer. The status is
//! recomputed on every connectivity transition and, while online, on a fixed
//! interval. Every recomputation is pushed to subscribers.
//!
//! Detection prefers the platform bandwidth hint and falls back to an active
//! latency probe. A failed probe is reported as `VeryLow` with
//! `probe_failed` set.
//!
//! The monitor loop runs in its own tokio task and is driven by a channel of
//! [`ConnectivityEvent`]s plus a ticker, so the estimator itself never blocks
//! other work.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use edureach_shared::types::{NetworkStatus, QualityLevel, QualityPreset};

use crate::probe::{BandwidthHint, LatencyProbe};

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Platform connectivity transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    WentOnline,
    WentOffline,
}

/// UI hook for the offline banner.
pub trait OfflineIndicator: Send + Sync {
    fn show(&self);
    fn hide(&self);
}

/// Whoever drains the pending-action queue when connectivity returns.
///
/// Called synchronously from the transition; implementations are expected
/// to hand the work off (e.g. spawn a task) and return.
pub trait SyncTrigger: Send + Sync {
    fn request_sync(&self);
}

/// Handle returned by [`Estimator::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&NetworkStatus) -> anyhow::Result<()> + Send + Sync>;

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

pub struct Estimator {
    status: RwLock<NetworkStatus>,
    hint: Option<Arc<dyn BandwidthHint>>,
    probe: Arc<dyn LatencyProbe>,
    indicator: Option<Arc<dyn OfflineIndicator>>,
    sync: RwLock<Option<Arc<dyn SyncTrigger>>>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
}

impl Estimator {
    /// `initially_online` is the platform's connectivity signal at startup.
    pub fn new(initially_online: bool, probe: Arc<dyn LatencyProbe>) -> Self {
        Self {
            status: RwLock::new(NetworkStatus::initial(initially_online)),
            hint: None,
            probe,
            indicator: None,
            sync: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    pub fn with_bandwidth_hint(mut self, hint: Arc<dyn BandwidthHint>) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn with_indicator(mut self, indicator: Arc<dyn OfflineIndicator>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    /// Wire the sync orchestrator in after construction; it usually needs the
    /// estimator itself.
    pub fn set_sync_trigger(&self, trigger: Arc<dyn SyncTrigger>) {
        *self.sync.write().unwrap_or_else(PoisonError::into_inner) = Some(trigger);
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn status(&self) -> NetworkStatus {
        *self.status.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_online(&self) -> bool {
        self.status().is_online
    }

    pub fn quality(&self) -> QualityLevel {
        self.status().quality
    }

    /// Media preset for the current quality level.
    pub fn recommended_quality(&self) -> QualityPreset {
        self.quality().recommended_preset()
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    /// Register a callback invoked with every new snapshot. A callback that
    /// errors or panics is logged and stays registered.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&NetworkStatus) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    fn notify(&self) {
        let snapshot = self.status();
        // Deliver over a copy so callbacks may (un)subscribe without deadlocking.
        let subscribers: Vec<(SubscriptionId, Subscriber)> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, callback) in subscribers {
            match catch_unwind(AssertUnwindSafe(|| callback(&snapshot))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(subscription = id.0, error = %e, "network listener failed"),
                Err(_) => error!(subscription = id.0, "network listener panicked"),
            }
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    pub async fn handle_event(&self, event: ConnectivityEvent) {
        match event {
            ConnectivityEvent::WentOffline => self.went_offline(),
            ConnectivityEvent::WentOnline => self.came_online().await,
        }
    }

    pub fn went_offline(&self) {
        warn!("network: gone offline");
        self.replace_status(NetworkStatus {
            is_online: false,
            quality: QualityLevel::Offline,
            speed: 0.0,
            probe_failed: false,
        });
        if let Some(indicator) = &self.indicator {
            indicator.show();
        }
        self.notify();
    }

    /// Hide the banner, re-detect quality, kick off a sync, then notify.
    pub async fn came_online(&self) {
        info!("network: back online");
        {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            status.is_online = true;
            if status.quality == QualityLevel::Offline {
                status.quality = QualityLevel::Unknown;
            }
        }
        if let Some(indicator) = &self.indicator {
            indicator.hide();
        }

        self.detect_quality().await;

        let trigger = self.sync.read().unwrap_or_else(PoisonError::into_inner).clone();
        match trigger {
            Some(trigger) => trigger.request_sync(),
            None => debug!("no sync trigger wired; skipping sync"),
        }

        self.notify();
    }

    /// Recompute the quality level. Does nothing while offline.
    pub async fn detect_quality(&self) -> NetworkStatus {
        if !self.is_online() {
            return self.status();
        }

        let hinted = self.hint.as_ref().and_then(|h| h.downlink_mbps());
        let next = match hinted {
            Some(mbps) => {
                let quality = QualityLevel::from_downlink_mbps(mbps);
                info!(%quality, downlink_mbps = mbps, "network quality from bandwidth hint");
                NetworkStatus {
                    is_online: true,
                    quality,
                    speed: mbps,
                    probe_failed: false,
                }
            }
            None => match self.probe.probe().await {
                Ok(latency) => {
                    let ms = latency.as_secs_f64() * 1000.0;
                    let quality = QualityLevel::from_latency_ms(ms);
                    info!(%quality, latency_ms = ms as u64, "network quality from latency probe");
                    NetworkStatus {
                        is_online: true,
                        quality,
                        speed: 0.0,
                        probe_failed: false,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "latency probe failed; treating link as poor");
                    NetworkStatus {
                        is_online: true,
                        quality: QualityLevel::VeryLow,
                        speed: 0.0,
                        probe_failed: true,
                    }
                }
            },
        };

        {
            let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
            // The link may have dropped while the probe was in flight.
            if !status.is_online {
                debug!("went offline during detection; discarding result");
                return *status;
            }
            *status = next;
        }
        self.notify();
        next
    }

    fn replace_status(&self, next: NetworkStatus) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    // ------------------------------------------------------------------
    // Monitor loop
    // ------------------------------------------------------------------

    /// Spawn the monitor task: applies connectivity events as they arrive and
    /// re-detects quality every `interval` while online. The first tick fires
    /// immediately. Ends when the event channel closes.
    pub fn spawn_monitor(
        self: Arc<Self>,
        mut events: mpsc::Receiver<ConnectivityEvent>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "network monitor started");

            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => self.handle_event(event).await,
                        None => break,
                    },
                    _ = ticker.tick() => {
                        if self.is_online() {
                            self.detect_quality().await;
                        }
                    }
                }
            }

            info!("network monitor stopped");
        })
    }
}
