//! Sync orchestrator: drains the pending-action queue against the remote API.
//!
//! Each entry is attempted in the order the store returns it. A success marks
//! the entry synced; a failure is logged and left for the next trigger. One
//! failing entry never stops the others, and an ordinary drain reports counts
//! rather than failing.
//!
//! Deferred runs, scheduled through the retry facility under a domain tag,
//! are the exception: they fail when anything is left over so that the
//! facility retries them later.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use edureach_net::SyncTrigger;
use edureach_shared::constants::{SYNC_TAG_ATTENDANCE, SYNC_TAG_QUIZ_SUBMISSIONS};
use edureach_store::LocalStore;

use crate::background::{DeferredRetry, DeferredTask};
use crate::error::SyncError;
use crate::remote::RemoteApi;

/// Which queue entries a drain covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDomain {
    All,
    QuizSubmissions,
    Attendance,
}

impl SyncDomain {
    pub const DEFERRED: [SyncDomain; 2] = [SyncDomain::QuizSubmissions, SyncDomain::Attendance];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            SYNC_TAG_QUIZ_SUBMISSIONS => Some(SyncDomain::QuizSubmissions),
            SYNC_TAG_ATTENDANCE => Some(SyncDomain::Attendance),
            _ => None,
        }
    }

    pub fn tag(self) -> Option<&'static str> {
        match self {
            SyncDomain::All => None,
            SyncDomain::QuizSubmissions => Some(SYNC_TAG_QUIZ_SUBMISSIONS),
            SyncDomain::Attendance => Some(SYNC_TAG_ATTENDANCE),
        }
    }

    /// Does an action kind belong to this domain?
    pub fn covers(self, action: &str) -> bool {
        let action = action.to_ascii_lowercase();
        match self {
            SyncDomain::All => true,
            SyncDomain::QuizSubmissions => action.contains("quiz") || action.contains("submission"),
            SyncDomain::Attendance => action.contains("attendance"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
}

struct Inner {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteApi>,
    deferred: Option<Arc<dyn DeferredRetry>>,
}

/// Cheap to clone; clones share the same store and remote.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteApi>,
        deferred: Option<Arc<dyn DeferredRetry>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                deferred,
            }),
        }
    }

    /// Attempt every unsynced entry.
    pub async fn drain(&self) -> Result<DrainReport, SyncError> {
        self.drain_domain(SyncDomain::All).await
    }

    /// Attempt every unsynced entry of `domain`. Only reading the queue can
    /// fail; per-entry failures are counted in the report.
    pub async fn drain_domain(&self, domain: SyncDomain) -> Result<DrainReport, SyncError> {
        let mut report = DrainReport::default();
        let mut pending = Vec::new();
        for row in self.inner.store.open()?.scan_unsynced()? {
            match row {
                Ok(entry) if domain.covers(&entry.action) => pending.push(entry),
                Ok(_) => {}
                // Undecodable rows belong to no particular domain.
                Err(bad) if domain == SyncDomain::All => {
                    warn!(id = ?bad.id, error = %bad.error, "skipping undecodable pending action");
                    report.attempted += 1;
                    report.failed += 1;
                }
                Err(_) => {}
            }
        }

        if pending.is_empty() && report.attempted == 0 {
            debug!(?domain, "nothing to sync");
            return Ok(report);
        }
        info!(?domain, count = pending.len(), "syncing pending actions");

        for entry in pending {
            let Some(id) = entry.id else { continue };
            report.attempted += 1;

            let outcome = match self.inner.remote.submit(&entry.action, &entry.data).await {
                Ok(()) => self
                    .inner
                    .store
                    .open()
                    .and_then(|db| db.mark_synced(id))
                    .map_err(SyncError::from),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(_) => {
                    debug!(id, action = %entry.action, "pending action synced");
                    report.synced += 1;
                }
                Err(e) => {
                    warn!(id, action = %entry.action, error = %e, "failed to sync pending action");
                    report.failed += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            synced = report.synced,
            failed = report.failed,
            "sync pass finished"
        );
        Ok(report)
    }

    /// Drain for a deferred-retry tag. Leftover entries are an error so the
    /// retry facility backs off and tries again.
    pub async fn run_deferred(&self, tag: &str) -> Result<DrainReport, SyncError> {
        let domain = SyncDomain::from_tag(tag).ok_or_else(|| SyncError::UnknownTag(tag.to_string()))?;
        let report = self.drain_domain(domain).await?;
        if report.failed > 0 {
            return Err(SyncError::Incomplete {
                failed: report.failed,
                attempted: report.attempted,
            });
        }
        Ok(report)
    }

    /// Drain now, then hand both domain tags to the deferred-retry facility
    /// if there is one.
    pub async fn sync_now(&self) {
        match self.drain().await {
            Ok(_) => {}
            Err(e) => error!(error = %e, "sync failed"),
        }

        let Some(deferred) = &self.inner.deferred else {
            return;
        };
        for domain in SyncDomain::DEFERRED {
            if let Some(tag) = domain.tag() {
                deferred.register(tag, Arc::new(self.clone()));
            }
        }
    }
}

#[async_trait]
impl DeferredTask for SyncOrchestrator {
    async fn run(&self, tag: &str) -> Result<(), SyncError> {
        self.run_deferred(tag).await.map(|_| ())
    }
}

impl SyncTrigger for SyncOrchestrator {
    fn request_sync(&self) {
        let Ok(runtime) = Handle::try_current() else {
            error!("no async runtime; sync request dropped");
            return;
        };
        let this = self.clone();
        runtime.spawn(async move { this.sync_now().await });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::{json, Value};

    use edureach_net::NetworkFault;

    /// Fails every action kind listed in `failing`.
    #[derive(Default)]
    struct FakeRemote {
        failing: Mutex<HashSet<String>>,
        sent: Mutex<Vec<String>>,
    }

    impl FakeRemote {
        fn failing(actions: &[&str]) -> Arc<Self> {
            let remote = Self::default();
            remote
                .failing
                .lock()
                .unwrap()
                .extend(actions.iter().map(|a| a.to_string()));
            Arc::new(remote)
        }

        fn recover(&self) {
            self.failing.lock().unwrap().clear();
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteApi for FakeRemote {
        async fn submit(&self, action: &str, _payload: &Value) -> Result<(), SyncError> {
            self.sent.lock().unwrap().push(action.to_string());
            if self.failing.lock().unwrap().contains(action) {
                return Err(NetworkFault::Transport("connection reset".into()).into());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingRetry(Mutex<Vec<String>>);

    impl DeferredRetry for RecordingRetry {
        fn register(&self, tag: &str, _task: Arc<dyn DeferredTask>) -> bool {
            self.0.lock().unwrap().push(tag.to_string());
            true
        }
    }

    fn store_with(actions: &[&str]) -> Arc<LocalStore> {
        let store = Arc::new(LocalStore::in_memory());
        let db = store.open().unwrap();
        for (i, action) in actions.iter().enumerate() {
            db.enqueue(action, json!({ "n": i })).unwrap();
        }
        store
    }

    fn unsynced_actions(store: &LocalStore) -> Vec<String> {
        store
            .open()
            .unwrap()
            .list_unsynced()
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect()
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_rest() {
        let store = store_with(&["quiz/submit", "attendance/mark", "notes/save"]);
        let remote = FakeRemote::failing(&["attendance/mark"]);
        let sync = SyncOrchestrator::new(store.clone(), remote.clone(), None);

        let report = sync.drain().await.unwrap();
        assert_eq!(report, DrainReport { attempted: 3, synced: 2, failed: 1 });
        assert_eq!(remote.sent(), vec!["quiz/submit", "attendance/mark", "notes/save"]);
        assert_eq!(unsynced_actions(&store), vec!["attendance/mark"]);

        let all = store.open().unwrap().get_all_as::<edureach_store::QueueEntry>("offline_queue").unwrap();
        assert_eq!(all.iter().filter(|e| e.synced).count(), 2);

        // next trigger retries only what is left
        remote.recover();
        let report = sync.drain().await.unwrap();
        assert_eq!(report, DrainReport { attempted: 1, synced: 1, failed: 0 });
        assert!(unsynced_actions(&store).is_empty());
    }

    #[tokio::test]
    async fn deferred_run_raises_leftovers() {
        let store = store_with(&["quiz/submit", "attendance/mark"]);
        let remote = FakeRemote::failing(&["attendance/mark"]);
        let sync = SyncOrchestrator::new(store.clone(), remote.clone(), None);

        let err = sync.run_deferred(SYNC_TAG_ATTENDANCE).await.unwrap_err();
        assert!(matches!(err, SyncError::Incomplete { failed: 1, attempted: 1 }));

        let report = sync.run_deferred(SYNC_TAG_QUIZ_SUBMISSIONS).await.unwrap();
        assert_eq!(report.synced, 1);
        assert_eq!(unsynced_actions(&store), vec!["attendance/mark"]);

        assert!(matches!(
            sync.run_deferred("sync-everything").await,
            Err(SyncError::UnknownTag(_))
        ));
    }

    #[tokio::test]
    async fn malformed_row_is_skipped_not_fatal() {
        let store = store_with(&["quiz/submit", "attendance/mark"]);
        store
            .open()
            .unwrap()
            .insert("offline_queue", &json!({ "synced": false, "note": "legacy" }))
            .unwrap();
        let remote = FakeRemote::failing(&[]);
        let sync = SyncOrchestrator::new(store.clone(), remote.clone(), None);

        let report = sync.drain().await.unwrap();
        assert_eq!(report, DrainReport { attempted: 3, synced: 2, failed: 1 });
        assert_eq!(remote.sent(), vec!["quiz/submit", "attendance/mark"]);
        assert!(unsynced_actions(&store).is_empty());

        // domain drains are not held back by the bad row either
        store.open().unwrap().enqueue("attendance/mark", json!({})).unwrap();
        let report = sync.run_deferred(SYNC_TAG_ATTENDANCE).await.unwrap();
        assert_eq!(report, DrainReport { attempted: 1, synced: 1, failed: 0 });
    }

    struct QuickProbe;

    #[async_trait]
    impl edureach_net::LatencyProbe for QuickProbe {
        async fn probe(&self) -> Result<Duration, NetworkFault> {
            Ok(Duration::from_millis(40))
        }
    }

    #[tokio::test]
    async fn reconnect_drains_queue_through_the_estimator() {
        use edureach_net::{ConnectivityEvent, Estimator};

        let store = Arc::new(LocalStore::in_memory());
        let remote = FakeRemote::failing(&["attendance/mark"]);
        let sync = SyncOrchestrator::new(store.clone(), remote.clone(), None);
        let estimator = Estimator::new(false, Arc::new(QuickProbe));
        estimator.set_sync_trigger(Arc::new(sync.clone()));

        // queued while offline; nothing is sent
        let db = store.open().unwrap();
        for action in ["quiz/submit", "attendance/mark", "notes/save"] {
            db.enqueue(action, json!({})).unwrap();
        }
        assert!(!estimator.is_online());
        assert!(remote.sent().is_empty());

        estimator.handle_event(ConnectivityEvent::WentOnline).await;
        assert!(estimator.is_online());

        for _ in 0..100 {
            if remote.sent().len() == 3 && unsynced_actions(&store).len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(remote.sent().len(), 3);
        let all = db.get_all_as::<edureach_store::QueueEntry>("offline_queue").unwrap();
        assert_eq!(all.iter().filter(|e| e.synced).count(), 2);
        assert_eq!(unsynced_actions(&store), vec!["attendance/mark"]);
    }

    #[test]
    fn domains_cover_their_action_kinds() {
        assert!(SyncDomain::QuizSubmissions.covers("quiz/submit"));
        assert!(SyncDomain::QuizSubmissions.covers("submissions/create"));
        assert!(!SyncDomain::QuizSubmissions.covers("attendance/mark"));
        assert!(SyncDomain::Attendance.covers("Attendance/Mark"));
        assert!(SyncDomain::All.covers("notes/save"));
        assert_eq!(SyncDomain::from_tag("sync-attendance"), Some(SyncDomain::Attendance));
    }

    #[tokio::test]
    async fn sync_now_registers_both_tags() {
        let store = store_with(&["quiz/submit"]);
        let retry = Arc::new(RecordingRetry::default());
        let sync = SyncOrchestrator::new(store.clone(), FakeRemote::failing(&[]), Some(retry.clone() as Arc<dyn DeferredRetry>));

        sync.sync_now().await;

        assert!(unsynced_actions(&store).is_empty());
        assert_eq!(
            *retry.0.lock().unwrap(),
            vec![SYNC_TAG_QUIZ_SUBMISSIONS, SYNC_TAG_ATTENDANCE]
        );
    }

    #[tokio::test]
    async fn request_sync_drains_in_the_background() {
        let store = store_with(&["quiz/submit", "notes/save"]);
        let sync = SyncOrchestrator::new(store.clone(), FakeRemote::failing(&[]), None);

        sync.request_sync();

        for _ in 0..100 {
            if unsynced_actions(&store).is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("queue was not drained");
    }
}
