//! Deferred retry of named sync tasks.
//!
//! A registered tag runs on its own tokio task. A failed run is retried with
//! bounded exponential backoff; after the last attempt the tag is dropped
//! until someone registers it again. Registering a tag that is already
//! pending is a no-op.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::SyncError;

/// Work run for a tag. An `Err` asks for another attempt later.
#[async_trait]
pub trait DeferredTask: Send + Sync {
    async fn run(&self, tag: &str) -> Result<(), SyncError>;
}

/// A facility that guarantees a registered task eventually runs.
pub trait DeferredRetry: Send + Sync {
    /// Returns `false` when the tag was already pending.
    fn register(&self, tag: &str, task: Arc<dyn DeferredTask>) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(5),
            factor: 2,
            max_delay: Duration::from_secs(300),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Pause after the `failed_attempt`-th failure (1-based).
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1);
        let multiplier = self.factor.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

pub struct BackgroundSync {
    policy: RetryPolicy,
    pending: Arc<Mutex<HashSet<String>>>,
}

impl BackgroundSync {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn is_pending(&self, tag: &str) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(tag)
    }

    /// Schedule `task` for `tag`. `None` when coalesced with a pending run or
    /// when called outside a tokio runtime.
    pub fn schedule(&self, tag: &str, task: Arc<dyn DeferredTask>) -> Option<JoinHandle<()>> {
        let Ok(runtime) = Handle::try_current() else {
            error!(tag, "no async runtime; deferred sync not scheduled");
            return None;
        };

        if !self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.to_string())
        {
            info!(tag, "deferred sync already pending");
            return None;
        }

        let policy = self.policy;
        let pending = Arc::clone(&self.pending);
        let tag = tag.to_string();

        Some(runtime.spawn(async move {
            let mut attempt = 1;
            loop {
                match task.run(&tag).await {
                    Ok(()) => {
                        info!(tag = %tag, attempt, "deferred sync completed");
                        break;
                    }
                    Err(e) if attempt >= policy.max_attempts => {
                        error!(tag = %tag, attempt, error = %e, "deferred sync failed; giving up");
                        break;
                    }
                    Err(e) => {
                        let delay = policy.delay_after(attempt);
                        warn!(
                            tag = %tag,
                            attempt,
                            retry_in_secs = delay.as_secs(),
                            error = %e,
                            "deferred sync failed; will retry"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
            pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&tag);
        }))
    }
}

impl Default for BackgroundSync {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl DeferredRetry for BackgroundSync {
    fn register(&self, tag: &str, task: Arc<dyn DeferredTask>) -> bool {
        self.schedule(tag, task).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails until it has been called `succeed_on` times.
    struct Flaky {
        succeed_on: u32,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(succeed_on: u32) -> Arc<Self> {
            Arc::new(Self {
                succeed_on,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl DeferredTask for Flaky {
        async fn run(&self, _tag: &str) -> Result<(), SyncError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(())
            } else {
                Err(SyncError::Incomplete { failed: 1, attempted: 1 })
            }
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(2), Duration::from_secs(10));
        assert_eq!(policy.delay_after(4), Duration::from_secs(40));
        assert_eq!(policy.delay_after(7), Duration::from_secs(300));
        assert_eq!(policy.delay_after(64), Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let sync = BackgroundSync::default();
        let task = Flaky::new(3);

        let handle = sync.schedule("sync-quiz-submissions", task.clone()).unwrap();
        assert!(sync.is_pending("sync-quiz-submissions"));
        handle.await.unwrap();

        assert_eq!(task.calls.load(Ordering::SeqCst), 3);
        assert!(!sync.is_pending("sync-quiz-submissions"));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let sync = BackgroundSync::default();
        let task = Flaky::new(u32::MAX);

        sync.schedule("sync-attendance", task.clone())
            .unwrap()
            .await
            .unwrap();

        assert_eq!(task.calls.load(Ordering::SeqCst), 5);
        assert!(!sync.is_pending("sync-attendance"));
    }

    #[tokio::test(start_paused = true)]
    async fn pending_tag_coalesces() {
        let sync = BackgroundSync::default();
        let task = Flaky::new(2);

        let first = sync.schedule("sync-attendance", task.clone()).unwrap();
        assert!(!sync.register("sync-attendance", task.clone()));
        assert!(sync.register("sync-quiz-submissions", Flaky::new(1)));
        first.await.unwrap();

        assert_eq!(task.calls.load(Ordering::SeqCst), 2);
        assert!(sync.register("sync-attendance", task));
    }
}
