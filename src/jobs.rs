use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// How long shutdown waits for running ingests before cancelling them
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(60);

/// Background ingests and the workflows they are working on
///
/// Notifications for a workflow that is already being ingested are refused,
/// so duplicate webhook deliveries never produce two datasets. The spawned
/// tasks are tracked so shutdown can wait for them, or cancel them and let
/// them roll back, instead of abandoning half-written datasets.
#[derive(Debug, Clone, Default)]
pub struct IngestTracker {
    running: Arc<Mutex<HashSet<(String, String)>>>,
    tasks: TaskTracker,
    cancel: CancellationToken,
}

/// Marks a workflow as in flight until dropped
#[derive(Debug)]
pub struct IngestGuard {
    key: (String, String),
    running: Arc<Mutex<HashSet<(String, String)>>>,
}

fn lock(set: &Mutex<HashSet<(String, String)>>) -> MutexGuard<'_, HashSet<(String, String)>> {
    // The set stays consistent even if a holder panicked mid-insert
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl IngestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `namespace/name`, or returns `None` if it is already claimed
    pub fn try_start(&self, namespace: &str, name: &str) -> Option<IngestGuard> {
        let key = (namespace.to_string(), name.to_string());
        if !lock(&self.running).insert(key.clone()) {
            return None;
        }
        Some(IngestGuard {
            key,
            running: Arc::clone(&self.running),
        })
    }

    pub fn is_running(&self, namespace: &str, name: &str) -> bool {
        lock(&self.running).contains(&(namespace.to_string(), name.to_string()))
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.running).len()
    }

    /// Runs an ingest task on the runtime, tracked until it completes
    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task)
    }

    /// Cancelled when shutdown gives up waiting; ingests roll back on it
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the tracked ingests to finish
    ///
    /// Ingests still running after `timeout` are cancelled and waited for
    /// again while they roll back. Returns `false` if any had to be cancelled.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        if self.tasks.is_empty() {
            return true;
        }

        info!("Waiting for {} running ingests", self.tasks.len());
        if tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok() {
            return true;
        }

        warn!(
            "{} ingests still running after {:?}, cancelling them",
            self.tasks.len(),
            timeout
        );
        self.cancel.cancel();
        self.tasks.wait().await;
        false
    }
}

impl Drop for IngestGuard {
    fn drop(&mut self) {
        lock(&self.running).remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_refused() {
        let tracker = IngestTracker::new();
        let guard = tracker.try_start("argo", "wf-1");
        assert!(guard.is_some());
        assert!(tracker.try_start("argo", "wf-1").is_none());
        assert_eq!(tracker.in_flight(), 1);
    }

    #[test]
    fn test_drop_releases_claim() {
        let tracker = IngestTracker::new();
        {
            let _guard = tracker.try_start("argo", "wf-1").unwrap();
            assert!(tracker.is_running("argo", "wf-1"));
        }
        assert!(!tracker.is_running("argo", "wf-1"));
        assert!(tracker.try_start("argo", "wf-1").is_some());
    }

    #[test]
    fn test_distinct_workflows_run_together() {
        let tracker = IngestTracker::new();
        let _a = tracker.try_start("argo", "wf-1").unwrap();
        let _b = tracker.try_start("argo", "wf-2").unwrap();
        let _c = tracker.try_start("other", "wf-1").unwrap();
        assert_eq!(tracker.in_flight(), 3);
    }

    #[tokio::test]
    async fn test_drain_waits_for_running_tasks() {
        let tracker = IngestTracker::new();
        let finished = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&finished);
        tracker.spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            *flag.lock().unwrap() = true;
        });

        assert!(tracker.drain(Duration::from_secs(5)).await);
        assert!(*finished.lock().unwrap());
    }

    #[tokio::test]
    async fn test_drain_cancels_after_timeout() {
        let tracker = IngestTracker::new();
        let cancel = tracker.cancellation();
        let observed = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&observed);
        tracker.spawn(async move {
            cancel.cancelled().await;
            *flag.lock().unwrap() = true;
        });

        assert!(!tracker.drain(Duration::from_millis(10)).await);
        assert!(*observed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_drain_without_tasks() {
        assert!(IngestTracker::new().drain(Duration::from_millis(1)).await);
    }

    #[test]
    fn test_clones_share_state() {
        let tracker = IngestTracker::new();
        let clone = tracker.clone();
        let _guard = tracker.try_start("argo", "wf").unwrap();
        assert!(clone.try_start("argo", "wf").is_none());
    }
}
