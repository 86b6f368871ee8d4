//! Shared inlet manager
//!
//! The manager owns at most one open upstream inlet per stream uid, no
//! matter how many consumers want the stream. The first subscriber opens
//! the inlet and starts its pull task; every subscriber gets a private
//! bounded queue the pull task fans out into; the last unsubscribe tears
//! the inlet down again.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<InletManager>
//!                   ┌──────────────────────────┐
//!                   │ inlets: HashMap<uid,     │
//!                   │   ManagedInlet {         │
//!                   │     inlet, pull task,    │
//!                   │     subscriber queues,   │
//!                   │     ref_count,           │
//!                   │   }                      │
//!                   │ >                        │
//!                   └────────────┬─────────────┘
//!                                │ pull task: pull_chunk()
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!       [queue 512]         [queue 512]         [queue 8192]
//!       relay session       relay session       recording writer
//! ```
//!
//! All subscribe/unsubscribe bookkeeping happens under the manager's one
//! async mutex; the subscriber set itself sits behind a short-lived sync
//! lock shared with the pull task so fan-out never touches the manager
//! lock. Teardown (task abort + inlet close) is synchronous and happens
//! inside the unsubscribe critical section, so a subsequent subscribe for
//! the same uid always sees either the old inlet fully alive or fully gone.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as SyncMutex};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::InletConfig;
use crate::source::{Inlet, InletSource, Sample, StreamDescriptor};

use super::error::InletError;
use super::queue::{self, SampleReceiver, SampleSender};

/// Identifier of one subscriber queue within the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

/// A live subscription to a managed inlet
///
/// Call [`InletManager::unsubscribe`] with its uid and id when done;
/// dropping it without unsubscribing leaks a reference count until the
/// manager is dropped.
pub struct Subscription {
    uid: String,
    id: SubscriberId,
    receiver: SampleReceiver,
}

impl Subscription {
    /// Uid of the subscribed stream
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Identifier to pass to [`InletManager::unsubscribe`]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Await the next sample; `None` once the inlet is torn down
    pub async fn recv(&mut self) -> Option<Sample> {
        self.receiver.recv().await
    }

    /// Pop the next sample if one is queued
    pub fn try_recv(&mut self) -> Option<Sample> {
        self.receiver.try_recv()
    }
}

/// Subscriber queues and reference count of one managed inlet
///
/// Guarded as a unit so the count always equals the number of registered
/// queues at every observation point.
#[derive(Default)]
struct SubscriberSet {
    queues: Vec<(SubscriberId, SampleSender)>,
    ref_count: usize,
}

/// State owned per open inlet
struct ManagedInlet {
    descriptor: Arc<StreamDescriptor>,
    inlet: Arc<dyn Inlet>,
    subscribers: Arc<SyncMutex<SubscriberSet>>,
    task: JoinHandle<()>,
}

/// Snapshot of one managed inlet for callers and tests
#[derive(Debug, Clone)]
pub struct InletStats {
    /// Current reference count
    pub ref_count: usize,
    /// Number of registered subscriber queues
    pub subscriber_queues: usize,
    /// True once the pull task has terminated (normally or on error)
    ///
    /// A finished task with a nonzero ref_count means the inlet is
    /// orphaned: subscribers keep their queues but no samples arrive
    /// until the last of them unsubscribes.
    pub pull_task_finished: bool,
}

/// Manages shared inlets: one upstream connection per stream, many subscribers
pub struct InletManager {
    config: InletConfig,
    inlets: Mutex<HashMap<String, ManagedInlet>>,
    next_subscriber_id: AtomicU64,
}

impl InletManager {
    /// Create a manager with default configuration
    pub fn new() -> Self {
        Self::with_config(InletConfig::default())
    }

    /// Create a manager with custom configuration
    pub fn with_config(config: InletConfig) -> Self {
        Self {
            config,
            inlets: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// Get the manager configuration
    pub fn config(&self) -> &InletConfig {
        &self.config
    }

    /// Subscribe to a stream, opening its inlet if this is the first subscriber
    ///
    /// The open is bounded by the configured timeout; on timeout or failure
    /// no inlet state is left behind and the error surfaces to the caller.
    pub async fn subscribe(
        &self,
        descriptor: &Arc<StreamDescriptor>,
        source: &Arc<dyn InletSource>,
        queue_capacity: usize,
    ) -> Result<Subscription, InletError> {
        let uid = descriptor.uid.clone();
        let mut inlets = self.inlets.lock().await;

        let entry = match inlets.entry(uid.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(slot) => {
                tracing::info!(uid = %uid, name = %descriptor.name, "Opening inlet");

                let inlet = match tokio::time::timeout(self.config.open_timeout, source.open())
                    .await
                {
                    Ok(Ok(inlet)) => inlet,
                    Ok(Err(err)) => {
                        tracing::error!(uid = %uid, error = %err, "Failed to open inlet");
                        return Err(InletError::OpenFailed(uid, err));
                    }
                    Err(_) => {
                        tracing::error!(uid = %uid, "Timed out opening inlet");
                        return Err(InletError::OpenTimeout(uid));
                    }
                };

                let subscribers = Arc::new(SyncMutex::new(SubscriberSet::default()));
                let task = tokio::spawn(pull_loop(
                    uid.clone(),
                    Arc::clone(&inlet),
                    Arc::clone(&subscribers),
                    self.config.clone(),
                ));

                slot.insert(ManagedInlet {
                    descriptor: Arc::clone(descriptor),
                    inlet,
                    subscribers,
                    task,
                })
            }
        };

        let id = SubscriberId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = queue::channel(queue_capacity);
        let refs = {
            let mut set = entry.subscribers.lock().unwrap();
            set.queues.push((id, tx));
            set.ref_count += 1;
            set.ref_count
        };

        tracing::info!(uid = %uid, refs = refs, "Subscriber added");
        Ok(Subscription {
            uid,
            id,
            receiver: rx,
        })
    }

    /// Remove a subscriber; closes the inlet when no subscribers remain
    ///
    /// Removal, the final task abort and the handle close all happen in
    /// one critical section, so a racing subscribe either still finds the
    /// live inlet or reopens a fresh one. Unknown uid/id pairs are a no-op.
    pub async fn unsubscribe(&self, uid: &str, id: SubscriberId) {
        let mut inlets = self.inlets.lock().await;

        let Some(entry) = inlets.get(uid) else {
            return;
        };

        let refs = {
            let mut set = entry.subscribers.lock().unwrap();
            if let Some(pos) = set.queues.iter().position(|(qid, _)| *qid == id) {
                let (_, tx) = set.queues.remove(pos);
                tx.close();
                set.ref_count -= 1;
            }
            set.ref_count
        };

        tracing::info!(uid = %uid, refs = refs, "Subscriber removed");

        if refs == 0 {
            if let Some(managed) = inlets.remove(uid) {
                tracing::info!(uid = %uid, name = %managed.descriptor.name, "Closing inlet");
                managed.task.abort();
                managed.inlet.close();
            }
        }
    }

    /// Snapshot of one inlet's bookkeeping, `None` if no inlet is open
    pub async fn stats(&self, uid: &str) -> Option<InletStats> {
        let inlets = self.inlets.lock().await;
        inlets.get(uid).map(|managed| {
            let set = managed.subscribers.lock().unwrap();
            InletStats {
                ref_count: set.ref_count,
                subscriber_queues: set.queues.len(),
                pull_task_finished: managed.task.is_finished(),
            }
        })
    }

    /// Number of currently open inlets
    pub async fn inlet_count(&self) -> usize {
        self.inlets.lock().await.len()
    }
}

impl Default for InletManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task pulling one inlet and fanning out to its subscribers
///
/// Runs until aborted by the final unsubscribe. Any pull error terminates
/// the task and strands the manager entry; see [`InletStats::pull_task_finished`].
async fn pull_loop(
    uid: String,
    inlet: Arc<dyn Inlet>,
    subscribers: Arc<SyncMutex<SubscriberSet>>,
    config: InletConfig,
) {
    loop {
        match inlet.pull_chunk(config.pull_timeout, config.max_chunk).await {
            Ok(samples) if !samples.is_empty() => {
                let set = subscribers.lock().unwrap();
                for sample in samples {
                    for (_, queue) in &set.queues {
                        queue.push(sample.clone());
                    }
                }
            }
            Ok(_) => {
                tokio::time::sleep(config.idle_backoff).await;
            }
            Err(err) => {
                tracing::error!(uid = %uid, error = %err, "Pull task failed, terminating");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::source::mock::{scripted_descriptor, ScriptedSource};
    use crate::source::Sample;

    fn test_config() -> InletConfig {
        InletConfig::default()
            .open_timeout(Duration::from_millis(200))
            .pull_timeout(Duration::from_millis(5))
            .idle_backoff(Duration::from_millis(1))
    }

    fn scripted(n: u64) -> ScriptedSource {
        ScriptedSource::new((1..=n).map(|i| Sample::numeric(i as f64, vec![i as f64])).collect())
    }

    #[tokio::test]
    async fn test_refcount_tracks_subscriber_queues() {
        let manager = InletManager::with_config(test_config());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "X"));
        let source = Arc::new(scripted(0));
        let dyn_source: Arc<dyn InletSource> = source.clone();

        let a = manager.subscribe(&descriptor, &dyn_source, 8).await.unwrap();
        let b = manager.subscribe(&descriptor, &dyn_source, 8).await.unwrap();

        let stats = manager.stats("uid-x").await.unwrap();
        assert_eq!(stats.ref_count, 2);
        assert_eq!(stats.subscriber_queues, 2);
        assert_eq!(source.open_count(), 1);

        manager.unsubscribe("uid-x", a.id()).await;
        let stats = manager.stats("uid-x").await.unwrap();
        assert_eq!(stats.ref_count, 1);
        assert_eq!(stats.subscriber_queues, 1);
        assert_eq!(source.close_count(), 0);

        manager.unsubscribe("uid-x", b.id()).await;
        assert!(manager.stats("uid-x").await.is_none());
        assert_eq!(manager.inlet_count().await, 0);
        assert_eq!(source.close_count(), 1);
    }

    #[tokio::test]
    async fn test_resubscribe_opens_fresh_inlet() {
        let manager = InletManager::with_config(test_config());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "X"));
        let source = Arc::new(scripted(0));
        let dyn_source: Arc<dyn InletSource> = source.clone();

        let first = manager.subscribe(&descriptor, &dyn_source, 8).await.unwrap();
        manager.unsubscribe("uid-x", first.id()).await;

        let second = manager.subscribe(&descriptor, &dyn_source, 8).await.unwrap();
        assert_eq!(source.open_count(), 2);
        assert_eq!(source.close_count(), 1);

        manager.unsubscribe("uid-x", second.id()).await;
        assert_eq!(source.close_count(), 2);
    }

    #[tokio::test]
    async fn test_open_failure_leaves_no_state() {
        let manager = InletManager::with_config(test_config());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "X"));
        let dyn_source: Arc<dyn InletSource> = Arc::new(ScriptedSource::new(Vec::new()).fail_open());

        let result = manager.subscribe(&descriptor, &dyn_source, 8).await;
        assert!(matches!(result, Err(InletError::OpenFailed(_, _))));
        assert_eq!(manager.inlet_count().await, 0);
    }

    #[tokio::test]
    async fn test_open_timeout_leaves_no_state() {
        let manager = InletManager::with_config(test_config());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "X"));
        let dyn_source: Arc<dyn InletSource> =
            Arc::new(ScriptedSource::new(Vec::new()).open_delay(Duration::from_secs(2)));

        let result = manager.subscribe(&descriptor, &dyn_source, 8).await;
        assert!(matches!(result, Err(InletError::OpenTimeout(_))));
        assert_eq!(manager.inlet_count().await, 0);
    }

    #[tokio::test]
    async fn test_fanout_preserves_pull_order_per_subscriber() {
        let manager = InletManager::with_config(test_config());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "X"));
        let source = Arc::new(scripted(6).chunk_size(2));
        let dyn_source: Arc<dyn InletSource> = source.clone();

        let mut a = manager.subscribe(&descriptor, &dyn_source, 16).await.unwrap();
        let mut b = manager.subscribe(&descriptor, &dyn_source, 16).await.unwrap();

        let all: Vec<f64> = (1..=6).map(f64::from).collect();

        let mut seen_a = Vec::new();
        for _ in 0..6 {
            let sample = tokio::time::timeout(Duration::from_secs(1), a.recv())
                .await
                .unwrap()
                .unwrap();
            seen_a.push(sample.timestamp);
        }
        assert_eq!(seen_a, all);

        // b may have registered after the first batch was already fanned
        // out, but whatever it saw is a contiguous in-order tail.
        let mut seen_b = Vec::new();
        while let Some(sample) = b.try_recv() {
            seen_b.push(sample.timestamp);
        }
        assert!(all.ends_with(&seen_b));

        manager.unsubscribe("uid-x", a.id()).await;
        manager.unsubscribe("uid-x", b.id()).await;
    }

    #[tokio::test]
    async fn test_pull_failure_orphans_entry_until_unsubscribe() {
        let manager = InletManager::with_config(test_config());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "X"));
        let source = Arc::new(ScriptedSource::new(Vec::new()).fail_pull_when_drained());
        let dyn_source: Arc<dyn InletSource> = source.clone();

        let sub = manager.subscribe(&descriptor, &dyn_source, 8).await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let finished = manager
                .stats("uid-x")
                .await
                .map(|s| s.pull_task_finished)
                .unwrap_or(false);
            if finished {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "pull task did not terminate"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // Entry survives the dead task: stale ref_count, no samples
        let stats = manager.stats("uid-x").await.unwrap();
        assert_eq!(stats.ref_count, 1);
        assert_eq!(source.close_count(), 0);

        // An explicit unsubscribe still tears everything down
        manager.unsubscribe("uid-x", sub.id()).await;
        assert!(manager.stats("uid-x").await.is_none());
        assert_eq!(source.close_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_uid_is_a_noop() {
        let manager = InletManager::with_config(test_config());
        let descriptor = Arc::new(scripted_descriptor("uid-x", "X"));
        let dyn_source: Arc<dyn InletSource> = Arc::new(scripted(0));

        let sub = manager.subscribe(&descriptor, &dyn_source, 8).await.unwrap();
        manager.unsubscribe("uid-x", sub.id()).await;

        // Same uid again, and a uid that never existed: nothing to touch
        manager.unsubscribe("uid-x", sub.id()).await;
        manager.unsubscribe("uid-y", sub.id()).await;
        assert_eq!(manager.inlet_count().await, 0);
    }
}
