use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::trace;

use crate::backoff::Backoff;

/// Deduplicating work queue with per-key in-flight tracking and rate-limited
/// re-enqueue. Cloning yields another handle to the same queue.
///
/// See the crate docs for the full contract.
pub struct WorkQueue<K> {
    inner: Arc<Inner<K>>,
}

struct Inner<K> {
    state: Mutex<State<K>>,
    /// One permit per queued key. Closed on shutdown, which fails every
    /// acquire and switches `get` to draining directly from the queue.
    ready: Semaphore,
    backoff: Backoff,
}

struct State<K> {
    queue: VecDeque<K>,
    /// Keys pending processing, queued or parked behind an in-flight pass.
    dirty: HashSet<K>,
    /// Keys currently held by a worker.
    processing: HashSet<K>,
    /// Consecutive failure count per key.
    failures: HashMap<K, u32>,
    shutting_down: bool,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K> WorkQueue<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// An empty queue with the default backoff.
    pub fn new() -> Self {
        Self::with_backoff(Backoff::default())
    }

    /// An empty queue retrying on the given backoff.
    pub fn with_backoff(backoff: Backoff) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    failures: HashMap::new(),
                    shutting_down: false,
                }),
                ready: Semaphore::new(0),
                backoff,
            }),
        }
    }

    /// Enqueue `key` for processing.
    ///
    /// A key already pending is collapsed into the existing entry; a key
    /// currently in flight is parked and re-queued when its pass completes.
    /// Ignored after shutdown.
    pub fn add(&self, key: K) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        if state.shutting_down {
            return;
        }
        if !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        self.inner.ready.add_permits(1);
    }

    /// Wait for the next key and mark it in flight.
    ///
    /// Returns `None` once the queue is shut down and drained. The caller
    /// must pair every `Some` with a [`Self::done`].
    pub async fn get(&self) -> Option<K> {
        loop {
            match self.inner.ready.acquire().await {
                Ok(permit) => {
                    permit.forget();
                    let mut state = self.inner.state.lock().expect("lock poisoned");
                    if let Some(key) = state.queue.pop_front() {
                        state.dirty.remove(&key);
                        state.processing.insert(key.clone());
                        return Some(key);
                    }
                    // A shutdown drain raced us for this permit's key; loop
                    // and observe the closed semaphore.
                }
                Err(_) => {
                    let mut state = self.inner.state.lock().expect("lock poisoned");
                    return match state.queue.pop_front() {
                        Some(key) => {
                            state.dirty.remove(&key);
                            state.processing.insert(key.clone());
                            Some(key)
                        }
                        None => None,
                    };
                }
            }
        }
    }

    /// Finish the in-flight pass for `key`, re-queueing it if it was added
    /// again while being processed.
    pub fn done(&self, key: &K) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.clone());
            self.inner.ready.add_permits(1);
        }
    }

    /// Re-enqueue `key` after its per-key backoff delay, counting one more
    /// consecutive failure.
    pub fn add_rate_limited(&self, key: K) {
        let retries = {
            let mut state = self.inner.state.lock().expect("lock poisoned");
            if state.shutting_down {
                return;
            }
            let counter = state.failures.entry(key.clone()).or_insert(0);
            let retries = *counter;
            *counter += 1;
            retries
        };
        let delay = self.inner.backoff.delay(retries);
        trace!(retries = retries + 1, delay_ms = delay.as_millis() as u64, "requeue after backoff");
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Reset the consecutive failure count for `key`.
    pub fn forget(&self, key: &K) {
        self.inner
            .state
            .lock()
            .expect("lock poisoned")
            .failures
            .remove(key);
    }

    /// Consecutive failures recorded for `key` since it was last forgotten.
    pub fn num_requeues(&self, key: &K) -> u32 {
        self.inner
            .state
            .lock()
            .expect("lock poisoned")
            .failures
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Stop accepting new keys and unblock waiting getters once the already
    /// queued keys drain. Idempotent.
    pub fn shut_down(&self) {
        let mut state = self.inner.state.lock().expect("lock poisoned");
        state.shutting_down = true;
        self.inner.ready.close();
    }

    /// Returns `true` once shutdown has been requested.
    pub fn is_shutting_down(&self) -> bool {
        self.inner
            .state
            .lock()
            .expect("lock poisoned")
            .shutting_down
    }

    /// Number of keys queued and not yet handed to a worker.
    pub fn len(&self) -> usize {
        self.inner.state.lock().expect("lock poisoned").queue.len()
    }

    /// Returns `true` if no keys are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K> Default for WorkQueue<K>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    const TICK: Duration = Duration::from_millis(10);

    // -----------------------------------------------------------------------
    // Dedup
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn add_then_get() {
        let queue = WorkQueue::new();
        queue.add("a");
        assert_eq!(queue.get().await, Some("a"));
    }

    #[tokio::test]
    async fn pending_key_collapses() {
        let queue = WorkQueue::new();
        queue.add("a");
        queue.add("a");
        assert_eq!(queue.len(), 1);
        let key = queue.get().await.unwrap();
        queue.done(&key);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn distinct_keys_all_queue() {
        let queue = WorkQueue::new();
        queue.add("a");
        queue.add("b");
        queue.add("c");
        assert_eq!(queue.len(), 3);
    }

    // -----------------------------------------------------------------------
    // In-flight serialization
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn in_flight_key_is_parked_until_done() {
        let queue = WorkQueue::new();
        queue.add("a");
        let key = queue.get().await.unwrap();

        // Re-added while in flight: parked, not handed out again.
        queue.add("a");
        assert!(timeout(TICK, queue.get()).await.is_err());

        queue.done(&key);
        assert_eq!(queue.get().await, Some("a"));
    }

    #[tokio::test]
    async fn done_without_readd_leaves_queue_empty() {
        let queue = WorkQueue::new();
        queue.add("a");
        let key = queue.get().await.unwrap();
        queue.done(&key);
        assert!(queue.is_empty());
        assert!(timeout(TICK, queue.get()).await.is_err());
    }

    #[tokio::test]
    async fn get_blocks_until_add() {
        let queue = WorkQueue::new();
        let getter = tokio::spawn({
            let queue = queue.clone();
            async move { queue.get().await }
        });
        tokio::time::sleep(TICK).await;
        queue.add("late");
        assert_eq!(getter.await.unwrap(), Some("late"));
    }

    #[tokio::test]
    async fn concurrent_getters_never_share_a_key() {
        let queue = WorkQueue::new();
        queue.add("a");
        queue.add("b");
        let g1 = tokio::spawn({
            let queue = queue.clone();
            async move { queue.get().await.unwrap() }
        });
        let g2 = tokio::spawn({
            let queue = queue.clone();
            async move { queue.get().await.unwrap() }
        });
        let (k1, k2) = (g1.await.unwrap(), g2.await.unwrap());
        assert_ne!(k1, k2);
    }

    // -----------------------------------------------------------------------
    // Rate limiting
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn rate_limited_readd_arrives_after_delay() {
        let queue =
            WorkQueue::with_backoff(Backoff::new(Duration::from_millis(50), Duration::from_secs(1)));
        queue.add("a");
        let key = queue.get().await.unwrap();
        queue.add_rate_limited(key);
        queue.done(&"a");

        assert!(timeout(Duration::from_millis(10), queue.get()).await.is_err());
        let key = timeout(Duration::from_millis(100), queue.get())
            .await
            .expect("key should arrive after backoff");
        assert_eq!(key, Some("a"));
    }

    #[tokio::test]
    async fn failures_accumulate_until_forgotten() {
        let queue = WorkQueue::new();
        queue.add_rate_limited("a");
        queue.add_rate_limited("a");
        queue.add_rate_limited("a");
        assert_eq!(queue.num_requeues(&"a"), 3);
        queue.forget(&"a");
        assert_eq!(queue.num_requeues(&"a"), 0);
    }

    #[tokio::test]
    async fn failures_are_tracked_per_key() {
        let queue = WorkQueue::new();
        queue.add_rate_limited("a");
        queue.add_rate_limited("b");
        queue.add_rate_limited("b");
        assert_eq!(queue.num_requeues(&"a"), 1);
        assert_eq!(queue.num_requeues(&"b"), 2);
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn shutdown_drains_queued_keys_first() {
        let queue = WorkQueue::new();
        queue.add("a");
        queue.add("b");
        queue.shut_down();
        assert_eq!(queue.get().await, Some("a"));
        assert_eq!(queue.get().await, Some("b"));
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test]
    async fn shutdown_wakes_blocked_getters() {
        let queue = WorkQueue::<&str>::new();
        let getters: Vec<_> = (0..2)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move { queue.get().await })
            })
            .collect();
        tokio::time::sleep(TICK).await;
        queue.shut_down();
        for getter in getters {
            assert_eq!(getter.await.unwrap(), None);
        }
    }

    #[tokio::test]
    async fn add_after_shutdown_is_ignored() {
        let queue = WorkQueue::new();
        queue.shut_down();
        queue.add("late");
        assert!(queue.is_empty());
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test]
    async fn parked_key_still_drains_during_shutdown() {
        let queue = WorkQueue::new();
        queue.add("a");
        let key = queue.get().await.unwrap();
        queue.add("a");
        queue.shut_down();
        queue.done(&key);
        assert_eq!(queue.get().await, Some("a"));
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let queue = WorkQueue::<&str>::new();
        queue.shut_down();
        queue.shut_down();
        assert!(queue.is_shutting_down());
        assert_eq!(queue.get().await, None);
    }
}
