use readygate_core::PodKey;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Default)]
struct QueueState {
    /// Keys ready to be handed out, in FIFO order
    queue: VecDeque<PodKey>,
    /// Keys that need processing (queued, or waiting for their in-flight run)
    dirty: HashSet<PodKey>,
    /// Keys currently handed out to a worker
    processing: HashSet<PodKey>,
    shutting_down: bool,
}

/// Deduplicating work queue of Pod keys
///
/// A key is queued at most once, and a key handed out by [`WorkQueue::get`]
/// is not handed out again until [`WorkQueue::done`] is called for it. Adding
/// a key while it is in flight re-queues it once processing finishes.
#[derive(Debug, Default)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, key: PodKey) {
        let mut state = self.state.lock().await;
        if state.shutting_down || !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        self.notify.notify_one();
    }

    /// Add `key` after `delay` without blocking the caller
    pub fn add_after(self: &Arc<Self>, key: PodKey, delay: Duration) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key).await;
        });
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    pub async fn get(&self) -> Option<PodKey> {
        loop {
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    if !state.queue.is_empty() {
                        // Only one permit is stored; pass the wakeup on
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Mark a key as processed
    pub async fn done(&self, key: &PodKey) {
        let mut state = self.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains(key) && !state.shutting_down {
            state.queue.push_back(key.clone());
            self.notify.notify_one();
        }
    }

    /// Stop handing out keys and wake every waiting worker
    pub async fn shutdown(&self) {
        self.state.lock().await.shutting_down = true;
        self.notify.notify_waiters();
    }

    /// Number of keys waiting to be handed out
    pub async fn len(&self) -> usize {
        self.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> PodKey {
        PodKey::new("default", name)
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = WorkQueue::new();
        queue.add(key("a")).await;
        queue.add(key("b")).await;

        assert_eq!(queue.get().await, Some(key("a")));
        assert_eq!(queue.get().await, Some(key("b")));
    }

    #[tokio::test]
    async fn test_pending_keys_are_deduplicated() {
        let queue = WorkQueue::new();
        queue.add(key("a")).await;
        queue.add(key("a")).await;
        queue.add(key("b")).await;

        assert_eq!(queue.len().await, 2);
    }

    #[tokio::test]
    async fn test_in_flight_key_is_requeued_after_done() {
        let queue = WorkQueue::new();
        queue.add(key("a")).await;
        let first = queue.get().await.unwrap();

        // Re-added while in flight: not handed out yet
        queue.add(key("a")).await;
        assert!(queue.is_empty().await);

        queue.done(&first).await;
        assert_eq!(queue.len().await, 1);
        assert_eq!(queue.get().await, Some(key("a")));
    }

    #[tokio::test]
    async fn test_done_without_readd_does_not_requeue() {
        let queue = WorkQueue::new();
        queue.add(key("a")).await;
        let k = queue.get().await.unwrap();
        queue.done(&k).await;
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_waits_for_add() {
        let queue = Arc::new(WorkQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };

        tokio::task::yield_now().await;
        queue.add(key("late")).await;

        assert_eq!(waiter.await.unwrap(), Some(key("late")));
    }

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let queue = Arc::new(WorkQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };

        tokio::task::yield_now().await;
        queue.shutdown().await;

        assert_eq!(waiter.await.unwrap(), None);
        queue.add(key("ignored")).await;
        assert!(queue.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_after_delays_key() {
        let queue = Arc::new(WorkQueue::new());
        queue.add_after(key("later"), Duration::from_secs(5));

        tokio::task::yield_now().await;
        assert!(queue.is_empty().await);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(queue.len().await, 1);
    }
}
