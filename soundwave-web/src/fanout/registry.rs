//! Live subscriber registry
//!
//! Membership is guarded by an async `RwLock`. A broadcast holds the read
//! guard for its whole fan-out, so register/unregister wait for in-flight
//! deliveries and iteration never observes a half-applied change.
//!
//! Each subscriber remembers the first block it may receive. The broadcaster
//! marks a block as started before its wave frame goes out, so a subscriber
//! that joins while a block is in flight only sees complete blocks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock, RwLockReadGuard};
use tracing::debug;

use soundwave_common::SubscriberId;

use super::HubMessage;

/// Send half handed to the registry for one subscriber
pub type SubscriberSender = mpsc::Sender<HubMessage>;

/// Receive half owned by the transport for one subscriber
pub type SubscriberReceiver = mpsc::Receiver<HubMessage>;

/// Create a bounded subscriber channel
pub fn subscriber_channel(capacity: usize) -> (SubscriberSender, SubscriberReceiver) {
    mpsc::channel(capacity.max(1))
}

/// One registered subscriber
#[derive(Debug)]
pub(crate) struct Subscriber {
    pub(crate) sender: SubscriberSender,
    /// First block sequence this subscriber receives
    pub(crate) joined_at: u64,
    /// Consecutive sends that timed out
    pub(crate) timeouts: AtomicU32,
}

impl Subscriber {
    /// Whether `message` belongs to a block that started before this subscriber joined
    pub(crate) fn predates(&self, message: &HubMessage) -> bool {
        matches!(message, HubMessage::Frame { sequence, .. } if *sequence < self.joined_at)
    }
}

/// Set of currently connected subscribers
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    /// Number of blocks whose first frame has been broadcast
    blocks_started: AtomicU64,
    /// Set by `close`; no registrations afterwards
    closed: AtomicBool,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber, replacing any previous sender for the same id.
    ///
    /// The subscriber receives every block that starts after this call; a
    /// block already in flight is skipped entirely. Returns false (and drops
    /// `sender`, ending the subscriber's stream) once the registry is closed.
    pub async fn register(&self, id: SubscriberId, sender: SubscriberSender) -> bool {
        let mut subscribers = self.subscribers.write().await;

        if self.closed.load(Ordering::SeqCst) {
            debug!("Registry closed, subscriber {} refused", id);
            return false;
        }

        let subscriber = Subscriber {
            sender,
            joined_at: self.blocks_started.load(Ordering::SeqCst),
            timeouts: AtomicU32::new(0),
        };
        let joined_at = subscriber.joined_at;

        if subscribers.insert(id, subscriber).is_some() {
            debug!("Subscriber {} re-registered from block {}", id, joined_at);
        } else {
            debug!("Subscriber {} registered from block {}", id, joined_at);
        }
        true
    }

    /// Remove a subscriber. Returns false if it was not registered.
    ///
    /// Once this returns, no further message is delivered to `id`.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().await.remove(&id).is_some();
        if removed {
            debug!("Subscriber {} unregistered", id);
        }
        removed
    }

    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// Ids of all registered subscribers, in no particular order
    pub async fn ids(&self) -> Vec<SubscriberId> {
        self.subscribers.read().await.keys().copied().collect()
    }

    /// Drop every subscriber and refuse new ones.
    ///
    /// Existing streams end once their queued messages drain. Returns the
    /// number of subscribers removed.
    pub async fn close(&self) -> usize {
        let mut subscribers = self.subscribers.write().await;
        self.closed.store(true, Ordering::SeqCst);

        let count = subscribers.len();
        subscribers.clear();
        debug!("Registry closed, {} subscribers removed", count);
        count
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Record that block `sequence` is about to be broadcast.
    ///
    /// Must be called before the block's first frame takes the read guard.
    pub(crate) fn start_block(&self, sequence: u64) {
        self.blocks_started.fetch_max(sequence.saturating_add(1), Ordering::SeqCst);
    }

    /// Remove subscribers the broadcaster gave up on
    pub(crate) async fn evict(&self, ids: &[SubscriberId]) {
        let mut subscribers = self.subscribers.write().await;
        for id in ids {
            if subscribers.remove(id).is_some() {
                debug!("Subscriber {} evicted", id);
            }
        }
    }

    /// Read access for the broadcaster's fan-out
    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers.read().await
    }
}

/// Unregisters a subscriber when dropped.
///
/// Held by a transport stream so that a closed connection leaves the
/// registry even when the stream is dropped outside an async context.
pub struct RegistrationGuard {
    registry: Arc<SubscriberRegistry>,
    id: SubscriberId,
    accepted: bool,
}

impl RegistrationGuard {
    /// Register `sender` under `id` and return a guard that undoes it.
    ///
    /// If the registry is closed the sender is dropped and the guard does
    /// nothing.
    pub async fn register(
        registry: Arc<SubscriberRegistry>,
        id: SubscriberId,
        sender: SubscriberSender,
    ) -> Self {
        let accepted = registry.register(id, sender).await;
        Self {
            registry,
            id,
            accepted,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// False if the registry was already closed
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if !self.accepted {
            return;
        }

        let registry = Arc::clone(&self.registry);
        let id = self.id;

        // Fast path: no broadcast in flight
        if let Ok(mut subscribers) = registry.subscribers.try_write() {
            subscribers.remove(&id);
            debug!("Subscriber {} disconnected", id);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    registry.unregister(id).await;
                    debug!("Subscriber {} disconnected", id);
                });
            }
            Err(_) => {
                // No runtime left (shutdown); block until the lock frees up
                registry.subscribers.blocking_write().remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = SubscriberRegistry::new();
        let id = SubscriberId::new();
        let (tx, _rx) = subscriber_channel(4);

        assert!(registry.is_empty().await);
        assert!(registry.register(id, tx).await);
        assert!(registry.contains(id).await);
        assert_eq!(registry.len().await, 1);

        assert!(registry.unregister(id).await);
        assert!(!registry.contains(id).await);
        assert!(!registry.unregister(id).await, "second unregister is a no-op");
    }

    #[tokio::test]
    async fn test_register_is_idempotent_per_id() {
        let registry = SubscriberRegistry::new();
        let id = SubscriberId::new();
        let (tx1, _rx1) = subscriber_channel(4);
        let (tx2, _rx2) = subscriber_channel(4);

        registry.register(id, tx1).await;
        registry.register(id, tx2).await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.ids().await, vec![id]);
    }

    #[tokio::test]
    async fn test_joined_at_follows_started_blocks() {
        let registry = SubscriberRegistry::new();
        let early = SubscriberId::new();
        let late = SubscriberId::new();
        let (tx1, _rx1) = subscriber_channel(4);
        let (tx2, _rx2) = subscriber_channel(4);

        registry.register(early, tx1).await;
        registry.start_block(4);
        registry.start_block(2);
        registry.register(late, tx2).await;

        let subscribers = registry.read().await;
        assert_eq!(subscribers[&early].joined_at, 0);
        assert_eq!(subscribers[&late].joined_at, 5, "never moves backwards");
    }

    #[tokio::test]
    async fn test_guard_unregisters_on_drop() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (tx, _rx) = subscriber_channel(4);

        let guard = RegistrationGuard::register(Arc::clone(&registry), SubscriberId::new(), tx).await;
        let id = guard.id();
        assert!(registry.contains(id).await);

        drop(guard);
        assert!(!registry.contains(id).await);
    }

    #[tokio::test]
    async fn test_guard_drop_while_read_locked() {
        let registry = Arc::new(SubscriberRegistry::new());
        let (tx, _rx) = subscriber_channel(4);
        let guard = RegistrationGuard::register(Arc::clone(&registry), SubscriberId::new(), tx).await;
        let id = guard.id();

        let read = registry.read().await;
        drop(guard);
        assert!(read.contains_key(&id), "removal deferred while read guard held");
        drop(read);

        // Deferred removal runs on the runtime
        for _ in 0..100 {
            if !registry.contains(id).await {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("subscriber was never unregistered");
    }

    #[tokio::test]
    async fn test_close_ends_streams_and_refuses_new_subscribers() {
        let registry = SubscriberRegistry::new();
        let (tx1, mut rx1) = subscriber_channel(4);
        let (tx2, mut rx2) = subscriber_channel(4);
        registry.register(SubscriberId::new(), tx1).await;
        registry.register(SubscriberId::new(), tx2).await;

        assert_eq!(registry.close().await, 2);
        assert!(registry.is_closed());
        assert!(registry.is_empty().await);
        assert!(rx1.recv().await.is_none());
        assert!(rx2.recv().await.is_none());

        let (late_tx, mut late_rx) = subscriber_channel(4);
        assert!(!registry.register(SubscriberId::new(), late_tx).await);
        assert!(registry.is_empty().await);
        assert!(late_rx.recv().await.is_none(), "refused sender is dropped");
    }

    #[tokio::test]
    async fn test_guard_after_close_is_inert() {
        let registry = Arc::new(SubscriberRegistry::new());
        registry.close().await;

        let (tx, mut rx) = subscriber_channel(4);
        let guard = RegistrationGuard::register(Arc::clone(&registry), SubscriberId::new(), tx).await;
        assert!(!guard.is_accepted());
        assert!(rx.recv().await.is_none());
        drop(guard);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_evict() {
        let registry = SubscriberRegistry::new();
        let id = SubscriberId::new();
        let (tx, mut rx) = subscriber_channel(4);
        registry.register(id, tx).await;

        registry.evict(&[id, SubscriberId::new()]).await;
        assert!(!registry.contains(id).await);
        assert!(rx.recv().await.is_none());
    }
}
