//! Snapshot distribution to UI observers
//!
//! A `watch` channel keeps only the most recent snapshot, which gives
//! at-least-latest delivery: a slow or late subscriber observes the newest
//! state, never a backlog of intermediate ones.

use futures::stream::{self, Stream};
use tokio::sync::watch;
use tracing::trace;

use crate::app::models::CacheSnapshot;

/// Publishes cache snapshots to any number of subscribers
#[derive(Debug)]
pub struct ChangeBroadcaster {
    sender: watch::Sender<CacheSnapshot>,
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(CacheSnapshot::empty(0));
        Self { sender }
    }

    /// Replace the latest snapshot and wake subscribers
    ///
    /// Callers publish while holding the cache lock, so publication order
    /// is mutation order.
    pub fn publish(&self, snapshot: CacheSnapshot) {
        trace!(
            "Publishing snapshot v{} ({} records) to {} subscribers",
            snapshot.version(),
            snapshot.len(),
            self.sender.receiver_count()
        );
        self.sender.send_replace(snapshot);
    }

    /// Most recently published snapshot
    pub fn latest(&self) -> CacheSnapshot {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotSubscription {
        SnapshotSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A subscriber's view of the snapshot stream
#[derive(Debug, Clone)]
pub struct SnapshotSubscription {
    receiver: watch::Receiver<CacheSnapshot>,
}

impl SnapshotSubscription {
    /// The latest snapshot, marking it as seen
    pub fn current(&mut self) -> CacheSnapshot {
        self.receiver.borrow_and_update().clone()
    }

    /// Wait for a snapshot newer than the last one seen
    ///
    /// Returns `None` once the broadcaster has been dropped.
    pub async fn changed(&mut self) -> Option<CacheSnapshot> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Stream starting with the current snapshot, then every newer one seen
    pub fn into_stream(self) -> impl Stream<Item = CacheSnapshot> {
        stream::unfold((self, true), |(mut subscription, first)| async move {
            let next = if first {
                Some(subscription.current())
            } else {
                subscription.changed().await
            };
            next.map(|snapshot| (snapshot, (subscription, false)))
        })
    }
}
