//! Broadcast Hub
//!
//! Fans price snapshots out to every live streaming subscriber.
//!
//! # Architecture
//!
//! ```text
//! PriceMutator ──watch──► dispatcher (run) ──publish──► Subscriber 1
//!                                                  ├──► Subscriber 2
//!                                                  └──► Subscriber N
//! ```
//!
//! The membership set lives behind a `parking_lot::Mutex` that is only held
//! to copy, insert or remove entries, never across a send. Sends run
//! concurrently with a per-subscriber timeout; a subscriber that fails or
//! times out is evicted and its transport closed by whoever removed it.
//! Closing is bounded by the same timeout, so a peer whose buffer is full
//! cannot hold up a publish pass or shutdown.
//!
//! Each subscriber remembers the last sequence it was sent and silently
//! drops anything older, so snapshots always arrive in production order even
//! when the initial sync races a publish.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio_util::sync::CancellationToken;

use crate::BroadcastSettings;
use crate::application::ports::{SubscriberTransport, TransportError};
use crate::domain::pricing::{PriceSnapshot, PriceStore};
use crate::infrastructure::metrics;

/// Hub-assigned subscriber identity.
pub type SubscriberId = u64;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for subscriber fan-out.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Upper bound on one subscriber send.
    pub send_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(1),
        }
    }
}

impl From<BroadcastSettings> for BroadcastConfig {
    fn from(settings: BroadcastSettings) -> Self {
        Self {
            send_timeout: settings.send_timeout,
        }
    }
}

// =============================================================================
// Subscriber
// =============================================================================

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Snapshot was written to the transport.
    Sent,
    /// Subscriber already had this or a newer snapshot.
    Skipped,
}

struct Subscriber {
    id: SubscriberId,
    transport: Arc<dyn SubscriberTransport>,
    last_sequence: AsyncMutex<Option<u64>>,
}

impl Subscriber {
    async fn deliver(
        &self,
        snapshot: &PriceSnapshot,
        timeout: Duration,
    ) -> Result<Delivery, TransportError> {
        tokio::time::timeout(timeout, self.deliver_in_order(snapshot))
            .await
            .unwrap_or(Err(TransportError::Timeout))
    }

    async fn deliver_in_order(&self, snapshot: &PriceSnapshot) -> Result<Delivery, TransportError> {
        let mut last = self.last_sequence.lock().await;
        if last.is_some_and(|seq| snapshot.sequence() <= seq) {
            return Ok(Delivery::Skipped);
        }

        self.transport.send(snapshot).await?;
        *last = Some(snapshot.sequence());
        Ok(Delivery::Sent)
    }

    async fn close(&self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.transport.close())
            .await
            .is_err()
        {
            tracing::warn!(subscriber_id = self.id, "Subscriber close timed out");
        }
    }
}

/// Registration receipt held by a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberHandle {
    id: SubscriberId,
}

impl SubscriberHandle {
    /// Hub-assigned id.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }
}

// =============================================================================
// Reports and Errors
// =============================================================================

/// Result of one publish pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Sequence of the published snapshot.
    pub sequence: u64,
    /// Subscribers that received it.
    pub delivered: usize,
    /// Subscribers that already had it or something newer.
    pub skipped: usize,
    /// Subscribers removed because the send failed or timed out.
    pub evicted: Vec<SubscriberId>,
}

/// Statistics about the hub.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Live subscribers.
    pub subscribers: usize,
    /// Snapshots published since start.
    pub snapshots_published: u64,
    /// Subscribers evicted since start.
    pub evictions: u64,
    /// Sequence of the last published snapshot (0 if none).
    pub last_sequence: u64,
}

/// Hub errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The hub has shut down and accepts no new subscribers.
    #[error("broadcast hub is closed")]
    Closed,
}

// =============================================================================
// Broadcast Hub
// =============================================================================

#[derive(Default)]
struct Members {
    closed: bool,
    subscribers: HashMap<SubscriberId, Arc<Subscriber>>,
}

/// Registry of live subscribers and the fan-out engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use market_dashboard::domain::pricing::{PriceStore, UniformDrift};
/// use market_dashboard::infrastructure::broadcast::{BroadcastConfig, BroadcastHub};
///
/// async fn example() {
///     let store = Arc::new(PriceStore::with_default_watchlist());
///     let hub = BroadcastHub::new(BroadcastConfig::default(), Arc::clone(&store));
///
///     let snapshot = store.apply_changes(&UniformDrift::default());
///     let report = hub.publish(&snapshot).await;
///     assert_eq!(report.delivered, 0);
/// }
/// ```
pub struct BroadcastHub {
    config: BroadcastConfig,
    store: Arc<PriceStore>,
    members: Mutex<Members>,
    next_id: AtomicU64,
    snapshots_published: AtomicU64,
    evictions: AtomicU64,
    last_sequence: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub that serves initial snapshots from `store`.
    #[must_use]
    pub fn new(config: BroadcastConfig, store: Arc<PriceStore>) -> Self {
        Self {
            config,
            store,
            members: Mutex::new(Members::default()),
            next_id: AtomicU64::new(1),
            snapshots_published: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            last_sequence: AtomicU64::new(0),
        }
    }

    /// Create a hub with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<PriceStore>) -> Self {
        Self::new(BroadcastConfig::default(), store)
    }

    // =========================================================================
    // Membership
    // =========================================================================

    /// Add a subscriber and return the snapshot to sync it with.
    ///
    /// The subscriber is visible to publishers before the snapshot is taken,
    /// so no tick can fall between the two.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Closed` after [`shutdown`](Self::shutdown).
    pub fn register(
        &self,
        transport: Arc<dyn SubscriberTransport>,
    ) -> Result<(SubscriberHandle, PriceSnapshot), HubError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            id,
            transport,
            last_sequence: AsyncMutex::new(None),
        });

        let count = {
            let mut members = self.members.lock();
            if members.closed {
                return Err(HubError::Closed);
            }
            members.subscribers.insert(id, subscriber);
            members.subscribers.len()
        };
        metrics::set_subscribers(count);
        tracing::debug!(subscriber_id = id, subscribers = count, "Subscriber registered");

        Ok((SubscriberHandle { id }, self.store.snapshot()))
    }

    /// Send the initial snapshot to a freshly registered subscriber.
    ///
    /// Goes through the same ordering gate as [`publish`](Self::publish).
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Closed` if the subscriber is no longer
    /// registered, or the send failure.
    pub async fn sync(
        &self,
        handle: &SubscriberHandle,
        snapshot: &PriceSnapshot,
    ) -> Result<Delivery, TransportError> {
        let subscriber = self
            .members
            .lock()
            .subscribers
            .get(&handle.id)
            .cloned()
            .ok_or(TransportError::Closed)?;

        subscriber.deliver(snapshot, self.config.send_timeout).await
    }

    /// Remove a subscriber and close its transport.
    ///
    /// Idempotent. Returns `true` only for the call that actually removed it.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let Some(subscriber) = self.remove(id) else {
            return false;
        };
        subscriber.close(self.config.send_timeout).await;
        tracing::debug!(subscriber_id = id, "Subscriber unregistered");
        true
    }

    fn remove(&self, id: SubscriberId) -> Option<Arc<Subscriber>> {
        let (removed, count) = {
            let mut members = self.members.lock();
            let removed = members.subscribers.remove(&id);
            (removed, members.subscribers.len())
        };
        if removed.is_some() {
            metrics::set_subscribers(count);
        }
        removed
    }

    // =========================================================================
    // Fan-out
    // =========================================================================

    /// Push `snapshot` to every live subscriber.
    ///
    /// Membership is copied under the lock and sends happen outside it.
    /// Subscribers whose send fails or times out are evicted; the others are
    /// unaffected.
    pub async fn publish(&self, snapshot: &PriceSnapshot) -> PublishReport {
        let started = Instant::now();
        let targets: Vec<Arc<Subscriber>> =
            self.members.lock().subscribers.values().cloned().collect();

        let timeout = self.config.send_timeout;
        let outcomes = join_all(
            targets
                .iter()
                .map(|subscriber| subscriber.deliver(snapshot, timeout)),
        )
        .await;

        let mut report = PublishReport {
            sequence: snapshot.sequence(),
            ..PublishReport::default()
        };
        let mut failed = Vec::new();
        for (subscriber, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(Delivery::Sent) => report.delivered += 1,
                Ok(Delivery::Skipped) => report.skipped += 1,
                Err(e) => failed.push((subscriber.id, e)),
            }
        }

        let evicted = failed
            .into_iter()
            .filter_map(|(id, reason)| self.remove(id).map(|s| (s, reason)))
            .collect::<Vec<_>>();
        join_all(evicted.iter().map(|(subscriber, reason)| async move {
            tracing::warn!(
                subscriber_id = subscriber.id,
                reason = %reason,
                "Evicting subscriber after failed send"
            );
            metrics::record_subscriber_evicted(reason.reason());
            subscriber.close(timeout).await;
        }))
        .await;
        report.evicted = evicted.iter().map(|(s, _)| s.id).collect();

        self.snapshots_published.fetch_add(1, Ordering::Relaxed);
        self.evictions
            .fetch_add(report.evicted.len() as u64, Ordering::Relaxed);
        self.last_sequence
            .fetch_max(snapshot.sequence(), Ordering::Relaxed);

        metrics::record_snapshots_published(report.delivered as u64);
        metrics::record_snapshots_skipped(report.skipped as u64);
        metrics::record_publish_duration(started.elapsed());
        tracing::trace!(
            sequence = report.sequence,
            delivered = report.delivered,
            skipped = report.skipped,
            evicted = report.evicted.len(),
            "Snapshot published"
        );

        report
    }

    /// Dispatch every snapshot observed on `handoff` until cancelled.
    ///
    /// Intermediate snapshots overwritten in the channel are never seen.
    /// On exit the hub is shut down.
    pub async fn run(&self, mut handoff: watch::Receiver<PriceSnapshot>, cancel: CancellationToken) {
        tracing::info!("Broadcast dispatcher started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Broadcast dispatcher cancelled");
                    break;
                }
                changed = handoff.changed() => {
                    if changed.is_err() {
                        tracing::warn!("Price handoff closed, stopping dispatcher");
                        break;
                    }
                    let snapshot = handoff.borrow_and_update().clone();
                    self.publish(&snapshot).await;
                }
            }
        }

        self.shutdown().await;
        tracing::info!("Broadcast dispatcher stopped");
    }

    /// Close the hub and every subscriber transport.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<Subscriber>> = {
            let mut members = self.members.lock();
            members.closed = true;
            members.subscribers.drain().map(|(_, s)| s).collect()
        };
        metrics::set_subscribers(0);

        if !drained.is_empty() {
            tracing::info!(subscribers = drained.len(), "Closing subscribers");
        }
        let timeout = self.config.send_timeout;
        join_all(drained.iter().map(|s| s.close(timeout))).await;
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Whether [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.members.lock().closed
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.members.lock().subscribers.len()
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            subscribers: self.subscriber_count(),
            snapshots_published: self.snapshots_published.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            last_sequence: self.last_sequence.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Shared broadcast hub reference.
pub type SharedBroadcastHub = Arc<BroadcastHub>;

// =============================================================================
// Tests
// =============================================================================
