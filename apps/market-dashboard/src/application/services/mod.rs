//! Application Services
//!
//! Background work that drives the domain.
//!
//! - `PriceMutator`: applies a price tick on a fixed interval and hands the
//!   resulting snapshot to the broadcast dispatcher

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::domain::pricing::{PricePolicy, PriceSnapshot, PriceStore};
use crate::infrastructure::metrics;

/// Default time between price ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Periodic price perturbation task.
///
/// The mutator is the only writer of the price store. Snapshots are handed
/// off through a `watch` channel, which keeps only the latest value and never
/// blocks the sender, so a slow dispatcher cannot stall ticking.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use market_dashboard::application::services::PriceMutator;
/// use market_dashboard::domain::pricing::{PriceStore, UniformDrift};
/// use tokio::sync::watch;
/// use tokio_util::sync::CancellationToken;
///
/// async fn example() {
///     let store = Arc::new(PriceStore::with_default_watchlist());
///     let (handoff, mut rx) = watch::channel(store.snapshot());
///     let cancel = CancellationToken::new();
///
///     let mutator = PriceMutator::new(
///         store,
///         Arc::new(UniformDrift::default()),
///         Duration::from_secs(2),
///         handoff,
///         cancel.clone(),
///     );
///     tokio::spawn(mutator.run());
///
///     rx.changed().await.ok();
///     println!("tick {}", rx.borrow().sequence());
/// }
/// ```
pub struct PriceMutator {
    store: Arc<PriceStore>,
    policy: Arc<dyn PricePolicy>,
    interval: Duration,
    handoff: watch::Sender<PriceSnapshot>,
    cancel: CancellationToken,
}

impl PriceMutator {
    /// Create a mutator.
    #[must_use]
    pub fn new(
        store: Arc<PriceStore>,
        policy: Arc<dyn PricePolicy>,
        interval: Duration,
        handoff: watch::Sender<PriceSnapshot>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            policy,
            interval,
            handoff,
            cancel,
        }
    }

    /// Apply one tick and publish the resulting snapshot.
    pub fn tick(&self) -> PriceSnapshot {
        let snapshot = self.store.apply_changes(self.policy.as_ref());
        metrics::record_price_tick();

        tracing::trace!(sequence = snapshot.sequence(), "Price tick applied");
        self.handoff.send_replace(snapshot.clone());
        snapshot
    }

    /// Tick every interval until cancelled.
    ///
    /// The first tick fires one interval after start. Missed ticks are
    /// skipped rather than replayed.
    pub async fn run(self) {
        let mut interval = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval_ms = self.interval.as_millis(), "Price mutator started");

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Price mutator cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        tracing::info!(sequence = self.store.sequence(), "Price mutator stopped");
    }
}

impl std::fmt::Debug for PriceMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceMutator")
            .field("interval", &self.interval)
            .field("sequence", &self.store.sequence())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::pricing::{Stock, UniformDrift};

    fn mutator(
        policy: Arc<dyn PricePolicy>,
    ) -> (PriceMutator, watch::Receiver<PriceSnapshot>, CancellationToken) {
        let store = Arc::new(PriceStore::with_default_watchlist());
        let (handoff, rx) = watch::channel(store.snapshot());
        let cancel = CancellationToken::new();
        let mutator = PriceMutator::new(store, policy, DEFAULT_TICK_INTERVAL, handoff, cancel.clone());
        (mutator, rx, cancel)
    }

    #[test]
    fn tick_publishes_latest_snapshot() {
        let flat: Arc<dyn PricePolicy> = Arc::new(|_: &Stock| Decimal::ZERO);
        let (mutator, rx, _cancel) = mutator(flat);

        mutator.tick();
        mutator.tick();
        let last = mutator.tick();

        assert_eq!(last.sequence(), 3);
        assert_eq!(rx.borrow().sequence(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_ticks_on_interval_in_order() {
        let (mutator, mut rx, cancel) = mutator(Arc::new(UniformDrift::default()));
        let started = Instant::now();
        let task = tokio::spawn(mutator.run());

        for expected in 1..=3 {
            rx.changed().await.unwrap();
            assert_eq!(rx.borrow_and_update().sequence(), expected);
        }
        assert!(started.elapsed() >= DEFAULT_TICK_INTERVAL * 3);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_first_tick_leaves_store_untouched() {
        let (mutator, rx, cancel) = mutator(Arc::new(UniformDrift::default()));
        let task = tokio::spawn(mutator.run());

        cancel.cancel();
        task.await.unwrap();

        assert_eq!(rx.borrow().sequence(), 0);
    }
}
