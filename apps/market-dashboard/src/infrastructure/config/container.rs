//! Application Context
//!
//! Creates and wires every long-lived component. There are no globals: the
//! HTTP layer receives a cheap clone of [`AppContext`] as router state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::DashboardConfig;
use crate::application::services::PriceMutator;
use crate::domain::ledger::OrderLedger;
use crate::domain::pricing::{PricePolicy, PriceStore, UniformDrift};
use crate::infrastructure::auth::{JwtAuthenticator, UserDirectory};
use crate::infrastructure::broadcast::{BroadcastConfig, BroadcastHub, SharedBroadcastHub};

struct Components {
    store: Arc<PriceStore>,
    ledger: Arc<OrderLedger>,
    hub: SharedBroadcastHub,
    authenticator: Arc<JwtAuthenticator>,
    users: Arc<UserDirectory>,
    policy: Arc<dyn PricePolicy>,
    tick_interval: Duration,
    operator_key: Option<String>,
    started_at: Instant,
    shutdown: CancellationToken,
}

/// Shared handle to every application component.
#[derive(Clone)]
pub struct AppContext {
    inner: Arc<Components>,
}

impl AppContext {
    /// Build the context from configuration with the default random drift.
    #[must_use]
    pub fn from_config(config: &DashboardConfig, shutdown: CancellationToken) -> Self {
        let policy = Arc::new(UniformDrift::new(config.pricing.max_change_bps));
        Self::with_policy(config, policy, shutdown)
    }

    /// Build the context with an explicit perturbation policy.
    #[must_use]
    pub fn with_policy(
        config: &DashboardConfig,
        policy: Arc<dyn PricePolicy>,
        shutdown: CancellationToken,
    ) -> Self {
        let store = Arc::new(PriceStore::with_default_watchlist());
        let ledger = Arc::new(OrderLedger::new(store.clone()));
        let hub = Arc::new(BroadcastHub::new(
            BroadcastConfig::from(config.broadcast.clone()),
            Arc::clone(&store),
        ));
        let users = UserDirectory::from_settings(&config.auth);

        Self {
            inner: Arc::new(Components {
                store,
                ledger,
                hub,
                authenticator: Arc::new(JwtAuthenticator::from_settings(&config.auth)),
                users: Arc::new(users),
                policy,
                tick_interval: config.pricing.tick_interval,
                operator_key: config.auth.operator_key().map(str::to_string),
                started_at: Instant::now(),
                shutdown,
            }),
        }
    }

    /// Start the price mutator and the broadcast dispatcher.
    ///
    /// Both stop when the shutdown token is cancelled; the dispatcher closes
    /// every subscriber on its way out.
    #[must_use]
    pub fn spawn_background(&self) -> BackgroundTasks {
        let (handoff, updates) = watch::channel(self.inner.store.snapshot());

        let mutator = PriceMutator::new(
            Arc::clone(&self.inner.store),
            Arc::clone(&self.inner.policy),
            self.inner.tick_interval,
            handoff,
            self.inner.shutdown.clone(),
        );
        let mutator = tokio::spawn(mutator.run());

        let hub = Arc::clone(&self.inner.hub);
        let cancel = self.inner.shutdown.clone();
        let dispatcher = tokio::spawn(async move { hub.run(updates, cancel).await });

        BackgroundTasks {
            mutator,
            dispatcher,
        }
    }

    /// Price store.
    #[must_use]
    pub fn store(&self) -> &Arc<PriceStore> {
        &self.inner.store
    }

    /// Order ledger.
    #[must_use]
    pub fn ledger(&self) -> &Arc<OrderLedger> {
        &self.inner.ledger
    }

    /// Broadcast hub.
    #[must_use]
    pub fn hub(&self) -> &SharedBroadcastHub {
        &self.inner.hub
    }

    /// Bearer token authenticator.
    #[must_use]
    pub fn authenticator(&self) -> &Arc<JwtAuthenticator> {
        &self.inner.authenticator
    }

    /// Account store.
    #[must_use]
    pub fn users(&self) -> &Arc<UserDirectory> {
        &self.inner.users
    }

    /// Operator key guarding the full order listing, if configured.
    #[must_use]
    pub fn operator_key(&self) -> Option<&str> {
        self.inner.operator_key.as_deref()
    }

    /// Process start time.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.inner.started_at
    }

    /// Shutdown token shared by every task.
    #[must_use]
    pub fn shutdown(&self) -> &CancellationToken {
        &self.inner.shutdown
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("symbols", &self.inner.store.len())
            .field("orders", &self.inner.ledger.len())
            .field("hub", &self.inner.hub)
            .finish_non_exhaustive()
    }
}

/// Handles for the background tasks.
#[derive(Debug)]
pub struct BackgroundTasks {
    mutator: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

impl BackgroundTasks {
    /// Wait for both tasks to finish.
    pub async fn join(self) {
        let (mutator, dispatcher) = tokio::join!(self.mutator, self.dispatcher);
        if let Err(e) = mutator {
            tracing::error!(error = %e, "Price mutator task failed");
        }
        if let Err(e) = dispatcher {
            tracing::error!(error = %e, "Broadcast dispatcher task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::pricing::Stock;

    #[tokio::test(start_paused = true)]
    async fn background_tasks_tick_and_stop() {
        let shutdown = CancellationToken::new();
        let flat: Arc<dyn PricePolicy> = Arc::new(|_: &Stock| Decimal::ZERO);
        let mut config = DashboardConfig::default();
        config.auth.password_cost = 4 /* bcrypt minimum cost */;
        let ctx = AppContext::with_policy(&config, flat, shutdown.clone());

        let tasks = ctx.spawn_background();
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        shutdown.cancel();
        tasks.join().await;

        assert_eq!(ctx.store().sequence(), 2);
        assert!(ctx.hub().is_closed());
    }

    #[test]
    fn demo_user_follows_config() {
        let mut config = DashboardConfig::default();
        config.auth.seed_demo_user = false;

        let ctx = AppContext::from_config(&config, CancellationToken::new());
        assert!(ctx.users().is_empty());
        assert!(ctx.operator_key().is_none());
    }
}
