//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Prices**: Mutator ticks
//! - **Broadcast**: Published and skipped snapshots, live subscribers,
//!   evictions and publish latency
//! - **Orders**: Accepted and rejected submissions
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP port. Recording before
//! [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Repeated calls return the handle installed by the first one.
///
/// # Panics
///
/// Panics if the recorder cannot be installed.
#[allow(clippy::expect_used)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder");

            register_metrics();
            handle
        })
        .clone()
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "dashboard_price_ticks_total",
        "Total price ticks applied by the mutator"
    );

    describe_counter!(
        "dashboard_snapshots_published_total",
        "Total snapshots delivered to subscribers"
    );
    describe_counter!(
        "dashboard_snapshots_skipped_total",
        "Snapshots not delivered because the subscriber already had a newer one"
    );
    describe_gauge!(
        "dashboard_subscribers",
        "Number of live streaming subscribers"
    );
    describe_counter!(
        "dashboard_subscriber_evictions_total",
        "Subscribers removed after a failed or timed-out send"
    );
    describe_histogram!(
        "dashboard_publish_duration_seconds",
        "Time to push one snapshot to every subscriber"
    );

    describe_counter!("dashboard_orders_total", "Total accepted orders by side");
    describe_counter!(
        "dashboard_orders_rejected_total",
        "Total rejected orders by validation reason"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one applied price tick.
pub fn record_price_tick() {
    counter!("dashboard_price_ticks_total").increment(1);
}

/// Record snapshots delivered by one publish.
pub fn record_snapshots_published(count: u64) {
    counter!("dashboard_snapshots_published_total").increment(count);
}

/// Record snapshots skipped by sequence gating.
pub fn record_snapshots_skipped(count: u64) {
    counter!("dashboard_snapshots_skipped_total").increment(count);
}

/// Update the live subscriber count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribers(count: usize) {
    gauge!("dashboard_subscribers").set(count as f64);
}

/// Record an evicted subscriber.
pub fn record_subscriber_evicted(reason: &'static str) {
    counter!(
        "dashboard_subscriber_evictions_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record how long a publish took.
pub fn record_publish_duration(duration: Duration) {
    histogram!("dashboard_publish_duration_seconds").record(duration.as_secs_f64());
}

/// Record an accepted order.
pub fn record_order_accepted(side: &'static str) {
    counter!("dashboard_orders_total", "side" => side).increment(1);
}

/// Record a rejected order.
pub fn record_order_rejected(reason: &'static str) {
    counter!("dashboard_orders_rejected_total", "reason" => reason).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
