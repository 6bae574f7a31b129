//! Prometheus metrics for the cache engine.
//!
//! The recording functions are no-ops until a recorder is installed, either
//! by [`init_metrics`] or by the embedding application.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "tiercache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "tiercache_misses_total";
    pub const LOADER_CALLS_TOTAL: &str = "tiercache_loader_calls_total";
    pub const LOCK_CONTENTION_TOTAL: &str = "tiercache_lock_contention_total";
    pub const REFRESHERS: &str = "tiercache_refreshers";
}

/// Tier label values.
pub mod tier {
    pub const MEMORY: &str = "memory";
    pub const REMOTE: &str = "remote";
}

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized
/// or another recorder is installed.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

/// Record a cache hit in the given tier.
pub fn record_cache_hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

/// Record a miss in both tiers.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

pub fn record_loader_call() {
    counter!(names::LOADER_CALLS_TOTAL).increment(1);
}

/// Record a lock attempt that found the lock held.
pub fn record_lock_contention() {
    counter!(names::LOCK_CONTENTION_TOTAL).increment(1);
}

/// Set the number of registered background refreshers.
pub fn set_refreshers(count: usize) {
    gauge!(names::REFRESHERS).set(count as f64);
}
