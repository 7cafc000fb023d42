//! Observability hooks and entry time-to-live policies.
//!
//! # Metrics
//!
//! Implement [`CacheMetrics`] to feed region and query activity into a
//! monitoring system. Every hook has a default body that logs through the
//! `log` crate, so an implementation only overrides what it cares about:
//!
//! ```
//! use region_cache::observability::CacheMetrics;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//!
//! #[derive(Default)]
//! struct QueryCounter(AtomicUsize);
//!
//! impl CacheMetrics for QueryCounter {
//!     fn record_query(&self, _query: &str, _rows: usize, _duration: Duration) {
//!         self.0.fetch_add(1, Ordering::Relaxed);
//!     }
//! }
//! ```
//!
//! # TTL Policies
//!
//! | Policy | Entry lifetime |
//! |--------|----------------|
//! | `Default` | Backend default (no TTL for the in-memory backend) |
//! | `Fixed` | Same duration for every region |
//! | `Infinite` | Never expire |
//! | `PerRegion` | Chosen from the region name |
//!
//! A region created with `RegionFactory::entry_time_to_live` ignores the policy.

use std::time::Duration;

/// Hooks for region and query activity.
pub trait CacheMetrics: Send + Sync {
    /// A `get` found the entry.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Region HIT: {} took {:?}", key, duration);
    }

    /// A `get` found nothing (before any loader ran).
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Region MISS: {} took {:?}", key, duration);
    }

    /// An entry was written.
    fn record_put(&self, key: &str, duration: Duration) {
        debug!("Region PUT: {} took {:?}", key, duration);
    }

    /// An entry was removed.
    fn record_destroy(&self, key: &str, duration: Duration) {
        debug!("Region DESTROY: {} took {:?}", key, duration);
    }

    /// A query finished.
    fn record_query(&self, query: &str, rows: usize, duration: Duration) {
        debug!("Query `{}` returned {} rows in {:?}", query, rows, duration);
    }

    /// An operation failed.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Region ERROR for {}: {}", key, error);
    }
}

/// Metrics implementation that drops every event.
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_put(&self, _key: &str, _duration: Duration) {}
    fn record_destroy(&self, _key: &str, _duration: Duration) {}
    fn record_query(&self, _query: &str, _rows: usize, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Metrics implementation that only logs, using the trait defaults.
#[derive(Clone, Default)]
pub struct LogMetrics;

impl CacheMetrics for LogMetrics {}

/// TTL (time-to-live) policy for region entries.
#[derive(Clone, Debug, Default)]
pub enum TtlPolicy {
    /// Use backend's default TTL
    #[default]
    Default,

    /// Fixed duration for all entries
    Fixed(Duration),

    /// No TTL (entries live forever)
    Infinite,

    /// Duration chosen from the region name
    PerRegion(fn(&str) -> Duration),
}

impl TtlPolicy {
    /// Get TTL for entries of a region.
    pub fn get_ttl(&self, region: &str) -> Option<Duration> {
        match self {
            TtlPolicy::Default => None,
            TtlPolicy::Fixed(d) => Some(*d),
            TtlPolicy::Infinite => None,
            TtlPolicy::PerRegion(f) => Some(f(region)),
        }
    }
}
