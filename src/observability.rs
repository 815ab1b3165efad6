//! Metrics hooks and retention policy for the query cache.
//!
//! Two concerns live here:
//!
//! - **Metrics (`QueryMetrics`)**: hits, fetches, shared joins, outcomes,
//!   invalidations and evictions
//! - **Retention (`RetentionPolicy`)**: how long an entry without subscribers
//!   survives before [`prune`](crate::QueryCache::prune) evicts it
//!
//! # Metrics
//!
//! ```ignore
//! use survey_monitor::observability::QueryMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl QueryMetrics for PrometheusMetrics {
//!     fn record_success(&self, _key: &str, _duration: Duration) {
//!         // histogram!("query_latency").record(duration);
//!     }
//!     // ... other hooks keep their logging defaults
//! }
//!
//! // let cache = QueryCache::with_metrics(
//! //     transport,
//! //     CacheConfig::default(),
//! //     Arc::new(PrometheusMetrics),
//! // );
//! ```
//!
//! Every hook has a default body that logs through the `log` crate. The cache
//! defaults to [`NoOpMetrics`]; its own transition logging stays on.
//!
//! # Retention
//!
//! ```
//! use survey_monitor::observability::RetentionPolicy;
//! use std::time::Duration;
//!
//! // Keep unused entries for 60 seconds (default)
//! let _policy = RetentionPolicy::default();
//!
//! // Keep unused entries for 5 minutes
//! let _policy = RetentionPolicy::KeepUnusedFor(Duration::from_secs(300));
//!
//! // Never evict
//! let _policy = RetentionPolicy::Forever;
//! ```

use std::time::Duration;

/// Default time an unused entry is kept.
pub const DEFAULT_KEEP_UNUSED_FOR: Duration = Duration::from_secs(60);

/// Trait for query cache metrics collection.
pub trait QueryMetrics: Send + Sync {
    /// A subscription reused a cached entry without fetching.
    fn record_hit(&self, key: &str) {
        debug!("Query HIT: {}", key);
    }

    /// A new request was started for `key`.
    fn record_fetch(&self, key: &str) {
        debug!("Query FETCH: {}", key);
    }

    /// A subscription joined a request already in flight.
    fn record_shared(&self, key: &str) {
        debug!("Query SHARED: {}", key);
    }

    /// A request completed successfully.
    fn record_success(&self, key: &str, duration: Duration) {
        debug!("Query SUCCESS: {} took {:?}", key, duration);
    }

    /// A request failed.
    fn record_error(&self, key: &str, error: &str) {
        warn!("Query ERROR for {}: {}", key, error);
    }

    /// An entry was marked stale by tag invalidation.
    fn record_invalidate(&self, key: &str) {
        debug!("Query INVALIDATE: {}", key);
    }

    /// An unused entry was evicted.
    fn record_evict(&self, key: &str) {
        debug!("Query EVICT: {}", key);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl QueryMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str) {}
    fn record_fetch(&self, _key: &str) {}
    fn record_shared(&self, _key: &str) {}
    fn record_success(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
    fn record_invalidate(&self, _key: &str) {}
    fn record_evict(&self, _key: &str) {}
}

/// How long entries without subscribers are retained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Evict once unused for longer than the duration.
    KeepUnusedFor(Duration),

    /// Never evict.
    Forever,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::KeepUnusedFor(DEFAULT_KEEP_UNUSED_FOR)
    }
}

impl RetentionPolicy {
    /// Retention window, `None` for [`RetentionPolicy::Forever`].
    pub fn keep_unused_for(&self) -> Option<Duration> {
        match self {
            RetentionPolicy::KeepUnusedFor(d) => Some(*d),
            RetentionPolicy::Forever => None,
        }
    }

    /// Whether an entry unused for `idle` should be evicted.
    pub fn should_evict(&self, idle: Duration) -> bool {
        match self.keep_unused_for() {
            Some(window) => idle >= window,
            None => false,
        }
    }
}
