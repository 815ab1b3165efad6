//! Query cache: keyed memoisation of API requests.
//!
//! # Overview
//!
//! ```text
//! subscribe::<E>(args)
//!     │
//!     ├─ prune unused entries past retention
//!     ├─ key = "{endpoint}:{path}?{params}"
//!     ├─ get or create the entry for key
//!     │
//!     ├─ request in flight?          → join it (one request per key)
//!     ├─ policy wants a fetch?       → start a request
//!     └─ otherwise                   → cache hit
//! ```
//!
//! Each entry carries a status record (`Uninitialized → Pending → Success |
//! Error`), the latest successful data, the latest error and the tags its
//! result was provided under. At most one request per key is in flight; a
//! forced refetch during one is queued behind it. Requests are stamped with
//! a per-entry id and only the latest request may write its entry.
//!
//! # Example
//!
//! ```
//! use survey_monitor::cache::QueryCache;
//! use survey_monitor::client::InMemoryTransport;
//! use survey_monitor::endpoint::GlobalStatsQuery;
//! use serde_json::json;
//!
//! # #[tokio::main] async fn main() {
//! let transport = InMemoryTransport::new();
//! transport.respond("stats/global/", json!({"menages_collectes": {"total": 100}}));
//!
//! let cache = QueryCache::new(transport.clone());
//! let mut first = cache.subscribe::<GlobalStatsQuery>(());
//! let second = cache.subscribe::<GlobalStatsQuery>(());
//!
//! let state = first.settled().await;
//! assert!(state.is_success());
//! assert_eq!(second.key(), first.key());
//! assert_eq!(transport.call_count("stats/global/"), 1);
//! # }
//! ```

mod entry;
mod observer;
mod subscription;

pub use observer::{ObservedState, QueryObserver};
pub use subscription::{QueryState, Subscription};

use crate::client::{ApiClient, Transport};
use crate::config::CacheConfig;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::key::QueryKeyBuilder;
use crate::observability::{NoOpMetrics, QueryMetrics};
use crate::strategy::{FetchPolicy, QueryStatus};
use crate::tags::{Tag, TagIndex};
use dashmap::DashMap;
use entry::{Entry, FetchContext};
use std::collections::HashSet;
use std::sync::Arc;

struct Inner<T: Transport> {
    client: ApiClient<T>,
    entries: DashMap<String, Arc<Entry>>,
    ctx: FetchContext,
    config: CacheConfig,
}

/// Query cache over a [`Transport`].
///
/// Cloning is cheap; clones share entries, the tag index and metrics.
/// Subscribing starts requests with `tokio::spawn`, so it must happen inside
/// a tokio runtime.
#[derive(Clone)]
pub struct QueryCache<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> QueryCache<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, CacheConfig::default())
    }

    pub fn with_config(transport: T, config: CacheConfig) -> Self {
        Self::with_metrics(transport, config, Arc::new(NoOpMetrics))
    }

    pub fn with_metrics(transport: T, config: CacheConfig, metrics: Arc<dyn QueryMetrics>) -> Self {
        QueryCache {
            inner: Arc::new(Inner {
                client: ApiClient::new(transport),
                entries: DashMap::new(),
                ctx: FetchContext {
                    tags: TagIndex::new(),
                    metrics,
                },
                config,
            }),
        }
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.inner.client
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn tag_index(&self) -> &TagIndex {
        &self.inner.ctx.tags
    }

    /// Subscribe with the configured default fetch policy.
    pub fn subscribe<E: Endpoint>(&self, args: E::Args) -> Subscription<E> {
        self.subscribe_with::<E>(args, self.inner.config.fetch_policy)
    }

    /// Subscribe to the entry for `args`, fetching as `policy` decides.
    ///
    /// Concurrent subscriptions to one key share a single request.
    pub fn subscribe_with<E: Endpoint>(&self, args: E::Args, policy: FetchPolicy) -> Subscription<E> {
        self.prune();

        let key = QueryKeyBuilder::build::<E>(&args);
        let entry = {
            let slot = self.inner.entries.entry(key.clone()).or_insert_with(|| {
                debug!("Query {} -> created", key);
                Arc::new(Entry::new::<E, T>(
                    key.clone(),
                    self.inner.client.clone(),
                    args,
                ))
            });
            // Attached under the shard lock so a concurrent prune cannot
            // evict it first.
            slot.attach();
            Arc::clone(slot.value())
        };

        let snapshot = entry.snapshot();
        if snapshot.is_fetching || policy.should_fetch(snapshot.status, snapshot.stale) {
            entry.fetch(&self.inner.ctx, false);
        } else {
            debug!("Query {} -> hit ({})", key, snapshot.status);
            self.inner.ctx.metrics.record_hit(&key);
        }

        Subscription::new(entry, self.inner.ctx.clone())
    }

    /// One-shot query: subscribe, wait until settled and unsubscribe.
    ///
    /// # Errors
    /// The entry's error, or `Error::Other` if the entry is uninitialized
    /// (only possible with [`FetchPolicy::CacheOnly`]).
    pub async fn query<E: Endpoint>(&self, args: E::Args) -> Result<Arc<E::Output>> {
        let mut subscription = self.subscribe::<E>(args);
        let state = subscription.settled().await;
        match (state.data, state.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Err(Error::Other(format!(
                "{} has no data",
                subscription.key()
            ))),
        }
    }

    /// Mark every entry provided under one of `tags` stale.
    ///
    /// Stale entries with live subscribers are refetched immediately, or
    /// right after the request already in flight; the others refetch on next
    /// subscription. Returns the number of entries invalidated.
    pub fn invalidate_tags(&self, tags: &[Tag]) -> usize {
        let keys: HashSet<String> = tags
            .iter()
            .flat_map(|tag| self.inner.ctx.tags.keys_for(tag))
            .collect();

        let mut invalidated = 0;
        for key in keys {
            let Some(entry) = self.inner.entries.get(&key).map(|e| Arc::clone(e.value())) else {
                continue;
            };
            invalidated += 1;
            self.inner.ctx.metrics.record_invalidate(&key);

            if entry.mark_stale() {
                debug!("Query {} -> stale, refetching", key);
                entry.fetch(&self.inner.ctx, true);
            } else {
                debug!("Query {} -> stale", key);
            }
        }

        if invalidated > 0 {
            let names: Vec<String> = tags.iter().map(Tag::to_string).collect();
            info!("Invalidated {} entries for [{}]", invalidated, names.join(", "));
        }
        invalidated
    }

    /// Evict entries without subscribers that have been unused longer than
    /// the retention window. Returns the number evicted.
    pub fn prune(&self) -> usize {
        let retention = &self.inner.config.retention;
        let mut evicted = Vec::new();
        self.inner.entries.retain(|key, entry| {
            if entry.is_evictable(retention) {
                evicted.push((key.clone(), entry.tags()));
                false
            } else {
                true
            }
        });

        for (key, tags) in &evicted {
            self.inner.ctx.tags.unregister(key, tags);
            self.inner.ctx.metrics.record_evict(key);
            debug!("Query {} -> evicted", key);
        }
        evicted.len()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Status of the entry for `key`, if present.
    pub fn entry_status(&self, key: &str) -> Option<QueryStatus> {
        self.inner.entries.get(key).map(|e| e.snapshot().status)
    }

    /// Whether the entry for `key` is marked stale.
    pub fn is_stale(&self, key: &str) -> Option<bool> {
        self.inner.entries.get(key).map(|e| e.snapshot().stale)
    }

    /// Live subscribers of the entry for `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.inner
            .entries
            .get(key)
            .map(|e| e.subscribers())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryTransport;
    use crate::endpoint::{GlobalStatsQuery, HouseholdsQuery, RegionsQuery};
    use crate::models::HouseholdListArgs;
    use crate::observability::RetentionPolicy;
    use crate::tags::TagKind;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn households_body(ids: &[&str]) -> serde_json::Value {
        let rows: Vec<_> = ids.iter().map(|id| json!({"idmng": id})).collect();
        json!({"count": ids.len(), "results": rows})
    }

    #[tokio::test]
    async fn test_cache_hit_does_not_refetch() {
        let transport = InMemoryTransport::new();
        transport.respond("regions/", json!([{"code_dr": "01", "nom_region": "DAKAR"}]));
        let cache = QueryCache::new(transport.clone());

        let mut first = cache.subscribe::<RegionsQuery>(());
        first.settled().await;
        let second = cache.subscribe::<RegionsQuery>(());

        assert!(second.state().is_success());
        assert_eq!(transport.call_count("regions/"), 1);
        assert_eq!(cache.subscriber_count(first.key()), 2);
    }

    #[tokio::test]
    async fn test_query_one_shot() {
        let transport = InMemoryTransport::new();
        transport.respond("stats/global/", json!({"menages_collectes": {"total": 7}}));
        let cache = QueryCache::new(transport);

        let stats = cache
            .query::<GlobalStatsQuery>(())
            .await
            .expect("Failed to query");
        assert_eq!(stats.collected.as_ref().and_then(|c| c.total), Some(7));
        assert_eq!(cache.subscriber_count("global_stats:stats/global/"), 0);
    }

    #[tokio::test]
    async fn test_query_one_shot_error() {
        let cache = QueryCache::new(InMemoryTransport::new());
        let err = cache.query::<RegionsQuery>(()).await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(cache.entry_status("regions:regions/"), Some(QueryStatus::Error));
    }

    #[tokio::test]
    async fn test_invalidate_refetches_subscribed_entries() {
        let transport = InMemoryTransport::new();
        transport.respond("menages/", households_body(&["A", "B"]));
        transport.respond("stats/global/", json!({}));
        let cache = QueryCache::new(transport.clone());

        let mut households = cache.subscribe::<HouseholdsQuery>(HouseholdListArgs::default());
        let mut global = cache.subscribe::<GlobalStatsQuery>(());
        households.settled().await;
        global.settled().await;

        let count = cache.invalidate_tags(&[Tag::id(TagKind::Households, "B")]);
        assert_eq!(count, 1);
        households.settled().await;

        assert_eq!(transport.call_count("menages/"), 2);
        assert_eq!(transport.call_count("stats/global/"), 1);
        assert_eq!(cache.is_stale(households.key()), Some(false));
    }

    #[tokio::test]
    async fn test_invalidate_unsubscribed_refetches_on_next_access() {
        let transport = InMemoryTransport::new();
        transport.respond("stats/global/", json!({}));
        let cache = QueryCache::new(transport.clone());

        cache.query::<GlobalStatsQuery>(()).await.expect("Failed to query");
        assert_eq!(cache.invalidate_tags(&[Tag::kind(TagKind::GlobalStats)]), 1);
        assert_eq!(cache.is_stale("global_stats:stats/global/"), Some(true));
        assert_eq!(transport.call_count("stats/global/"), 1);

        let mut again = cache.subscribe::<GlobalStatsQuery>(());
        again.settled().await;
        assert_eq!(transport.call_count("stats/global/"), 2);
    }

    #[tokio::test]
    async fn test_prune_evicts_only_unused_entries() {
        let transport = InMemoryTransport::new();
        transport.respond("stats/global/", json!({}));
        transport.respond("regions/", json!([]));
        let config =
            CacheConfig::default().with_retention(RetentionPolicy::KeepUnusedFor(Duration::ZERO));
        let cache = QueryCache::with_config(transport, config);

        let mut kept = cache.subscribe::<GlobalStatsQuery>(());
        kept.settled().await;
        cache.query::<RegionsQuery>(()).await.expect("Failed to query");
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.prune(), 1);
        assert!(cache.contains_key("global_stats:stats/global/"));
        assert!(!cache.contains_key("regions:regions/"));
        assert_eq!(cache.tag_index().len(), 1);
    }

    #[tokio::test]
    async fn test_refetch_forces_request() {
        let transport = InMemoryTransport::new();
        transport.respond("regions/", json!([]));
        let cache = QueryCache::new(transport.clone());

        let mut regions = cache.subscribe::<RegionsQuery>(());
        regions.settled().await;
        regions.refetch();
        assert!(regions.state().is_fetching);
        regions.settled().await;

        assert_eq!(transport.call_count("regions/"), 2);
    }

    #[tokio::test]
    async fn test_refetch_while_in_flight_is_queued() {
        let transport = InMemoryTransport::new();
        transport.respond("regions/", json!([]));
        let gate = transport.hold("regions/");
        let cache = QueryCache::new(transport.clone());

        let mut regions = cache.subscribe::<RegionsQuery>(());
        regions.refetch();
        regions.refetch();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.call_count("regions/"), 1);

        gate.release();
        assert!(regions.settled().await.is_success());
        assert_eq!(transport.call_count("regions/"), 2);
    }

    #[tokio::test]
    async fn test_invalidate_while_in_flight_is_queued() {
        let transport = InMemoryTransport::new();
        transport.respond("menages/", households_body(&["A"]));
        let cache = QueryCache::new(transport.clone());

        let mut households = cache.subscribe::<HouseholdsQuery>(HouseholdListArgs::default());
        households.settled().await;

        let gate = transport.hold("menages/");
        households.refetch();
        assert_eq!(cache.invalidate_tags(&[Tag::list(TagKind::Households)]), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.call_count("menages/"), 2);

        gate.release();
        households.settled().await;
        assert_eq!(transport.call_count("menages/"), 3);
        assert_eq!(cache.is_stale(households.key()), Some(false));
    }

    #[derive(Default)]
    struct CountingMetrics {
        hits: AtomicUsize,
        fetches: AtomicUsize,
        shared: AtomicUsize,
        successes: AtomicUsize,
    }

    impl QueryMetrics for CountingMetrics {
        fn record_hit(&self, _key: &str) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        fn record_fetch(&self, _key: &str) {
            self.fetches.fetch_add(1, Ordering::SeqCst);
        }
        fn record_shared(&self, _key: &str) {
            self.shared.fetch_add(1, Ordering::SeqCst);
        }
        fn record_success(&self, _key: &str, _duration: Duration) {
            self.successes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_metrics_hooks() {
        let transport = InMemoryTransport::new();
        transport.respond("regions/", json!([]));
        let gate = transport.hold("regions/");
        let metrics = Arc::new(CountingMetrics::default());
        let cache = QueryCache::with_metrics(transport, CacheConfig::default(), metrics.clone());

        let mut first = cache.subscribe::<RegionsQuery>(());
        let _second = cache.subscribe::<RegionsQuery>(());
        gate.release();
        first.settled().await;
        let _third = cache.subscribe::<RegionsQuery>(());

        assert_eq!(metrics.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.shared.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.successes.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_only_never_fetches() {
        let transport = InMemoryTransport::new();
        let cache = QueryCache::new(transport.clone());

        let subscription = cache.subscribe_with::<RegionsQuery>((), FetchPolicy::CacheOnly);
        assert!(subscription.state().is_uninitialized());
        assert!(transport.calls().is_empty());
    }
}
