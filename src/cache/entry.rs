//! One cache entry: status record, data and the in-flight request.

use crate::client::{ApiClient, Transport};
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::observability::{QueryMetrics, RetentionPolicy};
use crate::strategy::QueryStatus;
use crate::tags::{Tag, TagIndex};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::any::Any;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;

/// Decoded result of any endpoint.
pub(crate) type AnyData = Arc<dyn Any + Send + Sync>;

/// What a finished request hands back to its entry.
#[derive(Clone)]
pub(crate) struct LoadOutcome {
    pub(crate) result: Result<AnyData, Error>,
    pub(crate) tags: Vec<Tag>,
}

pub(crate) type InFlight = Shared<BoxFuture<'static, LoadOutcome>>;

type Loader = Box<dyn Fn() -> BoxFuture<'static, LoadOutcome> + Send + Sync>;

/// State shared by every entry of one cache.
#[derive(Clone)]
pub(crate) struct FetchContext {
    pub(crate) tags: TagIndex,
    pub(crate) metrics: Arc<dyn QueryMetrics>,
}

/// Point-in-time copy of an entry's status record.
#[derive(Clone)]
pub(crate) struct Snapshot {
    pub(crate) status: QueryStatus,
    pub(crate) data: Option<AnyData>,
    pub(crate) error: Option<Error>,
    pub(crate) is_fetching: bool,
    pub(crate) stale: bool,
}

struct EntryState {
    status: QueryStatus,
    data: Option<AnyData>,
    error: Option<Error>,
    tags: Vec<Tag>,
    stale: bool,
    /// Id of the latest request issued for this key.
    request_id: u64,
    in_flight: Option<InFlight>,
    /// A forced fetch arrived while a request was in flight.
    refetch_queued: bool,
    subscribers: usize,
    last_used: Instant,
}

pub(crate) struct Entry {
    key: String,
    loader: Loader,
    state: Mutex<EntryState>,
    version: watch::Sender<u64>,
}

impl Entry {
    /// Entry for `E` with fixed `args`. The loader owns a client clone and the
    /// arguments; it never refers back to the cache.
    pub(crate) fn new<E: Endpoint, T: Transport>(
        key: String,
        client: ApiClient<T>,
        args: E::Args,
    ) -> Self {
        let loader: Loader = Box::new(move || {
            let client = client.clone();
            let args = args.clone();
            async move {
                let result = client.fetch::<E>(&args).await;
                let tags = E::provides_tags(result.as_ref().ok(), &args);
                LoadOutcome {
                    result: result.map(|data| Arc::new(data) as AnyData),
                    tags,
                }
            }
            .boxed()
        });

        let (version, _rx) = watch::channel(0);
        Entry {
            key,
            loader,
            state: Mutex::new(EntryState {
                status: QueryStatus::Uninitialized,
                data: None,
                error: None,
                tags: Vec::new(),
                stale: false,
                request_id: 0,
                in_flight: None,
                refetch_queued: false,
                subscribers: 0,
                last_used: Instant::now(),
            }),
            version,
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    pub(crate) fn watch(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub(crate) fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        Snapshot {
            status: state.status,
            data: state.data.clone(),
            error: state.error.clone(),
            is_fetching: state.in_flight.is_some(),
            stale: state.stale,
        }
    }

    pub(crate) fn tags(&self) -> Vec<Tag> {
        self.lock().tags.clone()
    }

    pub(crate) fn attach(&self) {
        let mut state = self.lock();
        state.subscribers += 1;
        state.last_used = Instant::now();
    }

    pub(crate) fn detach(&self) {
        let mut state = self.lock();
        state.subscribers = state.subscribers.saturating_sub(1);
        state.last_used = Instant::now();
    }

    pub(crate) fn subscribers(&self) -> usize {
        self.lock().subscribers
    }

    /// Mark stale. Returns whether live subscribers want an immediate refetch.
    pub(crate) fn mark_stale(&self) -> bool {
        let mut state = self.lock();
        state.stale = true;
        state.subscribers > 0
    }

    pub(crate) fn is_evictable(&self, retention: &RetentionPolicy) -> bool {
        let state = self.lock();
        state.subscribers == 0
            && state.in_flight.is_none()
            && retention.should_evict(state.last_used.elapsed())
    }

    /// Start a request, or join the one in flight. With `force` set, a
    /// request in flight is followed by one more once it completes.
    pub(crate) fn fetch(self: &Arc<Self>, ctx: &FetchContext, force: bool) {
        drop(self.fetch_shared(ctx, force));
    }

    /// Like [`fetch`](Self::fetch), returning a handle on the request's
    /// outcome. Dropping the handle does not cancel the request.
    ///
    /// At most one request per key is in flight. A forced fetch during a
    /// request joins it and queues one follow-up request, started when the
    /// current one completes.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn fetch_shared(self: &Arc<Self>, ctx: &FetchContext, force: bool) -> InFlight {
        let mut state = self.lock();
        if let Some(in_flight) = state.in_flight.clone() {
            if force {
                state.refetch_queued = true;
                debug!(
                    "Query {} -> refetch queued behind request #{}",
                    self.key, state.request_id
                );
            } else {
                ctx.metrics.record_shared(&self.key);
            }
            return in_flight;
        }

        state.request_id += 1;
        let request_id = state.request_id;
        state.status = QueryStatus::Pending;
        state.stale = false;

        let request = (self.loader)().shared();
        state.in_flight = Some(request.clone());
        drop(state);

        debug!("Query {} -> pending (request #{})", self.key, request_id);
        ctx.metrics.record_fetch(&self.key);
        self.notify();

        let entry = Arc::clone(self);
        let ctx = ctx.clone();
        let completion = request.clone();
        let started = Instant::now();
        tokio::spawn(async move {
            let outcome = completion.await;
            entry.complete(request_id, outcome, started, &ctx);
        });

        request
    }

    fn complete(
        self: &Arc<Self>,
        request_id: u64,
        outcome: LoadOutcome,
        started: Instant,
        ctx: &FetchContext,
    ) {
        let mut state = self.lock();
        if state.request_id != request_id {
            debug!(
                "Query {}: discarding response of request #{} (latest is #{})",
                self.key, request_id, state.request_id
            );
            return;
        }

        state.in_flight = None;
        let refetch = std::mem::take(&mut state.refetch_queued);
        let previous = std::mem::replace(&mut state.tags, outcome.tags);
        ctx.tags.unregister(&self.key, &previous);
        ctx.tags.register(&self.key, &state.tags);

        match outcome.result {
            Ok(data) => {
                state.status = QueryStatus::Success;
                state.data = Some(data);
                state.error = None;
                drop(state);
                info!("✓ Query {} -> success in {:?}", self.key, started.elapsed());
                ctx.metrics.record_success(&self.key, started.elapsed());
            }
            Err(error) => {
                // Previous data stays readable next to the error.
                state.status = QueryStatus::Error;
                state.error = Some(error.clone());
                drop(state);
                warn!("✗ Query {} -> error: {}", self.key, error);
                ctx.metrics.record_error(&self.key, &error.to_string());
            }
        }

        if refetch {
            debug!("Query {} -> starting queued refetch", self.key);
            self.fetch(ctx, false);
        } else {
            self.notify();
        }
    }
}
