//! Live view onto one cache entry.

use super::entry::{Entry, FetchContext, Snapshot};
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::strategy::QueryStatus;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::watch;

/// Status record of a query: `{data, is_loading, is_fetching, is_error, error}`.
///
/// `data` is the latest successful result for the key and survives later
/// refetches and errors.
pub struct QueryState<O> {
    pub status: QueryStatus,
    pub data: Option<Arc<O>>,
    pub error: Option<Error>,
    /// A request for the key is in flight.
    pub is_fetching: bool,
    /// The entry was invalidated and not yet refetched.
    pub is_stale: bool,
}

impl<O> QueryState<O> {
    /// First load: fetching with nothing to show yet.
    pub fn is_loading(&self) -> bool {
        self.is_fetching && self.data.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_uninitialized(&self) -> bool {
        self.status == QueryStatus::Uninitialized
    }

    pub(crate) fn from_snapshot(snapshot: Snapshot) -> Self
    where
        O: Send + Sync + 'static,
    {
        QueryState {
            status: snapshot.status,
            data: snapshot.data.and_then(|data| data.downcast::<O>().ok()),
            error: snapshot.error,
            is_fetching: snapshot.is_fetching,
            is_stale: snapshot.stale,
        }
    }
}

impl<O> Clone for QueryState<O> {
    fn clone(&self) -> Self {
        QueryState {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
        }
    }
}

impl<O: fmt::Debug> fmt::Debug for QueryState<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryState")
            .field("status", &self.status)
            .field("data", &self.data)
            .field("error", &self.error)
            .field("is_fetching", &self.is_fetching)
            .field("is_stale", &self.is_stale)
            .finish()
    }
}

/// Subscription to one (endpoint, arguments) key.
///
/// Holding a subscription keeps the entry alive and lets tag invalidation
/// refetch it. Dropping it unsubscribes.
pub struct Subscription<E: Endpoint> {
    entry: Arc<Entry>,
    ctx: FetchContext,
    changes: watch::Receiver<u64>,
    _endpoint: PhantomData<fn() -> E>,
}

impl<E: Endpoint> Subscription<E> {
    /// Wrap an entry the caller has already attached to.
    pub(crate) fn new(entry: Arc<Entry>, ctx: FetchContext) -> Self {
        let changes = entry.watch();
        Subscription {
            entry,
            ctx,
            changes,
            _endpoint: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        self.entry.key()
    }

    /// Current status record.
    pub fn state(&self) -> QueryState<E::Output> {
        QueryState::from_snapshot(self.entry.snapshot())
    }

    /// Wait for the next status change.
    pub async fn changed(&mut self) {
        // The sender lives in the entry this subscription holds.
        let _ = self.changes.changed().await;
    }

    /// Wait until no request is in flight and return the settled state.
    pub async fn settled(&mut self) -> QueryState<E::Output> {
        loop {
            self.changes.borrow_and_update();
            let state = self.state();
            if !state.is_fetching {
                return state;
            }
            if self.changes.changed().await.is_err() {
                return self.state();
            }
        }
    }

    /// Force a new request for this key. While a request is in flight, one
    /// follow-up request is queued behind it instead.
    pub fn refetch(&self) {
        self.entry.fetch(&self.ctx, true);
    }
}

impl<E: Endpoint> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.entry.detach();
        debug!("Unsubscribed from {}", self.entry.key());
    }
}
