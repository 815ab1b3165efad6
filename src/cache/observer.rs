//! Query observer following moving arguments.

use super::subscription::{QueryState, Subscription};
use super::QueryCache;
use crate::client::Transport;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::key::QueryKeyBuilder;
use crate::strategy::FetchPolicy;
use std::sync::Arc;

/// What an observer shows for its current arguments.
pub struct ObservedState<O> {
    /// Latest data seen for the current key, or for an earlier key while the
    /// current one has none yet.
    pub data: Option<Arc<O>>,
    /// Data of the current key only.
    pub current_data: Option<Arc<O>>,
    /// First load: fetching and nothing at all to show.
    pub is_loading: bool,
    pub is_fetching: bool,
    pub is_error: bool,
    pub error: Option<Error>,
}

impl<O> Default for ObservedState<O> {
    fn default() -> Self {
        ObservedState {
            data: None,
            current_data: None,
            is_loading: false,
            is_fetching: false,
            is_error: false,
            error: None,
        }
    }
}

/// Follows one query type across argument changes.
///
/// Each [`set_args`](Self::set_args) that changes the cache key moves the
/// subscription to the new key. Only the current key's entry is ever read,
/// so a response for arguments the observer already left never shows up in
/// its state. Previous data stays visible while the new key loads.
///
/// # Example
///
/// ```no_run
/// use survey_monitor::cache::{QueryCache, QueryObserver};
/// use survey_monitor::client::InMemoryTransport;
/// use survey_monitor::endpoint::HouseholdsQuery;
/// use survey_monitor::models::HouseholdListArgs;
/// use survey_monitor::strategy::FetchPolicy;
///
/// # async fn run() {
/// let cache = QueryCache::new(InMemoryTransport::new());
/// let mut table = QueryObserver::<_, HouseholdsQuery>::new(
///     cache,
///     FetchPolicy::RefetchOnSubscribe,
/// );
///
/// table.set_args(HouseholdListArgs::new(1, 10));
/// let first = table.settled().await;
///
/// // Page 1 rows stay visible while page 2 loads.
/// table.set_args(HouseholdListArgs::new(2, 10));
/// let moving = table.state();
/// assert_eq!(moving.data.is_some(), first.data.is_some());
/// # }
/// ```
pub struct QueryObserver<T: Transport, E: Endpoint> {
    cache: QueryCache<T>,
    policy: FetchPolicy,
    args: Option<E::Args>,
    subscription: Option<Subscription<E>>,
    last_data: Option<Arc<E::Output>>,
}

impl<T: Transport, E: Endpoint> QueryObserver<T, E> {
    pub fn new(cache: QueryCache<T>, policy: FetchPolicy) -> Self {
        QueryObserver {
            cache,
            policy,
            args: None,
            subscription: None,
            last_data: None,
        }
    }

    /// Point the observer at `args`. Returns whether the cache key changed.
    ///
    /// Same-key calls are no-ops: no new subscription, no refetch.
    pub fn set_args(&mut self, args: E::Args) -> bool {
        let key = QueryKeyBuilder::build::<E>(&args);
        if self.key() == Some(key.as_str()) {
            return false;
        }

        debug!("Observer {} -> {}", E::NAME, key);
        let subscription = self.cache.subscribe_with::<E>(args.clone(), self.policy);
        // Attach to the new key before detaching from the old one.
        self.subscription = Some(subscription);
        self.args = Some(args);
        true
    }

    pub fn args(&self) -> Option<&E::Args> {
        self.args.as_ref()
    }

    pub fn key(&self) -> Option<&str> {
        self.subscription.as_ref().map(Subscription::key)
    }

    /// Raw status record of the current key.
    pub fn query_state(&self) -> Option<QueryState<E::Output>> {
        self.subscription.as_ref().map(Subscription::state)
    }

    /// Current observed state.
    pub fn state(&mut self) -> ObservedState<E::Output> {
        let Some(subscription) = &self.subscription else {
            return ObservedState {
                data: self.last_data.clone(),
                ..ObservedState::default()
            };
        };

        let current = subscription.state();
        if let Some(data) = &current.data {
            self.last_data = Some(Arc::clone(data));
        }

        ObservedState {
            data: self.last_data.clone(),
            is_loading: current.is_fetching && self.last_data.is_none(),
            is_fetching: current.is_fetching,
            is_error: current.is_error(),
            error: current.error.clone(),
            current_data: current.data,
        }
    }

    /// Wait until the current key has no request in flight.
    pub async fn settled(&mut self) -> ObservedState<E::Output> {
        if let Some(subscription) = &mut self.subscription {
            subscription.settled().await;
        }
        self.state()
    }

    /// Force a new request for the current key (queued if one is in flight).
    pub fn refetch(&self) {
        if let Some(subscription) = &self.subscription {
            subscription.refetch();
        }
    }
}
