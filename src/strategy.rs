//! Fetch policies and query status.
//!
//! A [`FetchPolicy`] decides what a new subscription does when an entry for
//! its key already exists. A [`QueryStatus`] is where an entry sits in its
//! lifecycle.
//!
//! # The Three Policies
//!
//! ```
//! use survey_monitor::strategy::FetchPolicy;
//!
//! // 1. CacheFirst - reuse a successful entry (default)
//! let _p = FetchPolicy::CacheFirst;
//!
//! // 2. RefetchOnSubscribe - always refresh on mount or argument change
//! let _p = FetchPolicy::RefetchOnSubscribe;
//!
//! // 3. CacheOnly - never touch the network
//! let _p = FetchPolicy::CacheOnly;
//! ```
//!
//! | Policy | Fresh success | Stale / error / empty | In flight |
//! |--------|---------------|-----------------------|-----------|
//! | **CacheFirst** | Reuse | Fetch | Join |
//! | **RefetchOnSubscribe** | Fetch | Fetch | Join |
//! | **CacheOnly** | Reuse | Reuse | Join |

/// Policy applied when subscribing to a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// **CacheFirst**: reuse a successful, non-stale entry; fetch otherwise.
    ///
    /// Flow:
    /// 1. Look up the entry
    /// 2. If success and not stale: return it
    /// 3. If a request is in flight: join it
    /// 4. Otherwise: start a request
    #[default]
    CacheFirst,

    /// **RefetchOnSubscribe**: start a request on every new subscription,
    /// unless one is already in flight for the key. Cached data stays
    /// visible while the request runs.
    RefetchOnSubscribe,

    /// **CacheOnly**: never start a request. A missing entry stays
    /// uninitialized.
    CacheOnly,
}

impl FetchPolicy {
    /// Whether a subscription should start a request for an entry in
    /// `status`, with `stale` set by invalidation.
    pub fn should_fetch(&self, status: QueryStatus, stale: bool) -> bool {
        match self {
            FetchPolicy::CacheFirst => stale || status != QueryStatus::Success,
            FetchPolicy::RefetchOnSubscribe => true,
            FetchPolicy::CacheOnly => false,
        }
    }
}

impl std::fmt::Display for FetchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchPolicy::CacheFirst => write!(f, "CacheFirst"),
            FetchPolicy::RefetchOnSubscribe => write!(f, "RefetchOnSubscribe"),
            FetchPolicy::CacheOnly => write!(f, "CacheOnly"),
        }
    }
}

/// Lifecycle of a cache entry.
///
/// `Uninitialized → Pending → Success | Error`. A refetch moves a settled
/// entry back to `Pending` while keeping its previous data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Uninitialized,
    Pending,
    Success,
    Error,
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryStatus::Uninitialized => write!(f, "uninitialized"),
            QueryStatus::Pending => write!(f, "pending"),
            QueryStatus::Success => write!(f, "success"),
            QueryStatus::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_display() {
        assert_eq!(FetchPolicy::CacheFirst.to_string(), "CacheFirst");
        assert_eq!(
            FetchPolicy::RefetchOnSubscribe.to_string(),
            "RefetchOnSubscribe"
        );
        assert_eq!(FetchPolicy::CacheOnly.to_string(), "CacheOnly");
    }

    #[test]
    fn test_policy_default() {
        assert_eq!(FetchPolicy::default(), FetchPolicy::CacheFirst);
    }

    #[test]
    fn test_cache_first_decisions() {
        let policy = FetchPolicy::CacheFirst;
        assert!(policy.should_fetch(QueryStatus::Uninitialized, false));
        assert!(!policy.should_fetch(QueryStatus::Success, false));
        assert!(policy.should_fetch(QueryStatus::Success, true));
        assert!(policy.should_fetch(QueryStatus::Error, false));
    }

    #[test]
    fn test_other_policies() {
        assert!(FetchPolicy::RefetchOnSubscribe.should_fetch(QueryStatus::Success, false));
        assert!(!FetchPolicy::CacheOnly.should_fetch(QueryStatus::Uninitialized, true));
    }

    #[test]
    fn test_status_default() {
        assert_eq!(QueryStatus::default(), QueryStatus::Uninitialized);
        assert_eq!(QueryStatus::Pending.to_string(), "pending");
    }
}
