//! Cache key management utilities.

use crate::endpoint::{Endpoint, Request};

/// Builder for query cache keys.
///
/// Key format: `"{endpoint}:{path}"`, followed by `"?{canonical params}"`
/// when the request carries parameters. Two requests map to the same key
/// exactly when they hit the same endpoint, path and parameter set.
pub struct QueryKeyBuilder;

impl QueryKeyBuilder {
    /// Build the cache key for an endpoint invocation.
    pub fn build<E: Endpoint>(args: &E::Args) -> String {
        Self::build_for(E::NAME, &E::request(args))
    }

    /// Build the cache key for an already-built request.
    pub fn build_for(endpoint: &str, request: &Request) -> String {
        if request.params.is_empty() {
            format!("{}:{}", endpoint, request.path)
        } else {
            format!(
                "{}:{}?{}",
                endpoint,
                request.path,
                request.params.canonical()
            )
        }
    }

    /// Endpoint name of a key built by this builder.
    pub fn endpoint_of(key: &str) -> &str {
        key.split(':').next().unwrap_or(key)
    }
}
