//! API client and transport implementations.

use crate::endpoint::{
    Endpoint, FieldAgentsQuery, GlobalStatsQuery, HouseholdQuery, HouseholdsQuery, RegionStatsQuery,
    RegionsQuery,
};
use crate::error::Result;
use crate::models::{
    FieldAgent, FieldAgentListArgs, GlobalStat, Household, HouseholdListArgs, Page, Region,
    RegionStat,
};
use crate::params::QueryParams;
use serde_json::Value;
use std::future::Future;

pub mod http;
pub mod inmemory;

pub use http::HttpTransport;
pub use inmemory::{Gate, InMemoryTransport, RecordedCall};

/// Trait for transport implementations.
///
/// Abstracts the single operation the client needs: a GET of a resource path
/// relative to the API base URL. Implementations: [`HttpTransport`]
/// (default), [`InMemoryTransport`] (tests, demos).
///
/// **IMPORTANT:** Empty parameter values never reach a transport; they are
/// dropped by [`QueryParams`] on insertion.
///
/// No retries and no recovery: failures surface to the caller as-is.
pub trait Transport: Send + Sync + Clone + 'static {
    /// GET `path` with `params` as the query string.
    ///
    /// # Returns
    /// - `Ok(value)` - Parsed JSON body of a 2xx response (`Null` if empty)
    ///
    /// # Errors
    /// - `Error::Transport` if no response was received
    /// - `Error::Http` for a non-2xx status
    /// - `Error::Decode` if a 2xx body is not JSON
    fn get(
        &self,
        path: &str,
        params: &QueryParams,
    ) -> impl Future<Output = Result<Value>> + Send;
}

/// Typed API client.
///
/// Every operation goes through the declared [`Endpoint`]s, so the client and
/// the query cache issue byte-identical requests.
#[derive(Clone)]
pub struct ApiClient<T: Transport> {
    transport: T,
}

impl<T: Transport> ApiClient<T> {
    pub fn new(transport: T) -> Self {
        ApiClient { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issue the request declared by `E` and decode its body.
    ///
    /// # Errors
    /// Propagates transport errors and `Error::Decode` on malformed bodies.
    pub async fn fetch<E: Endpoint>(&self, args: &E::Args) -> Result<E::Output> {
        let request = E::request(args);
        debug!("» {} GET {}", E::NAME, request.path);
        let body = self.transport.get(&request.path, &request.params).await?;
        E::decode(body)
    }

    pub async fn global_stats(&self) -> Result<GlobalStat> {
        self.fetch::<GlobalStatsQuery>(&()).await
    }

    pub async fn region_stats(&self) -> Result<Vec<RegionStat>> {
        self.fetch::<RegionStatsQuery>(&()).await
    }

    pub async fn regions(&self) -> Result<Vec<Region>> {
        self.fetch::<RegionsQuery>(&()).await
    }

    pub async fn households(&self, args: &HouseholdListArgs) -> Result<Page<Household>> {
        self.fetch::<HouseholdsQuery>(args).await
    }

    pub async fn household(&self, id: &str) -> Result<Household> {
        self.fetch::<HouseholdQuery>(&id.to_string()).await
    }

    pub async fn field_agents(&self, args: &FieldAgentListArgs) -> Result<Page<FieldAgent>> {
        self.fetch::<FieldAgentsQuery>(args).await
    }
}
