//! Declared query endpoints.
//!
//! An [`Endpoint`] ties together everything the cache needs to know about one
//! query type: the request it issues for given arguments, how the JSON body
//! decodes, and which tags the result is provided under.
//!
//! | Endpoint | Path | Output | Tags |
//! |----------|------|--------|------|
//! | [`GlobalStatsQuery`] | `stats/global/` | [`GlobalStat`] | `GlobalStats` |
//! | [`RegionStatsQuery`] | `stats/regions/` | `Vec<RegionStat>` | `RegionStats` |
//! | [`RegionsQuery`] | `regions/` | `Vec<Region>` | one per region + `Regions:LIST` |
//! | [`HouseholdsQuery`] | `menages/` | `Page<Household>` | one per household + `Households:LIST` |
//! | [`HouseholdQuery`] | `menages/{id}/` | [`Household`] | `Households:{id}` |
//! | [`FieldAgentsQuery`] | `enqueteurs/` | `Page<FieldAgent>` | one per agent + `FieldAgents:LIST` |

use crate::entity::list_tags;
use crate::error::Result;
use crate::models::{
    FieldAgent, FieldAgentListArgs, GlobalStat, Household, HouseholdListArgs, Page, Region,
    RegionStat,
};
use crate::params::QueryParams;
use crate::tags::{Tag, TagKind};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A GET request relative to the API base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Resource path, always ending with `/`.
    pub path: String,
    pub params: QueryParams,
}

impl Request {
    pub fn new(path: impl Into<String>) -> Self {
        Request {
            path: path.into(),
            params: QueryParams::new(),
        }
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }
}

/// Trait for declared query types.
pub trait Endpoint: Send + Sync + 'static {
    /// Arguments the query is parameterised by.
    type Args: Clone + Send + Sync + 'static;

    /// Decoded result type.
    type Output: Send + Sync + 'static;

    /// Stable endpoint name, used as the cache-key prefix.
    const NAME: &'static str;

    /// Build the request for `args`.
    fn request(args: &Self::Args) -> Request;

    /// Decode a successful response body.
    fn decode(body: Value) -> Result<Self::Output>;

    /// Tags the result is provided under. `result` is `None` when the
    /// request failed.
    fn provides_tags(result: Option<&Self::Output>, args: &Self::Args) -> Vec<Tag>;
}

fn decode_json<T: DeserializeOwned>(body: Value) -> Result<T> {
    Ok(serde_json::from_value(body)?)
}

/// Bare arrays; an empty or `null` body is an empty list.
fn decode_list<T: DeserializeOwned>(body: Value) -> Result<Vec<T>> {
    match body {
        Value::Null => Ok(Vec::new()),
        other => decode_json(other),
    }
}

/// Nationwide statistics.
pub struct GlobalStatsQuery;

impl Endpoint for GlobalStatsQuery {
    type Args = ();
    type Output = GlobalStat;
    const NAME: &'static str = "global_stats";

    fn request(_args: &()) -> Request {
        Request::new("stats/global/")
    }

    fn decode(body: Value) -> Result<GlobalStat> {
        match body {
            Value::Null => Ok(GlobalStat::default()),
            other => decode_json(other),
        }
    }

    fn provides_tags(_result: Option<&GlobalStat>, _args: &()) -> Vec<Tag> {
        vec![Tag::kind(TagKind::GlobalStats)]
    }
}

/// Per-region statistics.
pub struct RegionStatsQuery;

impl Endpoint for RegionStatsQuery {
    type Args = ();
    type Output = Vec<RegionStat>;
    const NAME: &'static str = "region_stats";

    fn request(_args: &()) -> Request {
        Request::new("stats/regions/")
    }

    fn decode(body: Value) -> Result<Vec<RegionStat>> {
        decode_list(body)
    }

    fn provides_tags(_result: Option<&Vec<RegionStat>>, _args: &()) -> Vec<Tag> {
        vec![Tag::kind(TagKind::RegionStats)]
    }
}

/// Region list (unpaginated).
pub struct RegionsQuery;

impl Endpoint for RegionsQuery {
    type Args = ();
    type Output = Vec<Region>;
    const NAME: &'static str = "regions";

    fn request(_args: &()) -> Request {
        Request::new("regions/")
    }

    fn decode(body: Value) -> Result<Vec<Region>> {
        decode_list(body)
    }

    fn provides_tags(result: Option<&Vec<Region>>, _args: &()) -> Vec<Tag> {
        list_tags(result.map(Vec::as_slice))
    }
}

/// Paginated, filterable household list.
pub struct HouseholdsQuery;

impl Endpoint for HouseholdsQuery {
    type Args = HouseholdListArgs;
    type Output = Page<Household>;
    const NAME: &'static str = "households";

    fn request(args: &HouseholdListArgs) -> Request {
        Request::new("menages/").with_params(args.to_params())
    }

    fn decode(body: Value) -> Result<Page<Household>> {
        Ok(Page::from_value(body))
    }

    fn provides_tags(result: Option<&Page<Household>>, _args: &HouseholdListArgs) -> Vec<Tag> {
        list_tags(result.map(|page| page.results.as_slice()))
    }
}

/// Single household by id.
pub struct HouseholdQuery;

impl Endpoint for HouseholdQuery {
    type Args = String;
    type Output = Household;
    const NAME: &'static str = "household";

    fn request(id: &String) -> Request {
        Request::new(format!("menages/{}/", id))
    }

    fn decode(body: Value) -> Result<Household> {
        decode_json(body)
    }

    fn provides_tags(_result: Option<&Household>, id: &String) -> Vec<Tag> {
        vec![Tag::id(TagKind::Households, id.clone())]
    }
}

/// Paginated field-agent list.
pub struct FieldAgentsQuery;

impl Endpoint for FieldAgentsQuery {
    type Args = FieldAgentListArgs;
    type Output = Page<FieldAgent>;
    const NAME: &'static str = "field_agents";

    fn request(args: &FieldAgentListArgs) -> Request {
        Request::new("enqueteurs/").with_params(args.to_params())
    }

    fn decode(body: Value) -> Result<Page<FieldAgent>> {
        Ok(Page::from_value(body))
    }

    fn provides_tags(
        result: Option<&Page<FieldAgent>>,
        _args: &FieldAgentListArgs,
    ) -> Vec<Tag> {
        list_tags(result.map(|page| page.results.as_slice()))
    }
}
