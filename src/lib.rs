//! # survey-monitor
//!
//! Client-side core of a household-survey monitoring dashboard.
//!
//! ## Features
//!
//! - **Typed API client:** GET requests over a pluggable [`Transport`]
//!   (reqwest in production, in-memory in tests), structured errors
//! - **Query cache:** keyed memoisation, one in-flight request per key,
//!   status records, tag-based invalidation, stale-response discard
//! - **Derived statistics:** national or regional figures from raw stats,
//!   memoised on their inputs
//! - **View model:** table pagination and filters, dashboard panels
//!
//! ## Quick Start
//!
//! ```no_run
//! use survey_monitor::{
//!     client::HttpTransport, config::ClientConfig, view::DashboardView, Dashboard, QueryCache,
//! };
//!
//! # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(ClientConfig::from_env())?;
//! let cache = QueryCache::new(transport);
//!
//! let mut dashboard = Dashboard::new(cache);
//! dashboard.select_region("01");
//! dashboard.settle().await;
//!
//! if let DashboardView::Ready(panels) = dashboard.view() {
//!     println!("{} ({})", panels.title, panels.stats.coverage_label());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Lower-level: the cache alone
//!
//! ```ignore
//! let cache = QueryCache::new(transport);
//! let mut page = cache.subscribe::<HouseholdsQuery>(HouseholdListArgs::new(1, 10));
//! let state = page.settled().await;
//! cache.invalidate_tags(&[Tag::list(TagKind::Households)]);
//! ```

#[macro_use]
extern crate log;

pub mod cache;
pub mod client;
pub mod config;
pub mod endpoint;
pub mod entity;
pub mod error;
pub mod key;
pub mod models;
pub mod observability;
pub mod params;
pub mod stats;
pub mod strategy;
pub mod table;
pub mod tags;
pub mod view;

// Re-exports for convenience
pub use cache::{QueryCache, QueryObserver, QueryState, Subscription};
pub use client::{ApiClient, Transport};
pub use endpoint::Endpoint;
pub use entity::ApiEntity;
pub use error::{Error, Result};
pub use params::QueryParams;
pub use stats::CurrentStats;
pub use strategy::FetchPolicy;
pub use table::HouseholdTableState;
pub use tags::{Tag, TagKind};
pub use view::Dashboard;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
