//! Dashboard view model.
//!
//! [`Dashboard`] owns the cross-cutting UI state (selected region, table
//! pagination and filters), keeps one [`QueryObserver`] per query the page
//! needs, and turns their current states into a [`DashboardView`]:
//!
//! ```text
//! any stats/regions query on first load  → Loading
//! global or regional stats failed, no data → CriticalError
//! otherwise                               → Ready(panels)
//! ```

use crate::cache::{QueryCache, QueryObserver};
use crate::client::Transport;
use crate::endpoint::{GlobalStatsQuery, HouseholdsQuery, RegionStatsQuery, RegionsQuery};
use crate::error::Result;
use crate::models::{HouseholdStatus, Region};
use crate::stats::{region_progress, Counts, CurrentStats, RegionProgress, StatsMemo, StatusSlice};
use crate::strategy::FetchPolicy;
use crate::table::{HouseholdTableState, HouseholdTableView};
use std::sync::Arc;

/// Label of the "no region" option.
pub const ALL_REGIONS: &str = "Toutes les régions";

/// One summary card.
#[derive(Clone, Debug, PartialEq)]
pub enum StatCard {
    /// Total with rural and urban split.
    Counts { title: &'static str, counts: Counts },
    /// A single formatted value.
    Value { title: &'static str, value: String },
    /// Complete / partial / refusal counts.
    Statuses {
        title: &'static str,
        complete: u64,
        partial: u64,
        refusal: u64,
    },
}

impl StatCard {
    pub fn title(&self) -> &'static str {
        match self {
            StatCard::Counts { title, .. }
            | StatCard::Value { title, .. }
            | StatCard::Statuses { title, .. } => title,
        }
    }
}

/// Entry of the region selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionOption {
    /// Empty for [`ALL_REGIONS`].
    pub code: String,
    pub label: String,
    pub selected: bool,
}

/// Everything the ready dashboard shows.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardPanels {
    pub title: String,
    pub heading: String,
    pub stats: Arc<CurrentStats>,
    pub cards: Vec<StatCard>,
    pub chart_title: String,
    pub status_slices: Vec<StatusSlice>,
    /// Always nationwide, regardless of the selected region.
    pub region_progress: Vec<RegionProgress>,
    pub region_options: Vec<RegionOption>,
    pub table_heading: String,
    pub table: HouseholdTableView,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DashboardView {
    Loading,
    /// `"<what>: <status> <body>"` for each failed stats query.
    CriticalError { messages: Vec<String> },
    Ready(Box<DashboardPanels>),
}

/// The monitoring dashboard.
///
/// Must be created and driven inside a tokio runtime.
pub struct Dashboard<T: Transport> {
    cache: QueryCache<T>,
    global: QueryObserver<T, GlobalStatsQuery>,
    region_stats: QueryObserver<T, RegionStatsQuery>,
    regions: QueryObserver<T, RegionsQuery>,
    households: QueryObserver<T, HouseholdsQuery>,
    selected_region: String,
    table: HouseholdTableState,
    memo: StatsMemo,
}

impl<T: Transport> Dashboard<T> {
    /// Subscribe to every query of the page. Stats and regions use the
    /// cache's default policy; the household list refetches on every
    /// argument change.
    pub fn new(cache: QueryCache<T>) -> Self {
        Self::with_table(cache, HouseholdTableState::default())
    }

    /// Like [`new`](Self::new), starting from an existing table state.
    /// The table's region filter becomes the selected region.
    pub fn with_table(cache: QueryCache<T>, table: HouseholdTableState) -> Self {
        let policy = cache.config().fetch_policy;
        let mut dashboard = Dashboard {
            global: QueryObserver::new(cache.clone(), policy),
            region_stats: QueryObserver::new(cache.clone(), policy),
            regions: QueryObserver::new(cache.clone(), policy),
            households: QueryObserver::new(cache.clone(), FetchPolicy::RefetchOnSubscribe),
            selected_region: table.region_filter().unwrap_or_default().to_string(),
            table,
            memo: StatsMemo::new(),
            cache,
        };

        dashboard.global.set_args(());
        dashboard.region_stats.set_args(());
        dashboard.regions.set_args(());
        dashboard.sync_households();
        dashboard
    }

    pub fn cache(&self) -> &QueryCache<T> {
        &self.cache
    }

    pub fn selected_region(&self) -> &str {
        &self.selected_region
    }

    pub fn table_state(&self) -> &HouseholdTableState {
        &self.table
    }

    /// Select a region; empty selects the whole country. The table follows.
    pub fn select_region(&mut self, code: &str) {
        if self.selected_region == code {
            return;
        }
        info!("Selected region: {:?}", code);
        self.selected_region = code.to_string();
        if self.table.set_region_filter(Some(code)) {
            self.sync_households();
        }
    }

    pub fn set_status_filter(&mut self, status: Option<HouseholdStatus>) {
        if self.table.set_status_filter(status) {
            self.sync_households();
        }
    }

    /// Move to a zero-based page.
    pub fn set_page(&mut self, page: u32) {
        self.table.set_page(page);
        self.sync_households();
    }

    /// # Errors
    /// Returns `Error::Validation` for an unsupported page size.
    pub fn set_page_size(&mut self, page_size: u32) -> Result<()> {
        self.table.set_page_size(page_size)?;
        self.sync_households();
        Ok(())
    }

    fn sync_households(&mut self) {
        self.households.set_args(self.table.query_args());
    }

    /// Wait until no query of the page has a request in flight.
    pub async fn settle(&mut self) {
        self.global.settled().await;
        self.region_stats.settled().await;
        self.regions.settled().await;
        self.households.settled().await;
    }

    /// Current view of the page.
    pub fn view(&mut self) -> DashboardView {
        let global = self.global.state();
        let region_stats = self.region_stats.state();
        let regions = self.regions.state();

        if global.is_loading || region_stats.is_loading || regions.is_loading {
            return DashboardView::Loading;
        }

        let global_failed = global.is_error && global.data.is_none();
        let regional_failed = region_stats.is_error && region_stats.data.is_none();
        if global_failed || regional_failed {
            let mut messages = Vec::new();
            if let (true, Some(error)) = (global.is_error, &global.error) {
                messages.push(format!("Stats globales: {}", error.summary()));
            }
            if let (true, Some(error)) = (region_stats.is_error, &region_stats.error) {
                messages.push(format!("Stats régionales: {}", error.summary()));
            }
            warn!("Critical dashboard error: {}", messages.join("; "));
            return DashboardView::CriticalError { messages };
        }

        let stats = self.memo.get(
            global.data.as_ref(),
            region_stats.data.as_ref(),
            &self.selected_region,
        );

        let cards = vec![
            StatCard::Counts {
                title: "Ménages collectés",
                counts: stats.collected,
            },
            StatCard::Counts {
                title: "Ménages attendus",
                counts: stats.expected,
            },
            StatCard::Value {
                title: "Taux de couverture",
                value: stats.coverage_label(),
            },
            StatCard::Statuses {
                title: "Statuts",
                complete: stats.complete(),
                partial: stats.partial(),
                refusal: stats.refusal(),
            },
        ];

        let region_list: &[Region] = regions.data.as_deref().map(Vec::as_slice).unwrap_or(&[]);
        let table_heading = match region_list.iter().find(|r| r.code == self.selected_region) {
            Some(region) if !self.selected_region.is_empty() => {
                format!("Liste des Ménages pour {}", region.name)
            }
            _ => "Liste des Ménages (Toutes les Régions)".to_string(),
        };

        let mut region_options = vec![RegionOption {
            code: String::new(),
            label: ALL_REGIONS.to_string(),
            selected: self.selected_region.is_empty(),
        }];
        region_options.extend(region_list.iter().map(|r| RegionOption {
            code: r.code.clone(),
            label: r.name.clone(),
            selected: r.code == self.selected_region,
        }));

        let households = self.households.state();
        let table = HouseholdTableView::build(&self.table, &households);

        DashboardView::Ready(Box::new(DashboardPanels {
            title: stats.title(),
            heading: stats.heading(),
            cards,
            chart_title: stats.chart_title(),
            status_slices: stats.status_slices(),
            region_progress: region_stats
                .data
                .as_deref()
                .map(|all| region_progress(all))
                .unwrap_or_default(),
            region_options,
            table_heading,
            table,
            stats,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryTransport;
    use serde_json::json;

    fn transport() -> InMemoryTransport {
        let transport = InMemoryTransport::new();
        transport.respond("stats/global/", json!({}));
        transport.respond(
            "stats/regions/",
            json!([{"code_dr": "01", "nom_region": "DAKAR", "menages_collectes": 3, "menages_attendus": 4}]),
        );
        transport.respond("regions/", json!([{"code_dr": "01", "nom_region": "DAKAR"}]));
        transport.respond("menages/", json!({"count": 0, "results": []}));
        transport
    }

    #[tokio::test]
    async fn test_region_stats_first_load_blocks_dashboard() {
        let transport = transport();
        let gate = transport.hold("stats/regions/");
        let mut dashboard = Dashboard::new(QueryCache::new(transport));
        dashboard.global.settled().await;

        assert_eq!(dashboard.view(), DashboardView::Loading);

        gate.release();
        dashboard.settle().await;
        let DashboardView::Ready(panels) = dashboard.view() else {
            panic!("expected a ready dashboard");
        };
        assert_eq!(panels.region_progress.len(), 1);
        assert_eq!(panels.region_progress[0].label(), "75%");
    }

    #[tokio::test]
    async fn test_select_same_region_is_noop() {
        let mut dashboard = Dashboard::new(QueryCache::new(transport()));
        dashboard.settle().await;
        dashboard.select_region("");

        assert_eq!(dashboard.selected_region(), "");
        assert_eq!(dashboard.table_state().region_filter(), None);
    }
}
