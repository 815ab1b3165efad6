//! Household table: pagination and filter state, and its rendered form.

use crate::cache::ObservedState;
use crate::error::{Error, Result};
use crate::models::{Household, HouseholdListArgs, HouseholdStatus, Page};
use crate::stats::StatusTone;

/// Page sizes offered by the table.
pub const PAGE_SIZES: [u32; 4] = [5, 10, 25, 50];

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Placeholder for missing cells.
pub const MISSING: &str = "N/A";

/// Pagination cursor and filters of the household table.
///
/// `page` is zero-based; the query sent to the API is one-based. Any actual
/// change of the region or status filter, or of the page size, moves back
/// to the first page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HouseholdTableState {
    page: u32,
    page_size: u32,
    region_filter: Option<String>,
    status_filter: Option<HouseholdStatus>,
}

impl Default for HouseholdTableState {
    fn default() -> Self {
        HouseholdTableState {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            region_filter: None,
            status_filter: None,
        }
    }
}

impl HouseholdTableState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn region_filter(&self) -> Option<&str> {
        self.region_filter.as_deref()
    }

    pub fn status_filter(&self) -> Option<HouseholdStatus> {
        self.status_filter
    }

    /// Set the region filter; an empty code clears it. Returns whether it
    /// changed.
    pub fn set_region_filter(&mut self, code: Option<&str>) -> bool {
        let code = code.filter(|c| !c.is_empty()).map(str::to_string);
        if code == self.region_filter {
            return false;
        }
        debug!("Table region filter {:?} -> {:?}", self.region_filter, code);
        self.region_filter = code;
        self.page = 0;
        true
    }

    /// Set the status filter. Returns whether it changed.
    pub fn set_status_filter(&mut self, status: Option<HouseholdStatus>) -> bool {
        if status == self.status_filter {
            return false;
        }
        debug!("Table status filter {:?} -> {:?}", self.status_filter, status);
        self.status_filter = status;
        self.page = 0;
        true
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    /// # Errors
    /// Returns `Error::Validation` for a size outside [`PAGE_SIZES`].
    pub fn set_page_size(&mut self, page_size: u32) -> Result<()> {
        if !PAGE_SIZES.contains(&page_size) {
            return Err(Error::Validation(format!(
                "page size {} not in {:?}",
                page_size, PAGE_SIZES
            )));
        }
        if page_size != self.page_size {
            self.page_size = page_size;
            self.page = 0;
        }
        Ok(())
    }

    /// Arguments of the household list query for this state.
    pub fn query_args(&self) -> HouseholdListArgs {
        HouseholdListArgs {
            page: self.page + 1,
            page_size: self.page_size,
            region_code: self.region_filter.clone(),
            status: self.status_filter,
        }
    }

    /// Number of pages needed for `total` rows.
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.page_size.max(1)))
    }
}

/// One displayed household row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HouseholdRow {
    pub id: String,
    pub region: String,
    pub status: String,
    pub tone: StatusTone,
    pub head_of_household: String,
    /// `dd/mm/yyyy`, or `N/A`.
    pub survey_date: String,
}

impl From<&Household> for HouseholdRow {
    fn from(h: &Household) -> Self {
        let status = h.status.clone().unwrap_or_else(|| MISSING.to_string());
        HouseholdRow {
            id: h.id.clone(),
            region: h.region_name.clone().unwrap_or_default(),
            tone: match &h.status {
                Some(label) => StatusTone::for_label(label),
                None => StatusTone::Neutral,
            },
            status,
            head_of_household: h.head_of_household_name.clone().unwrap_or_default(),
            survey_date: h
                .survey_date
                .map(|d| d.format("%d/%m/%Y").to_string())
                .unwrap_or_else(|| MISSING.to_string()),
        }
    }
}

/// Alert text for a failed household page.
pub fn error_alert(error: Option<&Error>) -> String {
    let details = error
        .and_then(|e| e.detail().map(str::to_string).or_else(|| e.status_label()))
        .unwrap_or_else(|| "Erreur inconnue".to_string());
    format!("Erreur lors du chargement des ménages. Détails: {}", details)
}

/// Table contents ready to render.
#[derive(Clone, Debug, PartialEq)]
pub struct HouseholdTable {
    pub rows: Vec<HouseholdRow>,
    pub total: u64,
    /// Zero-based.
    pub page: u32,
    pub page_size: u32,
    pub page_count: u64,
    pub status_filter: Option<HouseholdStatus>,
    /// A request is in flight; rows may belong to the previous arguments.
    pub loading: bool,
    pub alert: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum HouseholdTableView {
    /// First load, nothing to show yet.
    Loading,
    Ready(HouseholdTable),
}

impl HouseholdTableView {
    pub fn build(state: &HouseholdTableState, observed: &ObservedState<Page<Household>>) -> Self {
        if observed.is_loading {
            return HouseholdTableView::Loading;
        }

        let (rows, total) = match &observed.data {
            Some(page) => (page.results.iter().map(HouseholdRow::from).collect(), page.count),
            None => (Vec::new(), 0),
        };

        HouseholdTableView::Ready(HouseholdTable {
            rows,
            total,
            page: state.page(),
            page_size: state.page_size(),
            page_count: state.page_count(total),
            status_filter: state.status_filter(),
            loading: observed.is_fetching,
            alert: observed
                .is_error
                .then(|| error_alert(observed.error.as_ref())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn household(id: &str, status: Option<&str>) -> Household {
        Household {
            id: id.to_string(),
            region_name: Some("DAKAR".to_string()),
            status: status.map(str::to_string),
            status_code: None,
            head_of_household_name: Some("Awa Ndiaye".to_string()),
            survey_date: NaiveDate::from_ymd_opt(2024, 3, 7),
            field_agent_name: None,
        }
    }

    #[test]
    fn test_defaults() {
        let state = HouseholdTableState::new();
        assert_eq!(state.page(), 0);
        assert_eq!(state.page_size(), 10);
        assert_eq!(state.query_args(), HouseholdListArgs::new(1, 10));
    }

    #[test]
    fn test_filter_change_resets_page() {
        let mut state = HouseholdTableState::new();
        state.set_page(3);
        assert!(state.set_status_filter(Some(HouseholdStatus::Complete)));
        assert_eq!(state.page(), 0);

        state.set_page(2);
        assert!(state.set_region_filter(Some("01")));
        assert_eq!(state.page(), 0);

        let args = state.query_args();
        assert_eq!(args.page, 1);
        assert_eq!(args.region_code.as_deref(), Some("01"));
        assert_eq!(args.status, Some(HouseholdStatus::Complete));
    }

    #[test]
    fn test_same_filter_is_noop() {
        let mut state = HouseholdTableState::new();
        state.set_region_filter(Some("01"));
        state.set_page(4);

        assert!(!state.set_region_filter(Some("01")));
        assert!(!state.set_status_filter(None));
        assert_eq!(state.page(), 4);
    }

    #[test]
    fn test_empty_region_clears_filter() {
        let mut state = HouseholdTableState::new();
        state.set_region_filter(Some("01"));
        assert!(state.set_region_filter(Some("")));
        assert_eq!(state.region_filter(), None);
        assert!(!state.query_args().to_params().contains("region__code_dr"));
    }

    #[test]
    fn test_page_size_validation() {
        let mut state = HouseholdTableState::new();
        state.set_page(2);
        assert!(state.set_page_size(7).is_err());
        assert_eq!(state.page(), 2);

        state.set_page_size(25).expect("Failed to set page size");
        assert_eq!(state.page_size(), 25);
        assert_eq!(state.page(), 0);
    }

    #[test]
    fn test_page_count() {
        let state = HouseholdTableState::new();
        assert_eq!(state.page_count(0), 0);
        assert_eq!(state.page_count(10), 1);
        assert_eq!(state.page_count(11), 2);
    }

    #[test]
    fn test_row_formatting() {
        let row = HouseholdRow::from(&household("MNG1", Some("COMPLET")));
        assert_eq!(row.survey_date, "07/03/2024");
        assert_eq!(row.tone, StatusTone::Success);

        let mut bare = household("MNG2", None);
        bare.survey_date = None;
        let row = HouseholdRow::from(&bare);
        assert_eq!(row.status, "N/A");
        assert_eq!(row.survey_date, "N/A");
        assert_eq!(row.tone, StatusTone::Neutral);
    }

    #[test]
    fn test_error_alert_text() {
        let not_found = Error::http(404, r#"{"detail":"Page invalide."}"#);
        assert_eq!(
            error_alert(Some(&not_found)),
            "Erreur lors du chargement des ménages. Détails: Page invalide."
        );
        assert_eq!(
            error_alert(Some(&Error::http(500, "oops"))),
            "Erreur lors du chargement des ménages. Détails: 500"
        );
        assert_eq!(
            error_alert(None),
            "Erreur lors du chargement des ménages. Détails: Erreur inconnue"
        );
    }

    #[test]
    fn test_view_first_load_and_refetch() {
        let state = HouseholdTableState::new();
        let loading = ObservedState::<Page<Household>> {
            is_loading: true,
            is_fetching: true,
            ..ObservedState::default()
        };
        assert_eq!(HouseholdTableView::build(&state, &loading), HouseholdTableView::Loading);

        let page = Page {
            count: 12,
            results: vec![household("MNG1", Some("PARTIEL"))],
        };
        let refetching = ObservedState {
            data: Some(Arc::new(page)),
            is_fetching: true,
            ..ObservedState::default()
        };
        let HouseholdTableView::Ready(table) = HouseholdTableView::build(&state, &refetching) else {
            panic!("expected a ready table");
        };
        assert!(table.loading);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.total, 12);
        assert_eq!(table.page_count, 2);
        assert_eq!(table.alert, None);
    }
}
