//! Wire models for the survey API.
//!
//! Field names on the wire are the API's; Rust names are English and mapped
//! with serde renames. Numeric statistics are optional everywhere because
//! the API omits them freely; defaulting happens in [`crate::stats`].

use crate::error::{Error, Result};
use crate::params::QueryParams;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Household status enumeration
// ============================================================================

/// Household survey outcome, with the API's integer codes.
///
/// Codes 5 and 6 are unused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HouseholdStatus {
    Unassigned = 1,
    Assigned = 2,
    Partial = 3,
    Complete = 4,
    NoLongerExists = 7,
    Relocated = 8,
    Refusal = 9,
}

impl HouseholdStatus {
    /// Filter-menu order.
    pub const ALL: [HouseholdStatus; 7] = [
        HouseholdStatus::Complete,
        HouseholdStatus::Partial,
        HouseholdStatus::Refusal,
        HouseholdStatus::Unassigned,
        HouseholdStatus::Assigned,
        HouseholdStatus::NoLongerExists,
        HouseholdStatus::Relocated,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(HouseholdStatus::Unassigned),
            2 => Ok(HouseholdStatus::Assigned),
            3 => Ok(HouseholdStatus::Partial),
            4 => Ok(HouseholdStatus::Complete),
            7 => Ok(HouseholdStatus::NoLongerExists),
            8 => Ok(HouseholdStatus::Relocated),
            9 => Ok(HouseholdStatus::Refusal),
            other => Err(Error::Validation(format!(
                "unknown household status code {}",
                other
            ))),
        }
    }

    /// Label as reported by the API in status breakdowns.
    pub fn api_label(self) -> &'static str {
        match self {
            HouseholdStatus::Unassigned => "NON AFFECTE",
            HouseholdStatus::Assigned => "AFFECTE",
            HouseholdStatus::Partial => "PARTIEL",
            HouseholdStatus::Complete => "COMPLET",
            HouseholdStatus::NoLongerExists => "N'existe plus",
            HouseholdStatus::Relocated => "Déménagé",
            HouseholdStatus::Refusal => "Refus",
        }
    }

    /// Label shown in the status filter.
    pub fn menu_label(self) -> &'static str {
        match self {
            HouseholdStatus::Unassigned => "Non Affecté",
            HouseholdStatus::Assigned => "Affecté",
            HouseholdStatus::Partial => "Partiel",
            HouseholdStatus::Complete => "Complet",
            HouseholdStatus::NoLongerExists => "N'existe plus",
            HouseholdStatus::Relocated => "Déménagé",
            HouseholdStatus::Refusal => "Refus",
        }
    }
}

impl TryFrom<u8> for HouseholdStatus {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        HouseholdStatus::from_code(code)
    }
}

impl From<HouseholdStatus> for u8 {
    fn from(status: HouseholdStatus) -> u8 {
        status.code()
    }
}

impl fmt::Display for HouseholdStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.menu_label())
    }
}

impl FromStr for HouseholdStatus {
    type Err = Error;

    /// Accepts an integer code or an English variant name.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return HouseholdStatus::from_code(code);
        }
        match trimmed.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "unassigned" => Ok(HouseholdStatus::Unassigned),
            "assigned" => Ok(HouseholdStatus::Assigned),
            "partial" => Ok(HouseholdStatus::Partial),
            "complete" => Ok(HouseholdStatus::Complete),
            "nolongerexists" => Ok(HouseholdStatus::NoLongerExists),
            "relocated" => Ok(HouseholdStatus::Relocated),
            "refusal" => Ok(HouseholdStatus::Refusal),
            _ => Err(Error::Validation(format!("unknown household status '{}'", s))),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// One entry of a status breakdown.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusCount {
    #[serde(rename = "statut_code", default)]
    pub status_code: Option<u8>,
    #[serde(rename = "statut_nom", default, deserialize_with = "null_as_default")]
    pub status_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
}

impl StatusCount {
    pub fn new(status_name: impl Into<String>, count: u64) -> Self {
        StatusCount {
            status_code: None,
            status_name: status_name.into(),
            count,
        }
    }
}

/// Total / rural / urban household counts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Breakdown {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub rural: Option<u64>,
    #[serde(rename = "urbain", default)]
    pub urban: Option<u64>,
}

/// Coverage percentages.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageRates {
    #[serde(default)]
    pub global: Option<f64>,
    #[serde(default)]
    pub rural: Option<f64>,
    #[serde(rename = "urbain", default)]
    pub urban: Option<f64>,
}

/// Nationwide statistics (`stats/global/`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStat {
    #[serde(rename = "menages_collectes", default)]
    pub collected: Option<Breakdown>,
    #[serde(rename = "menages_attendus", default)]
    pub expected: Option<Breakdown>,
    #[serde(rename = "taux_de_couverture", default)]
    pub coverage: Option<CoverageRates>,
    #[serde(rename = "repartition_statuts", default)]
    pub statuses: Option<Vec<StatusCount>>,
}

/// Per-region statistics (one element of `stats/regions/`).
///
/// The regional endpoint reports flat totals (`menages_collectes`) and may
/// additionally carry `*_total` fields and rural/urban splits.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionStat {
    #[serde(rename = "code_dr", default, deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(rename = "nom_region", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "menages_collectes", default)]
    pub collected_flat: Option<u64>,
    #[serde(rename = "menages_collectes_total", default)]
    pub collected_total: Option<u64>,
    #[serde(rename = "rural_collectes", default)]
    pub collected_rural: Option<u64>,
    #[serde(rename = "urbain_collectes", default)]
    pub collected_urban: Option<u64>,
    #[serde(rename = "menages_attendus", default)]
    pub expected_flat: Option<u64>,
    #[serde(rename = "menages_attendus_total", default)]
    pub expected_total: Option<u64>,
    #[serde(rename = "rural_attendus", default)]
    pub expected_rural: Option<u64>,
    #[serde(rename = "urbain_attendus", default)]
    pub expected_urban: Option<u64>,
    #[serde(rename = "taux_de_couverture", default)]
    pub coverage: Option<f64>,
    #[serde(rename = "repartition_statuts", default)]
    pub statuses: Option<Vec<StatusCount>>,
}

impl RegionStat {
    /// Collected total: the `_total` field when non-zero, else the flat one.
    pub fn total_collected(&self) -> u64 {
        first_nonzero(self.collected_total, self.collected_flat)
    }

    /// Expected total: the `_total` field when non-zero, else the flat one.
    pub fn total_expected(&self) -> u64 {
        first_nonzero(self.expected_total, self.expected_flat)
    }
}

fn first_nonzero(preferred: Option<u64>, fallback: Option<u64>) -> u64 {
    preferred
        .filter(|n| *n != 0)
        .or(fallback)
        .unwrap_or(0)
}

// ============================================================================
// Reference data and records
// ============================================================================

/// Administrative region (`regions/`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "code_dr")]
    pub code: String,
    #[serde(rename = "nom_region", default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Household survey record (`menages/`, `menages/{id}/`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Household {
    #[serde(rename = "idmng")]
    pub id: String,
    #[serde(rename = "region_nom", default)]
    pub region_name: Option<String>,
    #[serde(rename = "statut_menage_display", default)]
    pub status: Option<String>,
    #[serde(rename = "statut_menage", default)]
    pub status_code: Option<u8>,
    #[serde(rename = "nom_cm", default)]
    pub head_of_household_name: Option<String>,
    #[serde(rename = "date_enquete", default, deserialize_with = "lenient_date")]
    pub survey_date: Option<NaiveDate>,
    #[serde(rename = "enqueteur_nom", default)]
    pub field_agent_name: Option<String>,
}

/// Field agent (`enqueteurs/`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAgent {
    #[serde(rename = "login_enq")]
    pub login: String,
    #[serde(rename = "nom_enqueteur", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "superviseur_id", default)]
    pub supervisor_id: Option<String>,
}

// ============================================================================
// Page envelope
// ============================================================================

/// Paginated envelope `{count, results}`.
///
/// Decoding never fails: a missing or malformed `results` yields an empty
/// page, and individual rows that do not decode are skipped.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub results: Vec<T>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Page {
            count: 0,
            results: Vec::new(),
        }
    }
}

impl<T: DeserializeOwned> Page<T> {
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            warn!("Page envelope is not an object; treating as empty");
            return Page::default();
        };

        let count = map.get("count").and_then(Value::as_u64).unwrap_or(0);
        let results = match map.remove("results") {
            Some(Value::Array(rows)) => {
                let total = rows.len();
                let decoded: Vec<T> = rows
                    .into_iter()
                    .filter_map(|row| serde_json::from_value(row).ok())
                    .collect();
                if decoded.len() != total {
                    warn!(
                        "Skipped {} undecodable row(s) out of {}",
                        total - decoded.len(),
                        total
                    );
                }
                decoded
            }
            _ => Vec::new(),
        };

        Page { count, results }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Page<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Page::from_value)
    }
}

// ============================================================================
// Request arguments
// ============================================================================

/// Arguments of the household list query (`menages/`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HouseholdListArgs {
    /// One-based page number.
    pub page: u32,
    pub page_size: u32,
    pub region_code: Option<String>,
    pub status: Option<HouseholdStatus>,
}

impl HouseholdListArgs {
    pub fn new(page: u32, page_size: u32) -> Self {
        HouseholdListArgs {
            page,
            page_size,
            region_code: None,
            status: None,
        }
    }

    pub fn with_region(mut self, code: impl Into<String>) -> Self {
        self.region_code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: HouseholdStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .with("page", self.page)
            .with("page_size", self.page_size)
            .with("region__code_dr", self.region_code.as_deref())
            .with("statut_menage", self.status.map(HouseholdStatus::code))
    }
}

impl Default for HouseholdListArgs {
    fn default() -> Self {
        HouseholdListArgs::new(1, 10)
    }
}

/// Arguments of the field-agent list query (`enqueteurs/`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FieldAgentListArgs {
    pub supervisor_id: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl FieldAgentListArgs {
    pub fn for_supervisor(id: impl Into<String>) -> Self {
        FieldAgentListArgs {
            supervisor_id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn to_params(&self) -> QueryParams {
        QueryParams::new()
            .with("superviseur_id", self.supervisor_id.as_deref())
            .with("page", self.page)
            .with("page_size", self.page_size)
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `YYYY-MM-DD` or an RFC 3339 timestamp; anything else is `None`.
fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let Some(Value::String(raw)) = raw else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|dt| dt.date_naive())
        });
    Ok(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_codes_roundtrip_through_enum() {
        for status in HouseholdStatus::ALL {
            assert_eq!(HouseholdStatus::from_code(status.code()).unwrap(), status);
        }
        assert!(HouseholdStatus::from_code(5).is_err());
        assert!(HouseholdStatus::from_code(6).is_err());
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            "4".parse::<HouseholdStatus>().unwrap(),
            HouseholdStatus::Complete
        );
        assert_eq!(
            "no-longer-exists".parse::<HouseholdStatus>().unwrap(),
            HouseholdStatus::NoLongerExists
        );
        assert!("done".parse::<HouseholdStatus>().is_err());
    }

    #[test]
    fn test_global_stat_decodes_partial_payload() {
        let stat: GlobalStat = serde_json::from_value(json!({
            "menages_collectes": {"total": 100, "rural": 40},
            "taux_de_couverture": {"global": 66.7}
        }))
        .unwrap();

        let collected = stat.collected.unwrap();
        assert_eq!(collected.total, Some(100));
        assert_eq!(collected.urban, None);
        assert!(stat.expected.is_none());
        assert!(stat.statuses.is_none());
    }

    #[test]
    fn test_region_stat_totals_prefer_total_fields() {
        let stat: RegionStat = serde_json::from_value(json!({
            "code_dr": "01",
            "nom_region": "DAKAR",
            "menages_collectes": 12,
            "menages_collectes_total": 0,
            "menages_attendus": 20,
            "menages_attendus_total": 25
        }))
        .unwrap();

        assert_eq!(stat.total_collected(), 12);
        assert_eq!(stat.total_expected(), 25);
    }

    #[test]
    fn test_household_lenient_date() {
        let rows: Vec<Household> = serde_json::from_value(json!([
            {"idmng": "A", "date_enquete": "2024-03-05"},
            {"idmng": "B", "date_enquete": "not a date"},
            {"idmng": "C", "date_enquete": null},
            {"idmng": "D"}
        ]))
        .unwrap();

        assert_eq!(rows[0].survey_date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert!(rows[1..].iter().all(|h| h.survey_date.is_none()));
    }

    #[test]
    fn test_page_decodes_and_skips_bad_rows() {
        let page: Page<Household> = serde_json::from_value(json!({
            "count": 42,
            "next": "http://localhost:8000/api/menages/?page=2",
            "previous": null,
            "results": [
                {"idmng": "A", "nom_cm": "Awa Diop"},
                {"nom_cm": "missing id"},
                "garbage"
            ]
        }))
        .unwrap();

        assert_eq!(page.count, 42);
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].id, "A");
    }

    #[test]
    fn test_page_missing_results_is_empty() {
        let page: Page<Household> = serde_json::from_value(json!({"detail": "ok"})).unwrap();
        assert_eq!(page, Page::default());

        let page: Page<Household> = serde_json::from_value(Value::Null).unwrap();
        assert_eq!(page.count, 0);
    }

    #[test]
    fn test_household_list_args_params() {
        let args = HouseholdListArgs::new(1, 10).with_region("");
        let params = args.to_params();
        assert_eq!(params.get("page"), Some("1"));
        assert_eq!(params.get("page_size"), Some("10"));
        assert!(!params.contains("region__code_dr"));

        let args = HouseholdListArgs::new(3, 25)
            .with_region("05")
            .with_status(HouseholdStatus::Refusal);
        let params = args.to_params();
        assert_eq!(params.get("region__code_dr"), Some("05"));
        assert_eq!(params.get("statut_menage"), Some("9"));
    }

    #[test]
    fn test_field_agent_args_params() {
        let params = FieldAgentListArgs::for_supervisor("SP0101").to_params();
        assert_eq!(params.pairs().len(), 1);
        assert_eq!(params.get("superviseur_id"), Some("SP0101"));
    }
}
