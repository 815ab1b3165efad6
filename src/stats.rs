//! Derived dashboard statistics.
//!
//! [`CurrentStats::build`] turns the raw global stats, the raw per-region
//! stats and the selected region code into one normalised record. Everything
//! here is pure; [`StatsMemo`] adds memoisation on the three inputs.
//!
//! # Status matching
//!
//! Statuses are matched by name with a single rule: the folded needle is a
//! substring of the folded status name, where folding lowercases and strips
//! Latin accents. `"COMPLETE_RURAL"`, `"Complet"` and `"complété"` all count
//! toward [`NEEDLE_COMPLETE`].

use crate::models::{Breakdown, GlobalStat, HouseholdStatus, RegionStat, StatusCount};
use std::collections::HashSet;
use std::sync::Arc;

pub const NEEDLE_COMPLETE: &str = "complet";
pub const NEEDLE_PARTIAL: &str = "partiel";
pub const NEEDLE_REFUSAL: &str = "refus";

fn fold_char(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Lowercase and strip Latin accents.
pub fn fold(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).map(fold_char).collect()
}

/// Whether `name` matches `needle` under the status-matching rule.
pub fn status_matches(name: &str, needle: &str) -> bool {
    fold(name).contains(&fold(needle))
}

/// Severity tone of a status label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusTone {
    Success,
    Warning,
    Error,
    Neutral,
}

impl StatusTone {
    pub fn for_label(label: &str) -> Self {
        if status_matches(label, NEEDLE_COMPLETE) {
            StatusTone::Success
        } else if status_matches(label, NEEDLE_PARTIAL) {
            StatusTone::Warning
        } else if status_matches(label, NEEDLE_REFUSAL) {
            StatusTone::Error
        } else {
            StatusTone::Neutral
        }
    }

    pub fn for_status(status: HouseholdStatus) -> Self {
        Self::for_label(status.api_label())
    }
}

/// Total / rural / urban counts with missing values as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: u64,
    pub rural: u64,
    pub urban: u64,
}

impl Counts {
    fn from_breakdown(breakdown: Option<&Breakdown>) -> Self {
        let Some(b) = breakdown else {
            return Counts::default();
        };
        Counts {
            total: b.total.unwrap_or(0),
            rural: b.rural.unwrap_or(0),
            urban: b.urban.unwrap_or(0),
        }
    }
}

/// One slice of the status breakdown chart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusSlice {
    pub label: String,
    pub count: u64,
    pub tone: StatusTone,
}

/// Statistics of the current selection: one region or the whole country.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CurrentStats {
    pub collected: Counts,
    pub expected: Counts,
    /// Coverage percentage.
    pub coverage: f64,
    pub statuses: Vec<StatusCount>,
    pub region_name: Option<String>,
    pub is_regional: bool,
}

impl CurrentStats {
    /// Normalise the stats for `selected_region`.
    ///
    /// A non-empty code picks the first region whose code equals it; no code
    /// or no match falls back to the global stats. Absent numbers are zero.
    pub fn build(
        global: Option<&GlobalStat>,
        regions: Option<&[RegionStat]>,
        selected_region: &str,
    ) -> Self {
        if !selected_region.is_empty() {
            let found = regions.and_then(|all| all.iter().find(|r| r.code == selected_region));
            if let Some(region) = found {
                debug!("Using stats of region {}", region.name);
                return Self::from_region(region);
            }
            debug!("Region {} not in region stats, using global stats", selected_region);
        }
        Self::from_global(global)
    }

    fn from_region(region: &RegionStat) -> Self {
        CurrentStats {
            collected: Counts {
                total: region.total_collected(),
                rural: region.collected_rural.unwrap_or(0),
                urban: region.collected_urban.unwrap_or(0),
            },
            expected: Counts {
                total: region.total_expected(),
                rural: region.expected_rural.unwrap_or(0),
                urban: region.expected_urban.unwrap_or(0),
            },
            coverage: region.coverage.unwrap_or(0.0),
            statuses: region.statuses.clone().unwrap_or_default(),
            region_name: Some(region.name.clone()),
            is_regional: true,
        }
    }

    fn from_global(global: Option<&GlobalStat>) -> Self {
        let Some(g) = global else {
            return CurrentStats::default();
        };
        CurrentStats {
            collected: Counts::from_breakdown(g.collected.as_ref()),
            expected: Counts::from_breakdown(g.expected.as_ref()),
            coverage: g.coverage.as_ref().and_then(|c| c.global).unwrap_or(0.0),
            statuses: g.statuses.clone().unwrap_or_default(),
            region_name: None,
            is_regional: false,
        }
    }

    /// Count of the first status matching `needle`, zero if none does.
    pub fn status_count(&self, needle: &str) -> u64 {
        self.statuses
            .iter()
            .find(|s| status_matches(&s.status_name, needle))
            .map(|s| s.count)
            .unwrap_or(0)
    }

    pub fn complete(&self) -> u64 {
        self.status_count(NEEDLE_COMPLETE)
    }

    pub fn partial(&self) -> u64 {
        self.status_count(NEEDLE_PARTIAL)
    }

    pub fn refusal(&self) -> u64 {
        self.status_count(NEEDLE_REFUSAL)
    }

    /// Coverage with one decimal and a decimal comma: `66,7%`.
    pub fn coverage_label(&self) -> String {
        format!("{:.1}%", self.coverage).replace('.', ",")
    }

    /// Statuses with a positive count, in input order.
    pub fn status_slices(&self) -> Vec<StatusSlice> {
        self.statuses
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| StatusSlice {
                label: s.status_name.clone(),
                count: s.count,
                tone: StatusTone::for_label(&s.status_name),
            })
            .collect()
    }

    fn scope_name(&self) -> Option<&str> {
        self.region_name.as_deref().filter(|_| self.is_regional)
    }

    pub fn title(&self) -> String {
        match self.scope_name() {
            Some(name) => format!("Suivi des Enquêtes - Région de {}", name),
            None => "Plateforme de Suivi des Enquêtes (National)".to_string(),
        }
    }

    pub fn heading(&self) -> String {
        match self.scope_name() {
            Some(name) => format!("{} - Vue Détaillée", name),
            None => "Suivi National des Enquêtes".to_string(),
        }
    }

    pub fn chart_title(&self) -> String {
        match self.scope_name() {
            Some(name) => format!("Répartition des Statuts ({})", name),
            None => "Répartition des Statuts (National)".to_string(),
        }
    }
}

/// One row of the region progress list.
#[derive(Clone, Debug, PartialEq)]
pub struct RegionProgress {
    pub code: String,
    pub name: String,
    pub collected: u64,
    pub expected: u64,
    /// Collected over expected, in percent. Zero when either is zero.
    pub percent: f64,
}

impl RegionProgress {
    /// Percentage clamped to `[0, 100]` for the progress bar.
    pub fn bar_value(&self) -> f64 {
        self.percent.clamp(0.0, 100.0)
    }

    /// Rounded percentage: `67%`.
    pub fn label(&self) -> String {
        format!("{}%", self.percent.round() as i64)
    }
}

/// Progress rows, one per distinct region name (first occurrence wins).
pub fn region_progress(region_stats: &[RegionStat]) -> Vec<RegionProgress> {
    let mut seen = HashSet::new();
    region_stats
        .iter()
        .filter(|r| seen.insert(r.name.as_str()))
        .map(|r| {
            let collected = r.total_collected();
            let expected = r.total_expected();
            let percent = if collected > 0 && expected > 0 {
                collected as f64 / expected as f64 * 100.0
            } else {
                0.0
            };
            RegionProgress {
                code: r.code.clone(),
                name: r.name.clone(),
                collected,
                expected,
                percent,
            }
        })
        .collect()
}

fn same<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Memoised [`CurrentStats::build`].
///
/// Recomputes only when the global stats or region stats change identity
/// (`Arc` pointer) or the selected code changes value.
#[derive(Default)]
pub struct StatsMemo {
    global: Option<Arc<GlobalStat>>,
    regions: Option<Arc<Vec<RegionStat>>>,
    selected: String,
    value: Option<Arc<CurrentStats>>,
    computations: usize,
}

impl StatsMemo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        global: Option<&Arc<GlobalStat>>,
        regions: Option<&Arc<Vec<RegionStat>>>,
        selected_region: &str,
    ) -> Arc<CurrentStats> {
        if let Some(value) = &self.value {
            if same(self.global.as_ref(), global)
                && same(self.regions.as_ref(), regions)
                && self.selected == selected_region
            {
                return Arc::clone(value);
            }
        }

        let value = Arc::new(CurrentStats::build(
            global.map(|g| g.as_ref()),
            regions.map(|r| r.as_slice()),
            selected_region,
        ));
        self.global = global.cloned();
        self.regions = regions.cloned();
        self.selected = selected_region.to_string();
        self.value = Some(Arc::clone(&value));
        self.computations += 1;
        value
    }

    /// Number of times the stats were actually computed.
    pub fn computations(&self) -> usize {
        self.computations
    }
}
