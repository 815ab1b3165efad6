//! Plain-text rendering of the dashboard.

use survey_monitor::stats::StatusTone;
use survey_monitor::table::{HouseholdRow, HouseholdTable, HouseholdTableView};
use survey_monitor::view::{DashboardPanels, StatCard};
use tabled::Tabled;

const BAR_WIDTH: usize = 30;

#[derive(Tabled)]
struct RowDisplay {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Région")]
    region: String,
    #[tabled(rename = "Statut")]
    status: String,
    #[tabled(rename = "Chef de Ménage")]
    head_of_household: String,
    #[tabled(rename = "Date Enquête")]
    survey_date: String,
}

impl From<&HouseholdRow> for RowDisplay {
    fn from(row: &HouseholdRow) -> Self {
        RowDisplay {
            id: row.id.clone(),
            region: row.region.clone(),
            status: format!("{} {}", marker(row.tone), row.status),
            head_of_household: row.head_of_household.clone(),
            survey_date: row.survey_date.clone(),
        }
    }
}

fn marker(tone: StatusTone) -> &'static str {
    match tone {
        StatusTone::Success => "✓",
        StatusTone::Warning => "~",
        StatusTone::Error => "✗",
        StatusTone::Neutral => "·",
    }
}

fn bar(value: f64) -> String {
    let filled = ((value / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

fn card(card: &StatCard) -> String {
    match card {
        StatCard::Counts { title, counts } => format!(
            "{}: {}  (Rural {} | Urbain {} | Total {})",
            title, counts.total, counts.rural, counts.urban, counts.total
        ),
        StatCard::Value { title, value } => format!("{}: {}", title, value),
        StatCard::Statuses {
            title,
            complete,
            partial,
            refusal,
        } => format!(
            "{}: Complet {} | Partiel {} | Refus {}",
            title, complete, partial, refusal
        ),
    }
}

fn table(table: &HouseholdTable) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(alert) = &table.alert {
        lines.push(format!("! {}", alert));
    }
    if table.rows.is_empty() {
        lines.push("Aucun ménage.".to_string());
    } else {
        let rows: Vec<RowDisplay> = table.rows.iter().map(RowDisplay::from).collect();
        lines.push(tabled::Table::new(rows).to_string());
    }
    lines.push(format!(
        "Page {}/{} · {} ménages · {} par page{}",
        table.page + 1,
        table.page_count.max(1),
        table.total,
        table.page_size,
        if table.loading { " · chargement…" } else { "" }
    ));
    lines
}

pub fn dashboard(panels: &DashboardPanels) -> String {
    let mut lines = vec![panels.title.clone(), panels.heading.clone(), String::new()];

    lines.extend(panels.cards.iter().map(card));
    lines.push(String::new());

    lines.push(panels.chart_title.clone());
    if panels.status_slices.is_empty() {
        lines.push("  Aucune donnée de statut à visualiser.".to_string());
    }
    for slice in &panels.status_slices {
        lines.push(format!("  {} {:<16} {}", marker(slice.tone), slice.label, slice.count));
    }
    lines.push(String::new());

    lines.push("Progression (Toutes les Régions)".to_string());
    if panels.region_progress.is_empty() {
        lines.push("  Aucune donnée de progression régionale.".to_string());
    }
    for row in &panels.region_progress {
        lines.push(format!(
            "  {:<20} {} {:>5}  ({}/{})",
            row.name,
            bar(row.bar_value()),
            row.label(),
            row.collected,
            row.expected
        ));
    }
    lines.push(String::new());

    let options: Vec<String> = panels
        .region_options
        .iter()
        .map(|o| {
            if o.selected {
                format!("[{}]", o.label)
            } else {
                o.label.clone()
            }
        })
        .collect();
    lines.push(format!("Régions: {}", options.join(" ")));
    lines.push(String::new());

    lines.push(panels.table_heading.clone());
    match &panels.table {
        HouseholdTableView::Loading => lines.push("chargement…".to_string()),
        HouseholdTableView::Ready(t) => lines.extend(table(t)),
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bar_bounds() {
        assert_eq!(bar(0.0), "░".repeat(BAR_WIDTH));
        assert_eq!(bar(100.0), "█".repeat(BAR_WIDTH));
        assert_eq!(bar(50.0).chars().filter(|c| *c == '█').count(), 15);
    }

    #[test]
    fn test_status_card_line() {
        let line = card(&StatCard::Statuses {
            title: "Statuts",
            complete: 80,
            partial: 15,
            refusal: 5,
        });
        assert_eq!(line, "Statuts: Complet 80 | Partiel 15 | Refus 5");
    }
}
