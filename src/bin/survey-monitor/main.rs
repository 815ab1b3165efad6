//! survey-monitor CLI
//!
//! Fetches the dashboard once and prints it as text.

mod render;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::time::Duration;
use survey_monitor::client::HttpTransport;
use survey_monitor::config::{ClientConfig, BASE_URL_ENV, DEFAULT_BASE_URL, TIMEOUT_ENV};
use survey_monitor::models::HouseholdStatus;
use survey_monitor::table::DEFAULT_PAGE_SIZE;
use survey_monitor::view::DashboardView;
use survey_monitor::{Dashboard, HouseholdTableState, QueryCache};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API base URL
    #[arg(long, env = BASE_URL_ENV, default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Request timeout in milliseconds (none by default)
    #[arg(long, env = TIMEOUT_ENV)]
    timeout_ms: Option<u64>,

    /// Region code to focus on
    #[arg(long)]
    region: Option<String>,

    /// Household status filter: code (1-4, 7-9) or name
    #[arg(long)]
    status: Option<HouseholdStatus>,

    /// Household table page, starting at 1
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    page: u32,

    /// Rows per page: 5, 10, 25 or 50
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut config = ClientConfig::default().with_base_url(args.base_url);
    if let Some(ms) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    let transport = HttpTransport::new(config).context("invalid client configuration")?;

    let mut table = HouseholdTableState::new();
    table.set_page_size(args.page_size)?;
    table.set_region_filter(args.region.as_deref());
    table.set_status_filter(args.status);
    table.set_page(args.page - 1);

    let mut dashboard = Dashboard::with_table(QueryCache::new(transport), table);
    dashboard.settle().await;

    match dashboard.view() {
        DashboardView::Ready(panels) => {
            print!("{}", render::dashboard(&panels));
            Ok(())
        }
        DashboardView::CriticalError { messages } => {
            bail!(
                "Erreur critique de chargement des données: {}",
                messages.join("; ")
            )
        }
        DashboardView::Loading => bail!("dashboard did not finish loading"),
    }
}
