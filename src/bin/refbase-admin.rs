use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

use refbase::cache::ResultCache;
use refbase::config::{Config, DatabaseBackend};
use refbase::executor::ResilientQueryExecutor;
use refbase::health::HealthMonitor;
use refbase::metrics::MetricsStore;
use refbase::report::Timeframe;
use refbase::store::{PostgresReportStore, ReportStore, SqliteReportStore};
use refbase::time::TimeProvider;

#[derive(Parser)]
#[command(name = "refbase-admin")]
#[command(about = "Refbase admin management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed today's metrics bucket for every known user
    SeedToday,
    /// Print all-time totals for a user
    Totals {
        /// User ID
        user_id: String,
    },
    /// Print an aggregated report for a user
    Report {
        /// User ID
        user_id: String,
        /// Timeframe label, e.g. "Last 30 Days" (the default)
        timeframe: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let store: Arc<dyn ReportStore> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteReportStore::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(PostgresReportStore::new(&config.database.url).await?),
    };

    store.init().await?;

    let cache = Arc::new(ResultCache::new());
    let health = Arc::new(HealthMonitor::new(Arc::clone(&store)));
    // One probe up front so queries log against a fresh signal
    health.probe().await;

    let executor = Arc::new(ResilientQueryExecutor::with_base_delay(
        Arc::clone(&cache),
        Arc::clone(&health),
        Duration::from_millis(config.resilience.retry_base_delay_ms),
    ));

    let time = TimeProvider::new(config.report.timezone);
    let metrics = MetricsStore::new(store, executor, cache, time, &config.resilience);

    match cli.command {
        Commands::SeedToday => {
            let summary = metrics.ensure_daily_buckets().await?;
            println!(
                "✓ Seeded today's bucket for {} user(s), {} failure(s)",
                summary.seeded, summary.failed
            );
        }
        Commands::Totals { user_id } => {
            let totals = metrics.get_totals(&user_id, true).await?;
            println!("Totals for '{}':", user_id);
            println!("  clicks:    {}", totals.clicks);
            println!("  signups:   {}", totals.signups);
            println!("  customers: {}", totals.customers);
            println!("  earnings:  {:.2}", totals.earnings);
        }
        Commands::Report { user_id, timeframe } => {
            let timeframe = timeframe
                .as_deref()
                .map(Timeframe::parse)
                .unwrap_or(Timeframe::Last30Days);
            let report = metrics.get_report(&user_id, timeframe, true).await?;

            println!(
                "{} report for '{}' ({} → {}):",
                report.timeframe, user_id, report.start_date, report.end_date
            );
            println!(
                "{:<12} {:>8} {:>9} {:>10} {:>10}",
                "date", "clicks", "signups", "customers", "earnings"
            );
            for point in &report.series {
                println!(
                    "{:<12} {:>8} {:>9} {:>10} {:>10.2}",
                    point.date,
                    point.clicks_count,
                    point.new_referrals,
                    point.new_customers,
                    point.earnings
                );
            }
            println!(
                "totals: {} clicks, {} signups, {} customers, {:.2} earnings",
                report.overview.clicks,
                report.overview.signups,
                report.overview.customers,
                report.overview.earnings
            );
        }
    }

    Ok(())
}
