use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use refbase::api;
use refbase::cache::ResultCache;
use refbase::config::{Config, DatabaseBackend};
use refbase::executor::ResilientQueryExecutor;
use refbase::health::HealthMonitor;
use refbase::metrics::MetricsStore;
use refbase::store::{PostgresReportStore, ReportStore, SqliteReportStore};
use refbase::time::TimeProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let store: Arc<dyn ReportStore> = match config.database.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.database.url);
            Arc::new(
                SqliteReportStore::new(&config.database.url, config.database.max_connections)
                    .await?,
            )
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.database.url);
            Arc::new(PostgresReportStore::new(&config.database.url).await?)
        }
    };

    info!("Initializing database...");
    store.init().await?;
    info!("Database initialized successfully");

    // Composition root: the cache and health state are constructed here
    // and injected, not reached through globals
    let cache = Arc::new(ResultCache::new());
    let sweep_handle = cache.start_sweep_task(Duration::from_secs(60));

    let health = Arc::new(HealthMonitor::new(Arc::clone(&store)));
    health.start(Duration::from_secs(
        config.resilience.health_probe_interval_secs,
    ));

    let executor = Arc::new(ResilientQueryExecutor::with_base_delay(
        Arc::clone(&cache),
        Arc::clone(&health),
        Duration::from_millis(config.resilience.retry_base_delay_ms),
    ));

    let time = TimeProvider::new(config.report.timezone);
    info!("Report timezone: {}", config.report.timezone);

    let metrics = Arc::new(MetricsStore::new(
        store,
        executor,
        Arc::clone(&cache),
        time,
        &config.resilience,
    ));

    let router = api::create_api_router(metrics, Arc::clone(&health));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🚀 API server listening on http://{}", addr);

    axum::serve(listener, router).await?;

    health.stop();
    sweep_handle.abort();

    Ok(())
}
