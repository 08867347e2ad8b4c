use anyhow::Context;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub report: ReportConfig,
    pub resilience: ResilienceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Fixed IANA timezone for all civil-day boundaries. A configuration
    /// constant, never inferred from the host clock.
    pub timezone: Tz,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    pub query_timeout_ms: u64,
    pub cache_ttl_secs: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub health_probe_interval_secs: u64,
}

impl ResilienceConfig {
    const fn default_query_timeout_ms() -> u64 {
        10_000
    }

    const fn default_cache_ttl_secs() -> u64 {
        300
    }
}

fn env_u64(name: &str, default: u64) -> anyhow::Result<u64> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .with_context(|| format!("{name} must be an integer")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./refbase.db".to_string());

        let max_connections = env_u64("DATABASE_MAX_CONNECTIONS", 5)? as u32;

        let host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;

        let timezone_str =
            std::env::var("REPORT_TIMEZONE").unwrap_or_else(|_| "America/New_York".to_string());
        let timezone = timezone_str
            .parse::<Tz>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("REPORT_TIMEZONE '{timezone_str}' is not an IANA zone"))?;

        let resilience = ResilienceConfig {
            query_timeout_ms: env_u64(
                "QUERY_TIMEOUT_MS",
                ResilienceConfig::default_query_timeout_ms(),
            )?,
            cache_ttl_secs: env_u64("CACHE_TTL_SECS", ResilienceConfig::default_cache_ttl_secs())?,
            max_retries: env_u64("QUERY_MAX_RETRIES", 2)? as u32,
            retry_base_delay_ms: env_u64("RETRY_BASE_DELAY_MS", 200)?,
            health_probe_interval_secs: env_u64("HEALTH_PROBE_INTERVAL_SECS", 30)?,
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            report: ReportConfig { timezone },
            resilience,
        })
    }
}
