use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use booking::DbOptions;
use reservation::CoordinatorConfig;

const DEFAULT_DATABASE_URL: &str = "sqlite://eventhub.db";
const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::V4(std::net::SocketAddrV4::new(
    std::net::Ipv4Addr::LOCALHOST,
    8080,
));

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string (`DATABASE_URL`).
    pub database_url: String,

    /// Listen address (`BIND_ADDR`).
    pub bind_addr: SocketAddr,

    /// One JSON object per log line. On when `APP_ENV=production`.
    pub json_logs: bool,

    // =========================
    // Reservation path
    // =========================
    /// Lock wait, attempt limit and backoff for `reserve`
    /// (`RESERVE_LOCK_WAIT_MS`, `RESERVE_MAX_ATTEMPTS`,
    /// `RESERVE_RETRY_BACKOFF_MS`).
    ///
    /// The lock wait bounds how long a request queues behind other
    /// requests for the same event before answering "busy".
    pub coordinator: CoordinatorConfig,

    // =========================
    // Database pool
    // =========================
    /// Pool size and SQLite busy timeout
    /// (`DB_MAX_CONNECTIONS`, `DB_BUSY_TIMEOUT_MS`).
    pub db: DbOptions,

    // =========================
    // Authentication
    // =========================
    /// Comma-separated `token:holder_id[:admin]` entries (`AUTH_TOKENS`).
    ///
    /// Development stand-in for the real identity service.
    pub auth_tokens: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Missing or unparsable values fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let coord_defaults = CoordinatorConfig::default();
        let db_defaults = DbOptions::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let json_logs = lookup("APP_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        Self {
            database_url,
            bind_addr: parsed(&lookup, "BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR),
            json_logs,

            coordinator: CoordinatorConfig {
                lock_wait: parsed(&lookup, "RESERVE_LOCK_WAIT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(coord_defaults.lock_wait),
                max_attempts: parsed::<u32>(&lookup, "RESERVE_MAX_ATTEMPTS")
                    .filter(|n| *n > 0)
                    .unwrap_or(coord_defaults.max_attempts),
                retry_backoff: parsed(&lookup, "RESERVE_RETRY_BACKOFF_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(coord_defaults.retry_backoff),
                ..coord_defaults
            },

            db: DbOptions {
                max_connections: parsed::<u32>(&lookup, "DB_MAX_CONNECTIONS")
                    .filter(|n| *n > 0)
                    .unwrap_or(db_defaults.max_connections),
                busy_timeout: parsed(&lookup, "DB_BUSY_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(db_defaults.busy_timeout),
            },

            auth_tokens: lookup("AUTH_TOKENS").unwrap_or_default(),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
