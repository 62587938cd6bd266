use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use uuid::Uuid;

use crate::error::StoreError;
use crate::schema;

/// Pool sizing and lock-wait knobs for the SQLite database.
#[derive(Clone, Debug)]
pub struct DbOptions {
    /// Upper bound on pooled connections.
    pub max_connections: u32,

    /// How long a writer waits on another connection's write lock before
    /// SQLite reports `SQLITE_BUSY`.
    pub busy_timeout: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            max_connections: 8,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone)]
pub struct Db {
    pub pool: SqlitePool,
}

impl Db {
    /// Open (creating if missing) a file-backed database in WAL mode.
    pub async fn connect(database_url: &str, opts: &DbOptions) -> Result<Self, StoreError> {
        let connect = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(opts.busy_timeout)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(opts.max_connections.max(1))
            .connect_with(connect)
            .await?;

        tracing::info!(database_url, max_connections = opts.max_connections, "database connected");

        Ok(Self { pool })
    }

    /// Isolated, uniquely named in-memory database.
    ///
    /// Shared-cache memory databases report table locks immediately instead
    /// of waiting on them, so the pool is pinned to a single long-lived
    /// connection and writers queue on the pool instead.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let name = Uuid::new_v4();
        let connect = SqliteConnectOptions::from_str(&format!(
            "sqlite:file:{name}?mode=memory&cache=shared"
        ))?
        .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        schema::migrate(&self.pool).await
    }
}
