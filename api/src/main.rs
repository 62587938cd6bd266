use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use api::auth::StaticTokenAuthenticator;
use api::config::AppConfig;
use api::{AppState, build_router};
use booking::Db;
use booking::store::SqliteBookingStore;
use common::logger::init_logger;
use reservation::{ReservationCoordinator, SystemClock};

/// Opens the database, applies the schema and wires the coordinator.
async fn init_coordinator(cfg: &AppConfig) -> anyhow::Result<ReservationCoordinator> {
    let db = Db::connect(&cfg.database_url, &cfg.db)
        .await
        .with_context(|| format!("connecting to {}", cfg.database_url))?;
    db.migrate().await.context("applying schema")?;

    let store = Arc::new(SqliteBookingStore::from_pool(db.pool.clone()));

    Ok(ReservationCoordinator::new(
        store,
        Arc::new(SystemClock),
        cfg.coordinator.clone(),
    ))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env();
    init_logger("eventhub-api", cfg.json_logs);

    let auth = StaticTokenAuthenticator::parse(&cfg.auth_tokens).context("parsing AUTH_TOKENS")?;
    if auth.is_empty() {
        warn!("AUTH_TOKENS is empty; every authenticated route will answer 401");
    }

    let coordinator = init_coordinator(&cfg).await?;
    let state = AppState::new(Arc::new(coordinator), Arc::new(auth));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;

    info!(
        addr = %cfg.bind_addr,
        lock_wait_ms = cfg.coordinator.lock_wait.as_millis() as u64,
        max_attempts = cfg.coordinator.max_attempts,
        "eventhub api listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    info!("eventhub api stopped");
    Ok(())
}
