use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use futures::future::join_all;
use tracing::{info, warn};

use booking::Db;
use booking::DbOptions;
use booking::model::{Event, EventFilter, EventUpdate, NewEvent};
use booking::store::{EventStore, ReservationStore, SqliteBookingStore};
use reservation::{
    Clock, CoordinatorConfig, ReservationCoordinator, ReservationError, ReservationReceipt,
    SystemClock,
};

use crate::cli::{CategoryCommand, Cli, Command, EventCommand, Tuning};

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let db = Db::connect(&cli.database_url, &DbOptions::default())
        .await
        .with_context(|| format!("opening {}", cli.database_url))?;
    db.migrate().await.context("applying schema")?;

    let store = Arc::new(SqliteBookingStore::from_pool(db.pool.clone()));
    let today = SystemClock.today();

    match cli.command {
        Command::Migrate => {
            println!("schema up to date");
        }

        Command::Category(CategoryCommand::Add { name }) => {
            let c = store.create_category(&name).await?;
            println!("category {} '{}'", c.id, c.name);
        }

        Command::Category(CategoryCommand::List) => {
            for c in store.list_categories().await? {
                println!("{:>5}  {}", c.id, c.name);
            }
        }

        Command::Event(cmd) => run_event(store.as_ref(), cmd, today).await?,

        Command::Reserve {
            event_id,
            holder,
            tuning,
        } => {
            let coordinator = coordinator(store, &tuning);
            let receipt = coordinator.reserve(event_id, holder).await?;
            println!(
                "reserved {} on '{}' for holder {} ({} seats left)",
                receipt.reservation.id, receipt.event_name, holder, receipt.capacity_remaining
            );
        }

        Command::Audit { event_id } => audit(store.as_ref(), event_id).await?,

        Command::Simulate {
            event_id,
            callers,
            first_holder,
            tuning,
        } => {
            let coordinator = Arc::new(coordinator(store.clone(), &tuning));

            let handles = (0..callers).map(|i| {
                let c = coordinator.clone();
                let holder = first_holder + i64::from(i);
                tokio::spawn(async move { c.reserve(event_id, holder).await })
            });

            let mut results = Vec::with_capacity(callers as usize);
            for joined in join_all(handles).await {
                results.push(joined.context("reservation task panicked")?);
            }

            let tally = Tally::from_results(&results);
            for (code, n) in &tally.outcomes {
                println!("{code:>20}  {n}");
            }
            info!(?tally.outcomes, "simulation finished");

            audit(store.as_ref(), Some(event_id)).await?;
        }
    }

    Ok(())
}

fn coordinator(store: Arc<SqliteBookingStore>, tuning: &Tuning) -> ReservationCoordinator {
    let cfg = CoordinatorConfig {
        lock_wait: Duration::from_millis(tuning.lock_wait_ms),
        max_attempts: tuning.max_attempts,
        retry_backoff: Duration::from_millis(tuning.retry_backoff_ms),
        ..CoordinatorConfig::default()
    };

    ReservationCoordinator::new(store, Arc::new(SystemClock), cfg)
}

async fn run_event(
    store: &SqliteBookingStore,
    cmd: EventCommand,
    today: chrono::NaiveDate,
) -> anyhow::Result<()> {
    match cmd {
        EventCommand::Create {
            name,
            description,
            seats,
            valid_until,
            categories,
        } => {
            let new = NewEvent {
                name,
                description,
                seats,
                valid_until,
                categories,
            };
            let e = store.create_event(&new, today).await?;
            println!("event {} '{}' ({} seats, until {})", e.id, e.name, e.capacity_total, e.valid_until);
        }

        EventCommand::List { category } => {
            for e in store.list_events(&EventFilter { category }).await? {
                println!("{}", event_line(&e));
            }
        }

        EventCommand::Show { event_id } => {
            let e = store
                .fetch_event(event_id)
                .await?
                .ok_or_else(|| anyhow!("event {event_id} does not exist"))?;
            println!("{}", serde_json::to_string_pretty(&e)?);
        }

        EventCommand::Update {
            event_id,
            description,
            valid_until,
            seats,
        } => {
            let patch = EventUpdate {
                description,
                valid_until,
                seats,
            };
            let e = store.update_event(event_id, &patch, today).await?;
            println!("{}", event_line(&e));
        }
    }

    Ok(())
}

async fn audit(store: &SqliteBookingStore, event_id: Option<i64>) -> anyhow::Result<()> {
    let ids = match event_id {
        Some(id) => vec![id],
        None => store
            .list_events(&EventFilter::default())
            .await?
            .into_iter()
            .map(|e| e.id)
            .collect(),
    };

    let mut broken = 0;
    for id in ids {
        let a = store
            .audit(id)
            .await?
            .ok_or_else(|| anyhow!("event {id} does not exist"))?;

        let verdict = if a.is_consistent() { "ok" } else { "MISMATCH" };
        println!(
            "event {:>5}: total {} remaining {} reservations {}  {}",
            id, a.capacity_total, a.capacity_remaining, a.reservations, verdict
        );

        if !a.is_consistent() {
            warn!(event_id = id, ?a, "capacity does not match the ledger");
            broken += 1;
        }
    }

    if broken > 0 {
        bail!("{broken} event(s) failed the capacity audit");
    }
    Ok(())
}

/// Outcome counts keyed by error code (`reserved` for successes).
/// One row of `event list` / `event update` output.
fn event_line(e: &Event) -> String {
    format!(
        "{:>5}  {:<30} {:>4} reserved, {}/{} left, until {}",
        e.id,
        e.name,
        e.reserved(),
        e.capacity_remaining,
        e.capacity_total,
        e.valid_until
    )
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    pub outcomes: BTreeMap<&'static str, u32>,
}

impl Tally {
    pub(crate) fn from_results(results: &[Result<ReservationReceipt, ReservationError>]) -> Self {
        let mut outcomes = BTreeMap::new();
        for r in results {
            let key = match r {
                Ok(_) => "reserved",
                Err(e) => e.code(),
            };
            *outcomes.entry(key).or_insert(0) += 1;
        }
        Self { outcomes }
    }
}
