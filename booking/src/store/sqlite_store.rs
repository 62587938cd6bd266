//! SqliteBookingStore
//! ------------------
//! SQLite-backed implementation of the event, ledger and reservation
//! store traits. All tables live in one database so the seat decrement and
//! the reservation insert can share a single transaction:
//!
//!  - the decrement is a compare-and-swap on `capacity_remaining`, so a
//!    stale read in any process turns into `CommitOutcome::Conflict`
//!  - `UNIQUE(event_id, holder_id)` is the final word on duplicates
//!  - a transaction dropped before `commit` (error, cancelled future) is
//!    rolled back, so a decrement without its reservation is never visible
use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{CommitOutcome, EventStore, ReservationLedger, ReservationStore};
use crate::error::{CatalogError, StoreError};
use crate::model::{
    CapacityAudit, Category, CategoryId, Event, EventFilter, EventId, EventUpdate, HolderId,
    NewEvent, Reservation,
};

const EVENT_COLUMNS: &str = "id, name, description, capacity_total, capacity_remaining, \
                             valid_until, created, updated";

/// SQLx-backed store. Responsible only for persistence and row mapping.
#[derive(Clone)]
pub struct SqliteBookingStore {
    pool: SqlitePool,
}

impl SqliteBookingStore {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn categories_of(&self, event_id: EventId) -> Result<Vec<CategoryId>, StoreError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT category_id FROM event_categories WHERE event_id = ? ORDER BY category_id;",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn category_links(&self) -> Result<HashMap<EventId, Vec<CategoryId>>, StoreError> {
        let rows = sqlx::query(
            "SELECT event_id, category_id FROM event_categories ORDER BY event_id, category_id;",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut links: HashMap<EventId, Vec<CategoryId>> = HashMap::new();
        for r in rows {
            let event_id: i64 = r.try_get("event_id")?;
            let category_id: i64 = r.try_get("category_id")?;
            links.entry(event_id).or_default().push(category_id);
        }

        Ok(links)
    }

    /// The seat commit proper. Errors come back raw so the caller can tell
    /// lock contention apart from real failures.
    async fn try_commit(
        &self,
        expected_remaining: u32,
        reservation: &Reservation,
        today: NaiveDate,
    ) -> Result<CommitOutcome, sqlx::Error> {
        // The conditional UPDATE goes first so the transaction takes the
        // write lock on its first statement.
        let mut tx = self.pool.begin().await?;

        let swapped = sqlx::query(
            r#"
UPDATE events
SET capacity_remaining = capacity_remaining - 1
WHERE id = ?
  AND capacity_remaining = ?
  AND capacity_remaining > 0
  AND valid_until > ?;
"#,
        )
        .bind(reservation.event_id)
        .bind(i64::from(expected_remaining))
        .bind(today)
        .execute(&mut *tx)
        .await?;

        if swapped.rows_affected() == 0 {
            tx.rollback().await?;
            debug!("capacity compare-and-swap missed");
            return Ok(CommitOutcome::Conflict);
        }

        let inserted = sqlx::query(
            r#"
INSERT INTO reservations (id, event_id, holder_id, created_at)
VALUES (?, ?, ?, ?);
"#,
        )
        .bind(reservation.id.to_string())
        .bind(reservation.event_id)
        .bind(reservation.holder_id)
        .bind(reservation.created_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                tx.rollback().await?;
                debug!("holder already has a reservation; decrement rolled back");
                return Ok(CommitOutcome::Duplicate);
            }
            Err(e) => return Err(e),
        }

        tx.commit().await?;

        Ok(CommitOutcome::Committed {
            capacity_remaining: expected_remaining - 1,
        })
    }
}

#[async_trait]
impl EventStore for SqliteBookingStore {
    #[instrument(skip(self), target = "store", fields(event_id = id))]
    async fn fetch_event(&self, id: EventId) -> Result<Option<Event>, StoreError> {
        let row = sqlx::query(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?;"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => {
                let categories = self.categories_of(id).await?;
                Ok(Some(row_to_event(&r, categories)?))
            }
            None => {
                debug!("event lookup returned no rows");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), target = "store")]
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
SELECT {EVENT_COLUMNS}
FROM events e
WHERE ? IS NULL
   OR EXISTS (
        SELECT 1 FROM event_categories ec
        WHERE ec.event_id = e.id AND ec.category_id = ?
   )
ORDER BY created DESC, id DESC;
"#
        ))
        .bind(filter.category)
        .bind(filter.category)
        .fetch_all(&self.pool)
        .await?;

        let mut links = self.category_links().await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let id: i64 = r.try_get("id")?;
            let categories = links.remove(&id).unwrap_or_default();
            match row_to_event(&r, categories) {
                Ok(e) => out.push(e),
                Err(e) => {
                    // poison-row resilience: skip but don't fail the listing
                    warn!(event_id = id, error = %e, "skipping malformed event row");
                }
            }
        }

        Ok(out)
    }

    #[instrument(skip(self, new), target = "store", fields(name = %new.name, seats = new.seats))]
    async fn create_event(&self, new: &NewEvent, today: NaiveDate) -> Result<Event, CatalogError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidField {
                field: "name",
                reason: "must not be empty".into(),
            });
        }

        let categories: BTreeSet<CategoryId> = new.categories.iter().copied().collect();

        let mut tx = self.pool.begin().await?;

        for cid in &categories {
            let found = sqlx::query_scalar::<_, i64>("SELECT id FROM categories WHERE id = ?;")
                .bind(cid)
                .fetch_optional(&mut *tx)
                .await?;

            if found.is_none() {
                return Err(CatalogError::CategoryNotFound(*cid));
            }
        }

        let seats = i64::from(new.seats);
        let inserted = sqlx::query(
            r#"
INSERT INTO events (
  name, description,
  capacity_total, capacity_remaining,
  valid_until, created, updated
)
VALUES (?, ?, ?, ?, ?, ?, ?);
"#,
        )
        .bind(name)
        .bind(&new.description)
        .bind(seats)
        .bind(seats)
        .bind(new.valid_until)
        .bind(today)
        .bind(today)
        .execute(&mut *tx)
        .await;

        let id = match inserted {
            Ok(r) => r.last_insert_rowid(),
            Err(e) if is_unique_violation(&e) => {
                return Err(CatalogError::NameTaken(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        for cid in &categories {
            sqlx::query("INSERT INTO event_categories (event_id, category_id) VALUES (?, ?);")
                .bind(id)
                .bind(cid)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(event_id = id, "event created");

        self.fetch_event(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("event {id} missing after insert")).into())
    }

    /// Description and window are always replaced; seats only when positive.
    ///
    /// A new seat count re-derives `capacity_remaining` from the seats already
    /// reserved, inside the same statement that checks the count is large
    /// enough, so it cannot interleave with a seat commit.
    #[instrument(skip(self, patch), target = "store", fields(event_id = id))]
    async fn update_event(
        &self,
        id: EventId,
        patch: &EventUpdate,
        today: NaiveDate,
    ) -> Result<Event, CatalogError> {
        let seats = match patch.seats {
            Some(s) if s > 0 => Some(u32::try_from(s).map_err(|_| CatalogError::InvalidField {
                field: "seats",
                reason: format!("{s} is out of range"),
            })?),
            _ => None,
        };

        let mut tx = self.pool.begin().await?;

        let affected = match seats {
            Some(seats) => {
                let seats = i64::from(seats);
                sqlx::query(
                    r#"
UPDATE events
SET description = ?,
    valid_until = ?,
    updated = ?,
    capacity_remaining = ? - (capacity_total - capacity_remaining),
    capacity_total = ?
WHERE id = ? AND capacity_total - capacity_remaining <= ?;
"#,
                )
                .bind(&patch.description)
                .bind(patch.valid_until)
                .bind(today)
                .bind(seats)
                .bind(seats)
                .bind(id)
                .bind(seats)
                .execute(&mut *tx)
                .await?
                .rows_affected()
            }
            None => sqlx::query(
                "UPDATE events SET description = ?, valid_until = ?, updated = ? WHERE id = ?;",
            )
            .bind(&patch.description)
            .bind(patch.valid_until)
            .bind(today)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected(),
        };

        if affected == 0 {
            let row =
                sqlx::query("SELECT capacity_total, capacity_remaining FROM events WHERE id = ?;")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;

            return Err(match (row, seats) {
                (Some(r), Some(requested)) => {
                    let total = i64_to_u32(r.try_get("capacity_total")?)?;
                    let remaining = i64_to_u32(r.try_get("capacity_remaining")?)?;
                    CatalogError::CapacityBelowReserved {
                        requested,
                        reserved: total.saturating_sub(remaining),
                    }
                }
                _ => CatalogError::EventNotFound(id),
            });
        }

        tx.commit().await?;

        info!(seats = ?seats, "event updated");

        self.fetch_event(id)
            .await?
            .ok_or(CatalogError::EventNotFound(id))
    }

    #[instrument(skip(self), target = "store")]
    async fn create_category(&self, name: &str) -> Result<Category, CatalogError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidField {
                field: "name",
                reason: "must not be empty".into(),
            });
        }

        let id = sqlx::query("INSERT INTO categories (name) VALUES (?);")
            .bind(name)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        Ok(Category {
            id,
            name: name.to_string(),
        })
    }

    async fn list_categories(&self) -> Result<Vec<Category>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name, id;")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|r| -> Result<Category, StoreError> {
                Ok(Category {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ReservationLedger for SqliteBookingStore {
    #[instrument(skip(self), target = "store")]
    async fn find_reservation(
        &self,
        event_id: EventId,
        holder_id: HolderId,
    ) -> Result<Option<Reservation>, StoreError> {
        let row = sqlx::query(
            r#"
SELECT id, event_id, holder_id, created_at
FROM reservations
WHERE event_id = ? AND holder_id = ?;
"#,
        )
        .bind(event_id)
        .bind(holder_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_reservation).transpose()
    }

    #[instrument(skip(self), target = "store")]
    async fn reservations_for_holder(
        &self,
        holder_id: HolderId,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT id, event_id, holder_id, created_at
FROM reservations
WHERE holder_id = ?
ORDER BY created_at DESC, rowid DESC;
"#,
        )
        .bind(holder_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_reservation).collect()
    }

    async fn count_for_event(&self, event_id: EventId) -> Result<u64, StoreError> {
        let n = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM reservations WHERE event_id = ?;")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;

        i64_to_u64(n)
    }
}

#[async_trait]
impl ReservationStore for SqliteBookingStore {
    #[instrument(
        skip(self, reservation),
        target = "store",
        fields(event_id = reservation.event_id, holder_id = reservation.holder_id)
    )]
    async fn commit_reservation(
        &self,
        expected_remaining: u32,
        reservation: &Reservation,
        today: NaiveDate,
    ) -> Result<CommitOutcome, StoreError> {
        match self.try_commit(expected_remaining, reservation, today).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if is_busy(&e) => {
                debug!(error = %e, "write lock held elsewhere; nothing committed");
                Ok(CommitOutcome::Busy)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn audit(&self, event_id: EventId) -> Result<Option<CapacityAudit>, StoreError> {
        // One statement, one snapshot.
        let row = sqlx::query(
            r#"
SELECT
  e.capacity_total,
  e.capacity_remaining,
  (SELECT COUNT(*) FROM reservations r WHERE r.event_id = e.id) AS reservations
FROM events e
WHERE e.id = ?;
"#,
        )
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else { return Ok(None) };

        Ok(Some(CapacityAudit {
            event_id,
            capacity_total: i64_to_u32(r.try_get("capacity_total")?)?,
            capacity_remaining: i64_to_u32(r.try_get("capacity_remaining")?)?,
            reservations: i64_to_u64(r.try_get("reservations")?)?,
        }))
    }
}

/* =========================
Row mapping + conversions
========================= */

fn row_to_event(r: &SqliteRow, categories: Vec<CategoryId>) -> Result<Event, StoreError> {
    let id: i64 = r.try_get("id")?;
    let capacity_total = i64_to_u32(r.try_get("capacity_total")?)?;
    let capacity_remaining = i64_to_u32(r.try_get("capacity_remaining")?)?;

    if capacity_remaining > capacity_total {
        return Err(StoreError::Corrupt(format!(
            "event {id}: remaining {capacity_remaining} exceeds total {capacity_total}"
        )));
    }

    Ok(Event {
        id,
        name: r.try_get("name")?,
        description: r.try_get("description")?,
        capacity_total,
        capacity_remaining,
        valid_until: r.try_get("valid_until")?,
        created: r.try_get("created")?,
        updated: r.try_get("updated")?,
        categories,
    })
}

fn row_to_reservation(r: &SqliteRow) -> Result<Reservation, StoreError> {
    let id_str: String = r.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| StoreError::Corrupt(format!("invalid reservation id '{id_str}': {e}")))?;

    Ok(Reservation {
        id,
        event_id: r.try_get("event_id")?,
        holder_id: r.try_get("holder_id")?,
        created_at: r.try_get("created_at")?,
    })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Another connection holds the write lock past `busy_timeout`, or every
/// pooled connection is checked out. Extended result codes keep the primary
/// code in their low byte.
fn is_busy(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|c| c.parse::<i32>().ok())
            .is_some_and(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
        _ => false,
    }
}

/* =========================
Numeric safety helpers
========================= */

fn i64_to_u32(v: i64) -> Result<u32, StoreError> {
    u32::try_from(v).map_err(|_| StoreError::Corrupt(format!("out of range for u32: {v}")))
}

fn i64_to_u64(v: i64) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| StoreError::Corrupt(format!("negative i64 where u64 expected: {v}")))
}
