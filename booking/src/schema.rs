use sqlx::SqlitePool;

use crate::error::StoreError;

/// Idempotent schema creation. Safe to run on every start.
pub async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    // Categories
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS categories (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Events
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS events (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE,
  description TEXT NOT NULL,
  capacity_total INTEGER NOT NULL CHECK (capacity_total >= 0),
  capacity_remaining INTEGER NOT NULL
    CHECK (capacity_remaining >= 0 AND capacity_remaining <= capacity_total),
  valid_until TEXT NOT NULL,
  created TEXT NOT NULL,
  updated TEXT NOT NULL
);
"#,
    )
    .execute(pool)
    .await?;

    // Event <-> category links
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS event_categories (
  event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
  category_id INTEGER NOT NULL REFERENCES categories(id) ON DELETE CASCADE,
  PRIMARY KEY (event_id, category_id)
);
"#,
    )
    .execute(pool)
    .await?;

    // Reservations: one row per (event, holder), enforced by the index.
    sqlx::query(
        r#"
CREATE TABLE IF NOT EXISTS reservations (
  id TEXT PRIMARY KEY,
  event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
  holder_id INTEGER NOT NULL,
  created_at TEXT NOT NULL,
  UNIQUE (event_id, holder_id)
);
"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(r#"CREATE INDEX IF NOT EXISTS idx_reservations_holder ON reservations(holder_id);"#)
        .execute(pool)
        .await?;

    sqlx::query(
        r#"CREATE INDEX IF NOT EXISTS idx_event_categories_category ON event_categories(category_id);"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
