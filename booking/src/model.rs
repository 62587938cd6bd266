use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EventId = i64;
pub type HolderId = i64;
pub type CategoryId = i64;
pub type ReservationId = Uuid;

/// Seats given to an event when the admin does not say otherwise.
pub const DEFAULT_SEATS: u32 = 10;

fn default_seats() -> u32 {
    DEFAULT_SEATS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A capacity-limited event that holders reserve seats against.
///
/// `capacity_remaining` is only ever lowered by the reservation commit
/// path; admin updates re-derive it from the new total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub description: String,

    // Capacity
    pub capacity_total: u32,
    pub capacity_remaining: u32,

    /// Registration closes at the start of this calendar day:
    /// reservations are accepted only while `today < valid_until`.
    pub valid_until: NaiveDate,

    pub created: NaiveDate,
    pub updated: NaiveDate,
    pub categories: Vec<CategoryId>,
}

impl Event {
    /// Seats already handed out.
    pub fn reserved(&self) -> u32 {
        debug_assert!(
            self.capacity_remaining <= self.capacity_total,
            "inconsistent event capacity"
        );

        self.capacity_total.saturating_sub(self.capacity_remaining)
    }

    /// Date-only comparison; time of day never matters.
    pub fn is_window_open(&self, today: NaiveDate) -> bool {
        self.valid_until > today
    }

    pub fn has_capacity(&self) -> bool {
        self.capacity_remaining > 0
    }
}

/// Admin payload for creating an event.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_seats")]
    pub seats: u32,
    pub valid_until: NaiveDate,
    #[serde(default)]
    pub categories: Vec<CategoryId>,
}

/// Admin payload for updating an event.
///
/// `seats` is applied only when strictly positive; zero, negative or
/// missing values leave the capacity untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct EventUpdate {
    pub description: String,
    pub valid_until: NaiveDate,
    #[serde(default)]
    pub seats: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub category: Option<CategoryId>,
}

/// One seat of one event held by one holder. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub event_id: EventId,
    pub holder_id: HolderId,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn new(event_id: EventId, holder_id: HolderId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            holder_id,
            created_at,
        }
    }
}

/// Snapshot used to verify `total - remaining == reservations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacityAudit {
    pub event_id: EventId,
    pub capacity_total: u32,
    pub capacity_remaining: u32,
    pub reservations: u64,
}

impl CapacityAudit {
    pub fn is_consistent(&self) -> bool {
        self.capacity_remaining <= self.capacity_total
            && u64::from(self.capacity_total - self.capacity_remaining) == self.reservations
    }
}
