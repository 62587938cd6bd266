pub mod sqlite_store;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{CatalogError, StoreError};
use crate::model::{
    CapacityAudit, Category, Event, EventFilter, EventId, EventUpdate, HolderId, NewEvent,
    Reservation,
};

pub use sqlite_store::SqliteBookingStore;

/// Event rows: point lookups, listing, and the admin catalogue writes.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn fetch_event(&self, id: EventId) -> Result<Option<Event>, StoreError>;
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>, StoreError>;

    async fn create_event(&self, new: &NewEvent, today: NaiveDate) -> Result<Event, CatalogError>;
    async fn update_event(
        &self,
        id: EventId,
        patch: &EventUpdate,
        today: NaiveDate,
    ) -> Result<Event, CatalogError>;

    async fn create_category(&self, name: &str) -> Result<Category, CatalogError>;
    async fn list_categories(&self) -> Result<Vec<Category>, StoreError>;
}

/// Reservation rows, keyed by id and by `(event_id, holder_id)`.
#[async_trait]
pub trait ReservationLedger: Send + Sync {
    async fn find_reservation(
        &self,
        event_id: EventId,
        holder_id: HolderId,
    ) -> Result<Option<Reservation>, StoreError>;

    /// Newest first.
    async fn reservations_for_holder(
        &self,
        holder_id: HolderId,
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn count_for_event(&self, event_id: EventId) -> Result<u64, StoreError>;
}

/// Result of the atomic seat commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Seat decremented and reservation written, both durable.
    Committed { capacity_remaining: u32 },
    /// The event row no longer matched what the caller observed
    /// (remaining changed, window closed, or capacity ran out).
    Conflict,
    /// The holder already owns a reservation for this event.
    Duplicate,
    /// The database write lock could not be taken in time. Nothing was
    /// written; safe to retry.
    Busy,
}

/// Both halves of the reservation write path behind one atomic primitive.
#[async_trait]
pub trait ReservationStore: EventStore + ReservationLedger {
    /// Compare-and-swap on `capacity_remaining` plus reservation insert, in
    /// one transaction.
    ///
    /// The decrement applies only when the event still has
    /// `capacity_remaining == expected_remaining`, that value is positive and
    /// `valid_until > today`. Either both rows change or neither does.
    async fn commit_reservation(
        &self,
        expected_remaining: u32,
        reservation: &Reservation,
        today: NaiveDate,
    ) -> Result<CommitOutcome, StoreError>;

    async fn audit(&self, event_id: EventId) -> Result<Option<CapacityAudit>, StoreError>;
}
