//! The reservation coordinator.
//!
//! For each `reserve(event_id, holder_id)` call, per attempt:
//!   1. Takes the per-event lock (bounded wait).
//!   2. Re-reads the event and the holder's ledger entry.
//!   3. Checks eligibility on that fresh read.
//!   4. Commits decrement + reservation through the store's compare-and-swap.
//!
//! The lock orders callers inside this process. The compare-and-swap is
//! what keeps other processes sharing the database honest: a miss means the
//! read in step 2 went stale, and the attempt starts over. So does a write
//! lock held by another process past the busy timeout.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, warn};

use booking::StoreError;
use booking::model::{Event, EventId, HolderId, Reservation};
use booking::store::{CommitOutcome, ReservationStore};
use common::logger::{annotate_span, child_span, warn_if_slow};

use crate::clock::Clock;
use crate::eligibility::{Eligibility, check_eligibility};
use crate::error::ReservationError;
use crate::locks::LockRegistry;
use crate::types::{CoordinatorConfig, Preview, ReservationReceipt};

pub struct ReservationCoordinator {
    store: Arc<dyn ReservationStore>,
    clock: Arc<dyn Clock>,
    locks: LockRegistry,
    cfg: CoordinatorConfig,
}

enum Attempt {
    Done(ReservationReceipt),
    Stale,
}

impl ReservationCoordinator {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        clock: Arc<dyn Clock>,
        cfg: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            clock,
            locks: LockRegistry::new(),
            cfg,
        }
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.cfg
    }

    /// Advisory eligibility: no lock, no mutation. A later `reserve` may
    /// still answer differently. The event row read for the verdict comes
    /// back with it.
    pub async fn preview(
        &self,
        event_id: EventId,
        holder_id: HolderId,
    ) -> Result<Preview, ReservationError> {
        let (eligibility, event) = self.evaluate(event_id, holder_id).await?;
        Ok(Preview { eligibility, event })
    }

    /// Take one seat of `event_id` for `holder_id`.
    ///
    /// Conflicts are retried internally up to `max_attempts` times, each
    /// attempt re-checking eligibility from scratch. Running out of attempts,
    /// or not getting the event lock within `lock_wait`, is `Contention`.
    pub async fn reserve(
        &self,
        event_id: EventId,
        holder_id: HolderId,
    ) -> Result<ReservationReceipt, ReservationError> {
        self.reserve_with_retries(event_id, holder_id)
            .instrument(child_span("reserve"))
            .await
    }

    async fn reserve_with_retries(
        &self,
        event_id: EventId,
        holder_id: HolderId,
    ) -> Result<ReservationReceipt, ReservationError> {
        annotate_span(event_id, Some(holder_id));

        let max_attempts = self.cfg.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            debug!(attempt, "reservation attempt");

            match self.attempt(event_id, holder_id, attempt).await? {
                Attempt::Done(receipt) => return Ok(receipt),
                Attempt::Stale if attempt < max_attempts => {
                    // Back off outside the lock.
                    tokio::time::sleep(self.cfg.retry_backoff * attempt).await;
                }
                Attempt::Stale => {}
            }
        }

        warn!(
            attempts = max_attempts,
            "seat commit kept losing the race; reporting contention"
        );
        Err(ReservationError::Contention {
            attempts: max_attempts,
        })
    }

    async fn attempt(
        &self,
        event_id: EventId,
        holder_id: HolderId,
        attempt: u32,
    ) -> Result<Attempt, ReservationError> {
        let _guard = match self.locks.acquire(event_id, self.cfg.lock_wait).await {
            Ok(g) => g,
            Err(timeout) => {
                warn!(error = %timeout, attempt, "event lock not acquired in time");
                return Err(ReservationError::Contention { attempts: attempt });
            }
        };

        // Anything read before the lock was advisory; this read is the one
        // the decision rests on.
        let (verdict, event) = self.evaluate(event_id, holder_id).await?;

        if let Some(rejection) = ReservationError::from_eligibility(verdict, event_id) {
            debug!(?verdict, "reservation rejected");
            return Err(rejection);
        }

        let Some(event) = event else {
            return Err(ReservationError::EventNotFound(event_id));
        };

        let reservation = Reservation::new(event_id, holder_id, self.clock.now());
        let today = self.clock.today();

        let outcome = warn_if_slow(
            "commit_reservation",
            self.cfg.slow_store_call,
            self.store
                .commit_reservation(event.capacity_remaining, &reservation, today),
        )
        .await
        .map_err(storage_failure)?;

        match outcome {
            CommitOutcome::Committed { capacity_remaining } => {
                info!(
                    reservation_id = %reservation.id,
                    capacity_remaining,
                    "seat reserved"
                );

                Ok(Attempt::Done(ReservationReceipt {
                    reservation,
                    event_name: event.name,
                    event_description: event.description,
                    capacity_remaining,
                }))
            }
            CommitOutcome::Duplicate => {
                debug!("ledger already holds this holder; nothing committed");
                Err(ReservationError::AlreadyReserved)
            }
            CommitOutcome::Conflict => {
                warn!(
                    attempt,
                    observed_remaining = event.capacity_remaining,
                    "capacity compare-and-swap missed"
                );
                Ok(Attempt::Stale)
            }
            CommitOutcome::Busy => {
                warn!(attempt, "database write lock busy");
                Ok(Attempt::Stale)
            }
        }
    }

    async fn evaluate(
        &self,
        event_id: EventId,
        holder_id: HolderId,
    ) -> Result<(Eligibility, Option<Event>), ReservationError> {
        let today = self.clock.today();

        let event = warn_if_slow(
            "fetch_event",
            self.cfg.slow_store_call,
            self.store.fetch_event(event_id),
        )
        .await
        .map_err(storage_failure)?;

        let existing = match &event {
            Some(_) => warn_if_slow(
                "find_reservation",
                self.cfg.slow_store_call,
                self.store.find_reservation(event_id, holder_id),
            )
            .await
            .map_err(storage_failure)?,
            None => None,
        };

        let verdict = check_eligibility(event.as_ref(), today, holder_id, existing.as_ref());
        Ok((verdict, event))
    }
}

fn storage_failure(e: StoreError) -> ReservationError {
    error!(error = %e, "reservation store failed");
    ReservationError::StorageFailure(e)
}
