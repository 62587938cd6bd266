//! Shared types used by the reservation path.

use std::time::Duration;

use booking::model::{Event, Reservation};

use crate::eligibility::Eligibility;

/// Configuration knobs for the coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Longest a caller waits for the per-event lock before giving up
    /// with `Contention`.
    pub lock_wait: Duration,

    /// Commit attempts per call. A compare-and-swap miss (another process
    /// moved the seat count) costs one attempt.
    pub max_attempts: u32,

    /// Backoff between attempts, multiplied by the attempt number.
    pub retry_backoff: Duration,

    /// Store calls slower than this are logged as slow.
    pub slow_store_call: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_millis(2000),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(10),
            slow_store_call: Duration::from_millis(250),
        }
    }
}

/// What a successful `reserve` hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationReceipt {
    pub reservation: Reservation,
    pub event_name: String,
    pub event_description: String,

    /// Seats left right after this commit.
    pub capacity_remaining: u32,
}

/// Advisory answer from `preview`, with the event row it was based on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub eligibility: Eligibility,
    pub event: Option<Event>,
}
