//! Decides whether a holder may reserve a seat of an event right now.
//
//  This module is deliberately pure: no async, no IO.

use chrono::NaiveDate;

use booking::model::{Event, HolderId, Reservation};

/// Result of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    EventNotFound,
    WindowClosed,
    CapacityExhausted,
    AlreadyReserved,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }

    /// Human-readable reason, `None` when eligible.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Eligibility::Eligible => None,
            Eligibility::EventNotFound => Some("Event does not exist"),
            Eligibility::WindowClosed => Some("Event already over or ongoing. Cannot register now"),
            Eligibility::CapacityExhausted => Some("Event registration full"),
            Eligibility::AlreadyReserved => Some("Event already registered"),
        }
    }
}

/// Check whether `holder_id` may take one seat of `event` on `today`.
///
/// Rules, first failure wins:
///   1. the event exists
///   2. the window is open (`today < valid_until`, dates only)
///   3. at least one seat remains
///   4. the holder has no reservation for this event yet
///
/// `existing` is the ledger lookup for `(event.id, holder_id)`; a record for
/// any other pair is ignored.
pub fn check_eligibility(
    event: Option<&Event>,
    today: NaiveDate,
    holder_id: HolderId,
    existing: Option<&Reservation>,
) -> Eligibility {
    let Some(event) = event else {
        return Eligibility::EventNotFound;
    };

    if !event.is_window_open(today) {
        return Eligibility::WindowClosed;
    }

    if !event.has_capacity() {
        return Eligibility::CapacityExhausted;
    }

    if existing.is_some_and(|r| r.event_id == event.id && r.holder_id == holder_id) {
        return Eligibility::AlreadyReserved;
    }

    Eligibility::Eligible
}
