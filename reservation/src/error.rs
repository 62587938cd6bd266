use thiserror::Error;

use booking::StoreError;
use booking::model::EventId;

use crate::eligibility::Eligibility;

/// Everything `reserve` can answer besides a receipt.
///
/// The first four mirror the eligibility rules. `Contention` is transient
/// and safe to retry from the top. `StorageFailure` is infrastructure and
/// is never reported as a business rejection.
#[derive(Error, Debug)]
pub enum ReservationError {
    #[error("Event does not exist")]
    EventNotFound(EventId),

    #[error("Event already over or ongoing. Cannot register now")]
    WindowClosed,

    #[error("Event registration full")]
    CapacityExhausted,

    #[error("Event already registered")]
    AlreadyReserved,

    #[error("Event is busy, please retry (gave up after {attempts} attempt(s))")]
    Contention { attempts: u32 },

    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl ReservationError {
    /// Map a failed eligibility verdict; `None` for `Eligible`.
    pub fn from_eligibility(verdict: Eligibility, event_id: EventId) -> Option<Self> {
        match verdict {
            Eligibility::Eligible => None,
            Eligibility::EventNotFound => Some(Self::EventNotFound(event_id)),
            Eligibility::WindowClosed => Some(Self::WindowClosed),
            Eligibility::CapacityExhausted => Some(Self::CapacityExhausted),
            Eligibility::AlreadyReserved => Some(Self::AlreadyReserved),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention { .. })
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EventNotFound(_) => "event_not_found",
            Self::WindowClosed => "window_closed",
            Self::CapacityExhausted => "capacity_exhausted",
            Self::AlreadyReserved => "already_reserved",
            Self::Contention { .. } => "contention",
            Self::StorageFailure(_) => "storage_failure",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligible_maps_to_nothing() {
        assert!(ReservationError::from_eligibility(Eligibility::Eligible, 1).is_none());
    }

    #[test]
    fn ineligible_keeps_its_reason() {
        for verdict in [
            Eligibility::EventNotFound,
            Eligibility::WindowClosed,
            Eligibility::CapacityExhausted,
            Eligibility::AlreadyReserved,
        ] {
            let err = ReservationError::from_eligibility(verdict, 3).unwrap();
            assert_eq!(Some(err.to_string().as_str()), verdict.reason());
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn only_contention_is_retryable() {
        assert!(ReservationError::Contention { attempts: 3 }.is_retryable());
        let storage = ReservationError::StorageFailure(StoreError::Corrupt("x".into()));
        assert!(!storage.is_retryable());
        assert_eq!(storage.code(), "storage_failure");
    }
}
