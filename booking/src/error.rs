use thiserror::Error;

use crate::model::{CategoryId, EventId};

/// Infrastructure failure of the backing store.
///
/// Never translated into a business outcome: callers surface it as-is.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Failures of the admin catalogue path (events and categories).
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Event already exists: {0}")]
    NameTaken(String),

    #[error("event {0} does not exist")]
    EventNotFound(EventId),

    #[error("category {0} does not exist")]
    CategoryNotFound(CategoryId),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("cannot set seats to {requested}: {reserved} seats already reserved")]
    CapacityBelowReserved { requested: u32, reserved: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for CatalogError {
    fn from(e: sqlx::Error) -> Self {
        CatalogError::Store(StoreError::Database(e))
    }
}
