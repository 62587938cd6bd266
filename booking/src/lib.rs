pub mod db;
pub mod error;
pub mod model;
pub mod schema;
pub mod store;

pub use db::{Db, DbOptions};
pub use error::{CatalogError, StoreError};
