pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
