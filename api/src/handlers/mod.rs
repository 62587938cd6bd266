pub mod categories;
pub mod events;
pub mod health;
pub mod register;
pub mod reservations;

use axum::http::HeaderMap;
use common::logger::TraceId;

/// Correlation id from `X-Request-Id`, or a fresh one.
pub(crate) fn trace_id(headers: &HeaderMap) -> TraceId {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(TraceId::parse)
        .unwrap_or_default()
}
