use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use booking::model::EventId;
use common::logger::{annotate_span, root_span};

use crate::auth::CurrentPrincipal;
use crate::envelope::ApiSuccess;
use crate::error::ApiError;
use crate::handlers::trace_id;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Registered {
    pub reservation_id: Uuid,
    pub event_name: String,
    pub event_description: String,
    pub capacity_remaining: u32,
    pub created_at: DateTime<Utc>,
}

/// Reserve one seat of `:id` for the caller. Served on GET and POST.
pub async fn register_event(
    State(state): State<AppState>,
    CurrentPrincipal(who): CurrentPrincipal,
    headers: HeaderMap,
    id: Result<Path<EventId>, PathRejection>,
) -> Result<ApiSuccess<Registered>, ApiError> {
    let Path(event_id) = id?;
    let span = root_span("register_event", &trace_id(&headers));

    let receipt = async {
        annotate_span(event_id, Some(who.holder_id));
        state.coordinator.reserve(event_id, who.holder_id).await
    }
    .instrument(span)
    .await?;

    Ok(ApiSuccess::ok(Registered {
        reservation_id: receipt.reservation.id,
        event_name: receipt.event_name,
        event_description: receipt.event_description,
        capacity_remaining: receipt.capacity_remaining,
        created_at: receipt.reservation.created_at,
    }))
}
