use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use serde::Serialize;
use tracing::info;

use booking::model::{Event, EventFilter, EventId, EventUpdate, NewEvent};
use booking::store::EventStore;
use reservation::Clock;

use crate::auth::{AdminPrincipal, CurrentPrincipal};
use crate::envelope::ApiSuccess;
use crate::error::ApiError;
use crate::state::AppState;

/// Event detail plus the caller's advisory eligibility.
#[derive(Debug, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub can_reserve: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

pub async fn list_events(
    State(state): State<AppState>,
    _who: CurrentPrincipal,
    filter: Result<Query<EventFilter>, QueryRejection>,
) -> Result<ApiSuccess<Vec<Event>>, ApiError> {
    let Query(filter) = filter?;
    Ok(ApiSuccess::ok(state.store().list_events(&filter).await?))
}

pub async fn get_event(
    State(state): State<AppState>,
    CurrentPrincipal(who): CurrentPrincipal,
    id: Result<Path<EventId>, PathRejection>,
) -> Result<ApiSuccess<EventDetail>, ApiError> {
    let Path(id) = id?;

    let preview = state.coordinator.preview(id, who.holder_id).await?;
    let event = preview
        .event
        .ok_or_else(|| ApiError::bad_request("event_not_found", "Event does not exist"))?;

    Ok(ApiSuccess::ok(EventDetail {
        event,
        can_reserve: preview.eligibility.is_eligible(),
        reason: preview.eligibility.reason(),
    }))
}

pub async fn create_event(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    body: Result<Json<NewEvent>, JsonRejection>,
) -> Result<ApiSuccess<Event>, ApiError> {
    let Json(new) = body?;
    let today = state.clock().today();

    let event = state.store().create_event(&new, today).await?;

    info!(event_id = event.id, admin = admin.holder_id, "event created via api");
    Ok(ApiSuccess::created(event))
}

pub async fn update_event(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    id: Result<Path<EventId>, PathRejection>,
    body: Result<Json<EventUpdate>, JsonRejection>,
) -> Result<ApiSuccess<Event>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = body?;
    let today = state.clock().today();

    let event = state.store().update_event(id, &patch, today).await?;

    info!(event_id = id, admin = admin.holder_id, "event updated via api");
    Ok(ApiSuccess::ok(event))
}
