use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;
use tracing::info;

use booking::model::Category;
use booking::store::EventStore;

use crate::auth::{AdminPrincipal, CurrentPrincipal};
use crate::envelope::ApiSuccess;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

pub async fn list_categories(
    State(state): State<AppState>,
    _who: CurrentPrincipal,
) -> Result<ApiSuccess<Vec<Category>>, ApiError> {
    Ok(ApiSuccess::ok(state.store().list_categories().await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    AdminPrincipal(admin): AdminPrincipal,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> Result<ApiSuccess<Category>, ApiError> {
    let Json(body) = body?;
    let category = state.store().create_category(&body.name).await?;

    info!(category_id = category.id, admin = admin.holder_id, "category created");
    Ok(ApiSuccess::created(category))
}
