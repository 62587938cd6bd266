use axum::extract::State;

use booking::model::Reservation;
use booking::store::ReservationLedger;

use crate::auth::CurrentPrincipal;
use crate::envelope::ApiSuccess;
use crate::error::ApiError;
use crate::state::AppState;

/// The caller's reservations, newest first.
pub async fn my_reservations(
    State(state): State<AppState>,
    CurrentPrincipal(who): CurrentPrincipal,
) -> Result<ApiSuccess<Vec<Reservation>>, ApiError> {
    let mine = state.store().reservations_for_holder(who.holder_id).await?;
    Ok(ApiSuccess::ok(mine))
}
