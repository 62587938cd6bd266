use axum::Router;
use axum::routing::get;

use crate::handlers::{categories, events, health, register, reservations};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/:id", get(events::get_event).put(events::update_event))
        .route(
            "/events/:id/register",
            get(register::register_event).post(register::register_event),
        )
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/reservations", get(reservations::my_reservations));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
        .with_state(state)
}
