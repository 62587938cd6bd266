use std::sync::Arc;

use booking::store::ReservationStore;
use reservation::{Clock, ReservationCoordinator};

use crate::auth::Authenticator;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ReservationCoordinator>,
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    pub fn new(coordinator: Arc<ReservationCoordinator>, auth: Arc<dyn Authenticator>) -> Self {
        Self { coordinator, auth }
    }

    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        self.coordinator.store()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.coordinator.clock()
    }
}
