use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use availability_cell::store::SlotStore;
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::notify::NotificationService;
use crate::store::{AppointmentStore, RelationshipStore, TherapistDirectory};

/// Everything the appointment handlers need. `slots` is the same store the
/// availability cell writes to.
#[derive(Clone)]
pub struct BookingState {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub slots: Arc<dyn SlotStore>,
    pub relationships: Arc<dyn RelationshipStore>,
    pub therapists: Arc<dyn TherapistDirectory>,
    pub notifier: Arc<NotificationService>,
}

pub fn appointment_routes(state: BookingState) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/reschedule", post(handlers::reschedule_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/meeting-link", patch(handlers::update_meeting_link))
        .route("/{appointment_id}/request-link-change", post(handlers::request_link_change))
        .route("/{appointment_id}/review", post(handlers::submit_review))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new().merge(protected_routes).with_state(state)
}
