use std::sync::Arc;

use axum::{routing::get, Router};

use availability_cell::router::{availability_routes, AvailabilityState};
use availability_cell::store::{InMemoryScheduleStore, InMemorySlotStore};
use booking_cell::router::{appointment_routes, BookingState};
use booking_cell::services::notify::NotificationService;
use booking_cell::store::{
    InMemoryAppointmentStore, InMemoryRelationshipStore, InMemoryTherapistDirectory,
};
use shared_config::AppConfig;

/// Session fee applied to therapists without an explicit directory entry.
const DEFAULT_SESSION_FEE: f64 = 80.0;

pub fn create_router(config: Arc<AppConfig>) -> Router {
    // One slot table, shared by both cells: availability writes it, booking
    // claims against it.
    let slots = Arc::new(InMemorySlotStore::new());

    let availability_state = AvailabilityState {
        config: config.clone(),
        schedules: Arc::new(InMemoryScheduleStore::new()),
        slots: slots.clone(),
    };

    let booking_state = BookingState {
        config: config.clone(),
        appointments: Arc::new(InMemoryAppointmentStore::new()),
        slots,
        relationships: Arc::new(InMemoryRelationshipStore::new()),
        therapists: Arc::new(InMemoryTherapistDirectory::new(DEFAULT_SESSION_FEE)),
        notifier: Arc::new(NotificationService::new(&config)),
    };

    Router::new()
        .route("/", get(|| async { "Therapy Scheduling API is running!" }))
        .nest("/availability", availability_routes(availability_state))
        .nest("/appointments", appointment_routes(booking_state))
}
