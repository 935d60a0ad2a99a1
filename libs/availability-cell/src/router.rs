use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::store::{ScheduleStore, SlotStore};

/// Everything the availability handlers need. The slot store is shared with
/// the booking cell so both sides see one slot table.
#[derive(Clone)]
pub struct AvailabilityState {
    pub config: Arc<AppConfig>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub slots: Arc<dyn SlotStore>,
}

pub fn availability_routes(state: AvailabilityState) -> Router {
    let protected_routes = Router::new()
        .route("/recurring-schedule", post(handlers::create_recurring_schedule))
        .route("/recurring-schedule/{schedule_id}", put(handlers::update_recurring_schedule))
        .route("/recurring-schedule/{schedule_id}", delete(handlers::delete_recurring_schedule))
        .route("/recurring-schedules", get(handlers::list_recurring_schedules))
        .route("/", post(handlers::submit_availability))
        .route("/", get(handlers::get_availability))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ));

    Router::new().merge(protected_routes).with_state(state)
}
