use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AvailabilityError, AvailabilitySubmission, CreateRecurringScheduleRequest,
    UpdateRecurringScheduleRequest,
};
use crate::router::AvailabilityState;
use crate::services::reconcile::AvailabilityReconciler;
use crate::services::schedule::RecurringScheduleService;

#[derive(Debug, Deserialize)]
pub struct SlotQueryParams {
    pub therapist_id: Option<Uuid>,
}

fn to_app_error(err: AvailabilityError) -> AppError {
    match err {
        AvailabilityError::MalformedTime(msg) => {
            AppError::BadRequest(format!("Malformed time: {}", msg))
        }
        AvailabilityError::Validation(msg) => AppError::ValidationError(msg),
        AvailabilityError::ScheduleNotFound => {
            AppError::NotFound("Recurring schedule not found".to_string())
        }
        AvailabilityError::Unauthorized => {
            AppError::Auth("Not authorized to modify this schedule".to_string())
        }
        AvailabilityError::Storage(msg) => AppError::Storage(msg),
    }
}

fn therapist_id_from(user: &User) -> Result<Uuid, AppError> {
    if !user.is_therapist() {
        return Err(AppError::Auth(
            "Only therapists can manage availability".to_string(),
        ));
    }
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

#[axum::debug_handler]
pub async fn create_recurring_schedule(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateRecurringScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = therapist_id_from(&user)?;

    let service = RecurringScheduleService::new(state.schedules.clone(), state.slots.clone());
    let (definition, generated) = service
        .create(therapist_id, request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": definition,
        "generated_slots": generated
    })))
}

#[axum::debug_handler]
pub async fn update_recurring_schedule(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
    Json(request): Json<UpdateRecurringScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = therapist_id_from(&user)?;

    let service = RecurringScheduleService::new(state.schedules.clone(), state.slots.clone());
    let (definition, generated) = service
        .update(schedule_id, therapist_id, request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": definition,
        "generated_slots": generated
    })))
}

#[axum::debug_handler]
pub async fn delete_recurring_schedule(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = therapist_id_from(&user)?;

    let service = RecurringScheduleService::new(state.schedules.clone(), state.slots.clone());
    let removed = service
        .delete(schedule_id, therapist_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "message": "Recurring schedule deactivated",
        "removed_slots": removed
    })))
}

#[axum::debug_handler]
pub async fn list_recurring_schedules(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = therapist_id_from(&user)?;

    let service = RecurringScheduleService::new(state.schedules.clone(), state.slots.clone());
    let schedules = service.list(therapist_id).await.map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "schedules": schedules
    })))
}

/// Full desired-state submission of ad-hoc availability. The whole payload
/// is reconciled in one pass; booked slots always survive.
#[axum::debug_handler]
pub async fn submit_availability(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Json(submission): Json<AvailabilitySubmission>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = therapist_id_from(&user)?;

    let reconciler = AvailabilityReconciler::new(state.slots.clone());
    let summary = reconciler
        .apply(therapist_id, &submission)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "summary": summary
    })))
}

/// Bookable slots from today onward. Therapists see their own calendar;
/// clients browse any therapist via `?therapist_id=`.
#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<AvailabilityState>,
    Extension(user): Extension<User>,
    Query(params): Query<SlotQueryParams>,
) -> Result<Json<Value>, AppError> {
    let therapist_id = if user.is_therapist() {
        Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?
    } else {
        params.therapist_id.ok_or_else(|| {
            AppError::BadRequest("therapist_id query parameter is required".to_string())
        })?
    };

    let today = Utc::now().date_naive();
    let slots = state
        .slots
        .find(therapist_id, Some(today))
        .await
        .map_err(|e| AppError::Storage(e.to_string()))?;

    let open: Vec<_> = slots.into_iter().filter(|slot| !slot.booked).collect();

    Ok(Json(json!({
        "success": true,
        "slots": open
    })))
}
