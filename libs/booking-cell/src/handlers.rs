use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    BookAppointmentRequest, BookingError, CancelledBy, RequestLinkChangeRequest,
    RescheduleAppointmentRequest, SubmitReviewRequest, UpdateMeetingLinkRequest,
};
use crate::router::BookingState;
use crate::services::booking::BookingService;
use crate::services::lifecycle::LifecycleService;
use crate::store::upcoming_only;

fn to_app_error(err: BookingError) -> AppError {
    match err {
        BookingError::SlotAlreadyBooked => {
            AppError::Conflict("Slot already booked".to_string())
        }
        BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        BookingError::InvalidStatusTransition { from, to } => AppError::BadRequest(format!(
            "Invalid status transition: {} -> {}",
            from, to
        )),
        BookingError::MalformedTime(msg) => {
            AppError::BadRequest(format!("Malformed time: {}", msg))
        }
        BookingError::Validation(msg) => AppError::ValidationError(msg),
        BookingError::Unauthorized => {
            AppError::Auth("Not authorized for this appointment".to_string())
        }
        BookingError::Storage(msg) => AppError::Storage(msg),
    }
}

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

fn booking_service(state: &BookingState) -> BookingService {
    BookingService::new(
        state.appointments.clone(),
        state.slots.clone(),
        state.relationships.clone(),
        state.therapists.clone(),
        state.notifier.clone(),
    )
}

fn lifecycle_service(state: &BookingState) -> LifecycleService {
    LifecycleService::new(state.appointments.clone(), state.notifier.clone())
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_client() {
        return Err(AppError::Auth(
            "Only clients can book appointments".to_string(),
        ));
    }
    let client_id = user_uuid(&user)?;

    let appointment = booking_service(&state)
        .book(client_id, request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// Either party may reschedule, but only their own appointment.
#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let user_id = user_uuid(&user)?;
    let existing = state
        .appointments
        .get(appointment_id)
        .await
        .map_err(|e| to_app_error(e.into()))?;
    if existing.client_id != user_id && existing.therapist_id != user_id {
        return Err(AppError::Auth(
            "Not authorized for this appointment".to_string(),
        ));
    }

    let appointment = booking_service(&state)
        .reschedule(appointment_id, request)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user_id = user_uuid(&user)?;
    let existing = state
        .appointments
        .get(appointment_id)
        .await
        .map_err(|e| to_app_error(e.into()))?;

    let cancelled_by = if existing.client_id == user_id {
        CancelledBy::Client
    } else if existing.therapist_id == user_id {
        CancelledBy::Therapist
    } else {
        return Err(AppError::Auth(
            "Not authorized for this appointment".to_string(),
        ));
    };

    let appointment = booking_service(&state)
        .cancel(appointment_id, cancelled_by)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !user.is_therapist() {
        return Err(AppError::Auth(
            "Only therapists can complete appointments".to_string(),
        ));
    }
    let therapist_id = user_uuid(&user)?;

    let appointment = lifecycle_service(&state)
        .complete(appointment_id, therapist_id)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn update_meeting_link(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateMeetingLinkRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_therapist() {
        return Err(AppError::Auth(
            "Only therapists can set the meeting link".to_string(),
        ));
    }
    let therapist_id = user_uuid(&user)?;

    let appointment = lifecycle_service(&state)
        .update_meeting_link(appointment_id, therapist_id, request.meeting_link)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn request_link_change(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RequestLinkChangeRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_client() {
        return Err(AppError::Auth(
            "Only clients can request a link change".to_string(),
        ));
    }
    let client_id = user_uuid(&user)?;

    let appointment = lifecycle_service(&state)
        .request_link_change(appointment_id, client_id, request.message)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn submit_review(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_client() {
        return Err(AppError::Auth(
            "Only clients can review appointments".to_string(),
        ));
    }
    let client_id = user_uuid(&user)?;

    let appointment = lifecycle_service(&state)
        .submit_review(appointment_id, client_id, request.rating, request.review)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user_id = user_uuid(&user)?;
    let appointment = state
        .appointments
        .get(appointment_id)
        .await
        .map_err(|e| to_app_error(e.into()))?;
    if appointment.client_id != user_id && appointment.therapist_id != user_id {
        return Err(AppError::Auth(
            "Not authorized for this appointment".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

/// The caller's own upcoming appointments, from either side of the table.
#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(state): State<BookingState>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = user_uuid(&user)?;

    let all = if user.is_therapist() {
        state.appointments.for_therapist(user_id).await
    } else {
        state.appointments.for_client(user_id).await
    }
    .map_err(|e| to_app_error(e.into()))?;

    let upcoming = upcoming_only(all);
    Ok(Json(json!({
        "success": true,
        "appointments": upcoming
    })))
}
