use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use availability_cell::models::SessionType;
use availability_cell::store::StoreError;
use shared_utils::slot_clock::ClockError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Upcoming,
    Completed,
    Cancelled,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppointmentStatus::Upcoming => write!(f, "upcoming"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Client,
    Therapist,
}

/// Appointments are always one hour, regardless of the slot grid interval
/// they were booked against.
pub const APPOINTMENT_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A confirmed session between a client and a therapist. While `upcoming`,
/// its `(therapist_id, date, time_slot.start_time)` always corresponds to a
/// booked slot row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub client_id: Uuid,
    pub therapist_id: Uuid,
    pub session_type: SessionType,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    pub status: AppointmentStatus,
    pub cancelled_by: Option<CancelledBy>,
    /// Fee snapshot taken at booking time; later profile changes do not
    /// reprice existing appointments.
    pub amount: f64,
    /// `Some("")` placeholder for online appointments until the therapist
    /// supplies a link; `None` for in-person.
    pub meeting_link: Option<String>,
    pub rating: Option<u8>,
    pub review: Option<String>,
    pub modify_request: bool,
    pub modify_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn is_online(&self) -> bool {
        self.session_type == SessionType::Online
    }
}

/// An ongoing care link between a client and a therapist, created
/// idempotently on first booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CareRelationship {
    pub therapist_id: Uuid,
    pub client_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub therapist_id: Uuid,
    pub session_type: SessionType,
    pub date: NaiveDate,
    /// Accepts both 24-hour and AM/PM forms.
    pub time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub date: NaiveDate,
    pub time: String,
    pub session_type: Option<SessionType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMeetingLinkRequest {
    pub meeting_link: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestLinkChangeRequest {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitReviewRequest {
    pub rating: u8,
    pub review: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Slot already booked")]
    SlotAlreadyBooked,

    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Malformed time: {0}")]
    MalformedTime(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized for this appointment")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ClockError> for BookingError {
    fn from(err: ClockError) -> Self {
        match err {
            ClockError::MalformedTime(s) => BookingError::MalformedTime(s),
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::SlotTaken => BookingError::SlotAlreadyBooked,
            StoreError::NotFound => BookingError::NotFound,
            StoreError::Backend(msg) => BookingError::Storage(msg),
        }
    }
}
