use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::store::StoreError;
use shared_utils::slot_clock::ClockError;

/// How a session is delivered. Serialized with the client-facing labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SessionType {
    #[serde(rename = "Online")]
    Online,
    #[serde(rename = "In-Person")]
    InPerson,
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionType::Online => write!(f, "Online"),
            SessionType::InPerson => write!(f, "In-Person"),
        }
    }
}

/// A named pause inside a recurrence window. Breaks are at least an hour
/// long, aligned to the hour, and must not overlap each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakWindow {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub label: Option<String>,
}

/// A weekly pattern that mechanically generates bookable slots over a date
/// range. Deactivated (never hard-deleted) when superseded or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceDefinition {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub label: Option<String>,
    /// Weekday indices, 0 = Sunday .. 6 = Saturday.
    pub days: Vec<u8>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub interval_minutes: u32,
    pub session_types: Vec<SessionType>,
    pub breaks: Vec<BreakWindow>,
    pub start_date: NaiveDate,
    /// Absent means open-ended; generation is capped at the 90-day horizon.
    pub end_date: Option<NaiveDate>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unique identity of a bookable slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub therapist_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub session_type: SessionType,
}

/// One unit of bookable therapist time. The single authoritative record:
/// `booked = true` rows double as the therapist's busy index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub therapist_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub session_type: SessionType,
    pub booked: bool,
    /// Back-reference to the generating recurrence; absent for manually
    /// submitted or booking-created slots.
    pub recurrence_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl AvailabilitySlot {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            therapist_id: self.therapist_id,
            date: self.date,
            time: self.time,
            session_type: self.session_type,
        }
    }
}

/// A slot emitted by the recurrence expander, before persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCandidate {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub session_type: SessionType,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BreakWindowRequest {
    pub start_time: String,
    pub end_time: String,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateRecurringScheduleRequest {
    pub label: Option<String>,
    pub days: Vec<u8>,
    pub start_time: String,
    pub end_time: String,
    pub interval_minutes: u32,
    pub session_types: Vec<SessionType>,
    #[serde(default)]
    pub breaks: Vec<BreakWindowRequest>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRecurringScheduleRequest {
    pub label: Option<String>,
    pub days: Option<Vec<u8>>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub interval_minutes: Option<u32>,
    pub session_types: Option<Vec<SessionType>>,
    pub breaks: Option<Vec<BreakWindowRequest>>,
    pub start_date: Option<NaiveDate>,
    /// Absent leaves the end date untouched; an explicit `null` clears it,
    /// turning the schedule open-ended.
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<NaiveDate>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<NaiveDate>::deserialize(deserializer).map(Some)
}

/// Full desired-state submission: date -> time string -> offered types.
/// Time strings accept both 24-hour and AM/PM forms.
pub type AvailabilitySubmission = BTreeMap<NaiveDate, BTreeMap<String, Vec<SessionType>>>;

/// What a reconciliation run changed. Re-applying the same submission must
/// yield `inserted == 0 && deleted == 0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub deleted: usize,
    pub kept: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AvailabilityError {
    #[error("Malformed time: {0}")]
    MalformedTime(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Recurring schedule not found")]
    ScheduleNotFound,

    #[error("Not authorized to modify this schedule")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<ClockError> for AvailabilityError {
    fn from(err: ClockError) -> Self {
        match err {
            ClockError::MalformedTime(s) => AvailabilityError::MalformedTime(s),
        }
    }
}

impl From<StoreError> for AvailabilityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AvailabilityError::ScheduleNotFound,
            other => AvailabilityError::Storage(other.to_string()),
        }
    }
}
