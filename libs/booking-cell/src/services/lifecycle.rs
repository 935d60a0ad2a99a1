use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentStatus, BookingError};
use crate::services::notify::{AppointmentEvent, NotificationService};
use crate::store::AppointmentStore;

/// Legal transitions of the appointment state machine. `completed` and
/// `cancelled` are terminal.
pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current {
        AppointmentStatus::Upcoming => {
            &[AppointmentStatus::Completed, AppointmentStatus::Cancelled]
        }
        AppointmentStatus::Completed => &[],
        AppointmentStatus::Cancelled => &[],
    }
}

pub fn validate_status_transition(
    current: AppointmentStatus,
    next: AppointmentStatus,
) -> Result<(), BookingError> {
    if valid_transitions(current).contains(&next) {
        Ok(())
    } else {
        Err(BookingError::InvalidStatusTransition {
            from: current,
            to: next,
        })
    }
}

/// Post-booking mutations that do not move the slot table: completion,
/// meeting links, reviews.
pub struct LifecycleService {
    appointments: Arc<dyn AppointmentStore>,
    notifier: Arc<NotificationService>,
}

impl LifecycleService {
    pub fn new(appointments: Arc<dyn AppointmentStore>, notifier: Arc<NotificationService>) -> Self {
        Self {
            appointments,
            notifier,
        }
    }

    pub async fn complete(&self, id: Uuid, therapist_id: Uuid) -> Result<Appointment, BookingError> {
        let mut appointment = self.appointments.get(id).await?;
        if appointment.therapist_id != therapist_id {
            return Err(BookingError::Unauthorized);
        }
        validate_status_transition(appointment.status, AppointmentStatus::Completed)?;

        appointment.status = AppointmentStatus::Completed;
        appointment.updated_at = Utc::now();
        self.appointments.update(appointment.clone()).await?;

        self.notifier
            .dispatch(AppointmentEvent::AppointmentCompleted, &appointment)
            .await;

        info!("Appointment {} marked completed", id);
        Ok(appointment)
    }

    pub async fn update_meeting_link(
        &self,
        id: Uuid,
        therapist_id: Uuid,
        meeting_link: String,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.appointments.get(id).await?;
        if appointment.therapist_id != therapist_id {
            return Err(BookingError::Unauthorized);
        }
        if appointment.status != AppointmentStatus::Upcoming {
            return Err(BookingError::Validation(
                "Meeting link can only be set on upcoming appointments".to_string(),
            ));
        }
        if !appointment.is_online() {
            return Err(BookingError::Validation(
                "In-person appointments have no meeting link".to_string(),
            ));
        }
        if meeting_link.trim().is_empty() {
            return Err(BookingError::Validation(
                "Meeting link must not be empty".to_string(),
            ));
        }

        appointment.meeting_link = Some(meeting_link);
        appointment.modify_request = false;
        appointment.modify_message = None;
        appointment.updated_at = Utc::now();
        self.appointments.update(appointment.clone()).await?;

        info!("Meeting link updated for appointment {}", id);
        Ok(appointment)
    }

    pub async fn request_link_change(
        &self,
        id: Uuid,
        client_id: Uuid,
        message: Option<String>,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.appointments.get(id).await?;
        if appointment.client_id != client_id {
            return Err(BookingError::Unauthorized);
        }
        if appointment.status != AppointmentStatus::Upcoming {
            return Err(BookingError::Validation(
                "Link changes can only be requested for upcoming appointments".to_string(),
            ));
        }
        if !appointment.is_online() {
            return Err(BookingError::Validation(
                "In-person appointments have no meeting link".to_string(),
            ));
        }

        appointment.modify_request = true;
        appointment.modify_message = message;
        appointment.updated_at = Utc::now();
        self.appointments.update(appointment.clone()).await?;

        info!("Link change requested for appointment {}", id);
        Ok(appointment)
    }

    pub async fn submit_review(
        &self,
        id: Uuid,
        client_id: Uuid,
        rating: u8,
        review: Option<String>,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.appointments.get(id).await?;
        if appointment.client_id != client_id {
            return Err(BookingError::Unauthorized);
        }
        if appointment.status != AppointmentStatus::Completed {
            return Err(BookingError::Validation(
                "Only completed appointments can be reviewed".to_string(),
            ));
        }
        if !(1..=5).contains(&rating) {
            return Err(BookingError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        appointment.rating = Some(rating);
        appointment.review = review;
        appointment.updated_at = Utc::now();
        self.appointments.update(appointment.clone()).await?;

        info!("Review submitted for appointment {}", id);
        Ok(appointment)
    }
}
