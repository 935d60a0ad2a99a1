use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use availability_cell::models::SessionType;
use availability_cell::store::SlotStore;
use shared_utils::slot_clock;

use crate::models::{
    Appointment, AppointmentStatus, BookAppointmentRequest, BookingError, CancelledBy,
    RescheduleAppointmentRequest, TimeSlot, APPOINTMENT_MINUTES,
};
use crate::services::notify::{AppointmentEvent, NotificationService};
use crate::store::{AppointmentStore, RelationshipStore, TherapistDirectory};

/// Creates and mutates appointments against the shared slot table. The slot
/// store's exclusive-booking operation is the only arbiter of double
/// booking; this service never checks-then-writes.
pub struct BookingService {
    appointments: Arc<dyn AppointmentStore>,
    slots: Arc<dyn SlotStore>,
    relationships: Arc<dyn RelationshipStore>,
    therapists: Arc<dyn TherapistDirectory>,
    notifier: Arc<NotificationService>,
}

impl BookingService {
    pub fn new(
        appointments: Arc<dyn AppointmentStore>,
        slots: Arc<dyn SlotStore>,
        relationships: Arc<dyn RelationshipStore>,
        therapists: Arc<dyn TherapistDirectory>,
        notifier: Arc<NotificationService>,
    ) -> Self {
        Self {
            appointments,
            slots,
            relationships,
            therapists,
            notifier,
        }
    }

    pub async fn book(
        &self,
        client_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, BookingError> {
        let start_time = slot_clock::parse_time(&request.time)?;

        debug!(
            "Booking request: client {} with therapist {} on {} at {}",
            client_id,
            request.therapist_id,
            request.date,
            slot_clock::to_24_hour(start_time)
        );

        // Fee snapshot before the claim, so a directory failure leaves the
        // slot untouched.
        let amount = self.therapists.current_fee(request.therapist_id).await?;

        self.slots
            .book_exclusive(
                request.therapist_id,
                request.date,
                start_time,
                request.session_type,
            )
            .await?;

        let end_time = slot_clock::add_minutes(start_time, APPOINTMENT_MINUTES);
        let meeting_link = match request.session_type {
            SessionType::Online => Some(String::new()),
            SessionType::InPerson => None,
        };

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            client_id,
            therapist_id: request.therapist_id,
            session_type: request.session_type,
            date: request.date,
            time_slot: TimeSlot {
                start_time,
                end_time,
            },
            status: AppointmentStatus::Upcoming,
            cancelled_by: None,
            amount,
            meeting_link,
            rating: None,
            review: None,
            modify_request: false,
            modify_message: None,
            created_at: now,
            updated_at: now,
        };
        self.appointments.insert(appointment.clone()).await?;

        self.relationships
            .ensure_ongoing(request.therapist_id, client_id)
            .await?;

        self.notifier
            .dispatch(AppointmentEvent::AppointmentBooked, &appointment)
            .await;

        info!(
            "Appointment {} booked: client {} with therapist {} on {}",
            appointment.id, client_id, request.therapist_id, request.date
        );
        Ok(appointment)
    }

    pub async fn reschedule(
        &self,
        id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.appointments.get(id).await?;
        if appointment.status != AppointmentStatus::Upcoming {
            return Err(BookingError::InvalidStatusTransition {
                from: appointment.status,
                to: AppointmentStatus::Upcoming,
            });
        }

        let new_start = slot_clock::parse_time(&request.time)?;
        let new_type = request.session_type.unwrap_or(appointment.session_type);

        // Claim the new slot before releasing the old one: a conflict here
        // leaves the original appointment completely untouched.
        self.slots
            .book_exclusive(appointment.therapist_id, request.date, new_start, new_type)
            .await?;

        let old_date = appointment.date;
        let old_start = appointment.time_slot.start_time;
        self.slots
            .release(appointment.therapist_id, old_date, old_start)
            .await?;

        appointment.date = request.date;
        appointment.time_slot = TimeSlot {
            start_time: new_start,
            end_time: slot_clock::add_minutes(new_start, APPOINTMENT_MINUTES),
        };
        if appointment.session_type != new_type {
            appointment.session_type = new_type;
            appointment.meeting_link = match new_type {
                SessionType::Online => Some(String::new()),
                SessionType::InPerson => None,
            };
        }
        appointment.modify_request = false;
        appointment.modify_message = None;
        appointment.updated_at = Utc::now();
        self.appointments.update(appointment.clone()).await?;

        self.notifier
            .dispatch(AppointmentEvent::AppointmentRescheduled, &appointment)
            .await;

        info!(
            "Appointment {} rescheduled to {} at {}",
            id,
            appointment.date,
            slot_clock::to_24_hour(new_start)
        );
        Ok(appointment)
    }

    pub async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: CancelledBy,
    ) -> Result<Appointment, BookingError> {
        let mut appointment = self.appointments.get(id).await?;
        if appointment.status != AppointmentStatus::Upcoming {
            return Err(BookingError::InvalidStatusTransition {
                from: appointment.status,
                to: AppointmentStatus::Cancelled,
            });
        }

        appointment.status = AppointmentStatus::Cancelled;
        appointment.cancelled_by = Some(cancelled_by);
        appointment.updated_at = Utc::now();
        self.appointments.update(appointment.clone()).await?;

        // The freed time goes straight back on offer.
        self.slots
            .release(
                appointment.therapist_id,
                appointment.date,
                appointment.time_slot.start_time,
            )
            .await?;

        self.notifier
            .dispatch(AppointmentEvent::AppointmentCancelled, &appointment)
            .await;

        info!("Appointment {} cancelled by {:?}", id, cancelled_by);
        Ok(appointment)
    }
}
