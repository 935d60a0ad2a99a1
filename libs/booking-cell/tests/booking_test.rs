use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use availability_cell::models::{AvailabilitySlot, SessionType};
use availability_cell::store::{InMemorySlotStore, SlotStore};
use shared_config::AppConfig;

use booking_cell::models::{
    AppointmentStatus, BookAppointmentRequest, BookingError, CancelledBy,
    RescheduleAppointmentRequest,
};
use booking_cell::services::booking::BookingService;
use booking_cell::services::notify::NotificationService;
use booking_cell::store::{
    AppointmentStore, InMemoryAppointmentStore, InMemoryRelationshipStore,
    InMemoryTherapistDirectory, RelationshipStore,
};

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 5, d).expect("valid date")
}

fn test_config() -> AppConfig {
    AppConfig {
        jwt_secret: "test-secret-key-for-jwt-validation".to_string(),
        notify_webhook_url: None,
        port: 3000,
    }
}

struct Harness {
    slots: Arc<InMemorySlotStore>,
    appointments: Arc<InMemoryAppointmentStore>,
    relationships: Arc<InMemoryRelationshipStore>,
    therapists: Arc<InMemoryTherapistDirectory>,
    service: Arc<BookingService>,
}

fn harness() -> Harness {
    let slots = Arc::new(InMemorySlotStore::new());
    let appointments = Arc::new(InMemoryAppointmentStore::new());
    let relationships = Arc::new(InMemoryRelationshipStore::new());
    let therapists = Arc::new(InMemoryTherapistDirectory::new(80.0));
    let notifier = Arc::new(NotificationService::new(&test_config()));
    let service = Arc::new(BookingService::new(
        appointments.clone(),
        slots.clone(),
        relationships.clone(),
        therapists.clone(),
        notifier,
    ));
    Harness {
        slots,
        appointments,
        relationships,
        therapists,
        service,
    }
}

async fn seed_open_slot(
    slots: &InMemorySlotStore,
    therapist_id: Uuid,
    d: NaiveDate,
    t: NaiveTime,
    session_type: SessionType,
) {
    slots
        .upsert(AvailabilitySlot {
            id: Uuid::new_v4(),
            therapist_id,
            date: d,
            time: t,
            session_type,
            booked: false,
            recurrence_id: None,
            created_at: Utc::now(),
        })
        .await
        .expect("seed slot");
}

fn book_request(therapist_id: Uuid, d: NaiveDate, t: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        therapist_id,
        session_type: SessionType::Online,
        date: d,
        time: t.to_string(),
    }
}

#[tokio::test]
async fn test_book_creates_upcoming_appointment() {
    let h = harness();
    let therapist_id = Uuid::new_v4();
    let client_id = Uuid::new_v4();
    h.therapists.set_fee(therapist_id, 120.0).await;
    seed_open_slot(&h.slots, therapist_id, date(4), time(9, 0), SessionType::Online).await;

    let appointment = h
        .service
        .book(client_id, book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("booking should succeed");

    assert_eq!(appointment.status, AppointmentStatus::Upcoming);
    assert_eq!(appointment.time_slot.start_time, time(9, 0));
    assert_eq!(appointment.time_slot.end_time, time(10, 0));
    assert_eq!(appointment.amount, 120.0);
    // Online appointments carry the empty-link placeholder.
    assert_eq!(appointment.meeting_link.as_deref(), Some(""));
    assert!(!appointment.modify_request);

    // The slot row is now flagged booked.
    let slots = h.slots.find(therapist_id, None).await.expect("find");
    assert_eq!(slots.len(), 1);
    assert!(slots[0].booked);

    // The care relationship exists.
    assert!(h
        .relationships
        .exists(therapist_id, client_id)
        .await
        .expect("exists"));
}

#[tokio::test]
async fn test_book_in_person_has_no_meeting_link() {
    let h = harness();
    let therapist_id = Uuid::new_v4();
    seed_open_slot(
        &h.slots,
        therapist_id,
        date(4),
        time(9, 0),
        SessionType::InPerson,
    )
    .await;

    let mut request = book_request(therapist_id, date(4), "9:00");
    request.session_type = SessionType::InPerson;
    let appointment = h
        .service
        .book(Uuid::new_v4(), request)
        .await
        .expect("booking should succeed");

    assert_eq!(appointment.meeting_link, None);
}

#[tokio::test]
async fn test_book_fee_snapshot_survives_fee_change() {
    let h = harness();
    let therapist_id = Uuid::new_v4();
    h.therapists.set_fee(therapist_id, 100.0).await;
    seed_open_slot(&h.slots, therapist_id, date(4), time(9, 0), SessionType::Online).await;

    let appointment = h
        .service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("booking should succeed");

    h.therapists.set_fee(therapist_id, 150.0).await;
    let stored = h.appointments.get(appointment.id).await.expect("get");
    assert_eq!(stored.amount, 100.0);
}

#[tokio::test]
async fn test_book_ad_hoc_time_without_exposed_slot() {
    let h = harness();
    let therapist_id = Uuid::new_v4();

    // No availability was ever submitted for this time; booking creates the
    // untagged booked row itself.
    let appointment = h
        .service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "15:00"))
        .await
        .expect("booking should succeed");
    assert_eq!(appointment.time_slot.start_time, time(15, 0));

    let slots = h.slots.find(therapist_id, None).await.expect("find");
    assert_eq!(slots.len(), 1);
    assert!(slots[0].booked);
    assert_eq!(slots[0].recurrence_id, None);
}

#[tokio::test]
async fn test_double_book_sequential_conflicts() {
    let h = harness();
    let therapist_id = Uuid::new_v4();
    seed_open_slot(&h.slots, therapist_id, date(4), time(9, 0), SessionType::Online).await;

    h.service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("first booking succeeds");

    let err = h
        .service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect_err("second booking must conflict");
    assert_matches!(err, BookingError::SlotAlreadyBooked);
}

#[tokio::test]
async fn test_double_book_other_session_type_also_conflicts() {
    let h = harness();
    let therapist_id = Uuid::new_v4();
    seed_open_slot(&h.slots, therapist_id, date(4), time(9, 0), SessionType::Online).await;
    seed_open_slot(
        &h.slots,
        therapist_id,
        date(4),
        time(9, 0),
        SessionType::InPerson,
    )
    .await;

    h.service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("online booking succeeds");

    // The therapist is busy at 09:00 regardless of delivery mode.
    let mut request = book_request(therapist_id, date(4), "9:00");
    request.session_type = SessionType::InPerson;
    let err = h
        .service
        .book(Uuid::new_v4(), request)
        .await
        .expect_err("in-person at the same time must conflict");
    assert_matches!(err, BookingError::SlotAlreadyBooked);
}

#[tokio::test]
async fn test_concurrent_booking_exactly_one_wins() {
    let h = harness();
    let therapist_id = Uuid::new_v4();
    seed_open_slot(&h.slots, therapist_id, date(4), time(9, 0), SessionType::Online).await;

    let service_a = h.service.clone();
    let service_b = h.service.clone();
    let task_a = tokio::spawn(async move {
        service_a
            .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
            .await
    });
    let task_b = tokio::spawn(async move {
        service_b
            .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
            .await
    });

    let result_a = task_a.await.expect("task a join");
    let result_b = task_b.await.expect("task b join");

    let successes = [&result_a, &result_b]
        .iter()
        .filter(|r| r.is_ok())
        .count();
    assert_eq!(successes, 1, "exactly one concurrent booking may win");

    let loser = if result_a.is_err() { result_a } else { result_b };
    assert_matches!(
        loser.expect_err("loser"),
        BookingError::SlotAlreadyBooked
    );
}

#[tokio::test]
async fn test_reschedule_moves_slot_flags() {
    let h = harness();
    let therapist_id = Uuid::new_v4();
    seed_open_slot(&h.slots, therapist_id, date(4), time(9, 0), SessionType::Online).await;
    seed_open_slot(&h.slots, therapist_id, date(5), time(10, 0), SessionType::Online).await;

    let appointment = h
        .service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("book");

    let updated = h
        .service
        .reschedule(
            appointment.id,
            RescheduleAppointmentRequest {
                date: date(5),
                time: "10:00".to_string(),
                session_type: None,
            },
        )
        .await
        .expect("reschedule");

    assert_eq!(updated.date, date(5));
    assert_eq!(updated.time_slot.start_time, time(10, 0));
    assert_eq!(updated.time_slot.end_time, time(11, 0));

    let slots = h.slots.find(therapist_id, None).await.expect("find");
    let old_slot = slots.iter().find(|s| s.date == date(4)).expect("old slot");
    let new_slot = slots.iter().find(|s| s.date == date(5)).expect("new slot");
    assert!(!old_slot.booked, "old slot is free again");
    assert!(new_slot.booked);
}

#[tokio::test]
async fn test_reschedule_conflict_leaves_original_untouched() {
    let h = harness();
    let therapist_id = Uuid::new_v4();
    seed_open_slot(&h.slots, therapist_id, date(4), time(9, 0), SessionType::Online).await;
    seed_open_slot(&h.slots, therapist_id, date(5), time(10, 0), SessionType::Online).await;

    let first = h
        .service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("book first");
    h.service
        .book(Uuid::new_v4(), book_request(therapist_id, date(5), "10:00"))
        .await
        .expect("book second");

    let err = h
        .service
        .reschedule(
            first.id,
            RescheduleAppointmentRequest {
                date: date(5),
                time: "10:00".to_string(),
                session_type: None,
            },
        )
        .await
        .expect_err("reschedule into taken slot must conflict");
    assert_matches!(err, BookingError::SlotAlreadyBooked);

    // Original appointment and its slot are untouched.
    let stored = h.appointments.get(first.id).await.expect("get");
    assert_eq!(stored.date, date(4));
    assert_eq!(stored.time_slot.start_time, time(9, 0));
    let slots = h.slots.find(therapist_id, None).await.expect("find");
    assert!(slots
        .iter()
        .any(|s| s.date == date(4) && s.time == time(9, 0) && s.booked));
}

#[tokio::test]
async fn test_reschedule_non_upcoming_rejected() {
    let h = harness();
    let therapist_id = Uuid::new_v4();

    let appointment = h
        .service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("book");
    h.service
        .cancel(appointment.id, CancelledBy::Client)
        .await
        .expect("cancel");

    let err = h
        .service
        .reschedule(
            appointment.id,
            RescheduleAppointmentRequest {
                date: date(5),
                time: "10:00".to_string(),
                session_type: None,
            },
        )
        .await
        .expect_err("cancelled appointment cannot be rescheduled");
    assert_matches!(err, BookingError::InvalidStatusTransition { .. });
}

#[tokio::test]
async fn test_cancel_frees_slot_and_records_actor() {
    let h = harness();
    let therapist_id = Uuid::new_v4();
    seed_open_slot(&h.slots, therapist_id, date(4), time(9, 0), SessionType::Online).await;

    let appointment = h
        .service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("book");

    let cancelled = h
        .service
        .cancel(appointment.id, CancelledBy::Therapist)
        .await
        .expect("cancel");
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(CancelledBy::Therapist));

    // The slot goes straight back on offer and is rebookable.
    let slots = h.slots.find(therapist_id, None).await.expect("find");
    assert!(!slots[0].booked);

    h.service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("rebooking the freed slot succeeds");
}

#[tokio::test]
async fn test_cancel_twice_rejected() {
    let h = harness();
    let therapist_id = Uuid::new_v4();

    let appointment = h
        .service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9:00"))
        .await
        .expect("book");
    h.service
        .cancel(appointment.id, CancelledBy::Client)
        .await
        .expect("first cancel");

    let err = h
        .service
        .cancel(appointment.id, CancelledBy::Client)
        .await
        .expect_err("second cancel must fail");
    assert_matches!(err, BookingError::InvalidStatusTransition { .. });
}

#[tokio::test]
async fn test_book_malformed_time_rejected_before_any_write() {
    let h = harness();
    let therapist_id = Uuid::new_v4();

    let err = h
        .service
        .book(Uuid::new_v4(), book_request(therapist_id, date(4), "9h30"))
        .await
        .expect_err("malformed time must fail");
    assert_matches!(err, BookingError::MalformedTime(_));

    let slots = h.slots.find(therapist_id, None).await.expect("find");
    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_unknown_appointment_is_not_found() {
    let h = harness();
    let err = h
        .service
        .cancel(Uuid::new_v4(), CancelledBy::Client)
        .await
        .expect_err("unknown appointment");
    assert_matches!(err, BookingError::NotFound);
}
