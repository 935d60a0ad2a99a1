use assert_matches::assert_matches;
use chrono::{Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use uuid::Uuid;

use availability_cell::models::{
    AvailabilityError, BreakWindow, RecurrenceDefinition, SessionType,
};
use availability_cell::services::recurrence;

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn base_definition() -> RecurrenceDefinition {
    let now = Utc::now();
    RecurrenceDefinition {
        id: Uuid::new_v4(),
        therapist_id: Uuid::new_v4(),
        label: None,
        days: vec![1], // Monday
        start_time: time(9, 0),
        end_time: time(11, 0),
        interval_minutes: 60,
        session_types: vec![SessionType::Online],
        breaks: vec![],
        start_date: date(2026, 3, 2), // a Monday
        end_date: Some(date(2026, 3, 2)),
        active: true,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_expand_single_monday_window() {
    let definition = base_definition();
    let candidates = recurrence::expand(&definition);

    // 09:00-11:00 hourly yields exactly 09:00 and 10:00, never 11:00.
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].time, time(9, 0));
    assert_eq!(candidates[1].time, time(10, 0));
    assert!(candidates.iter().all(|c| c.date == date(2026, 3, 2)));
    assert!(candidates
        .iter()
        .all(|c| c.session_type == SessionType::Online));
}

#[test]
fn test_expand_multiplies_session_types() {
    let mut definition = base_definition();
    definition.session_types = vec![SessionType::Online, SessionType::InPerson];

    let candidates = recurrence::expand(&definition);
    assert_eq!(candidates.len(), 4);
    let online = candidates
        .iter()
        .filter(|c| c.session_type == SessionType::Online)
        .count();
    assert_eq!(online, 2);
}

#[test]
fn test_expand_skips_break_half_open() {
    let mut definition = base_definition();
    definition.end_time = time(14, 0);
    definition.breaks = vec![BreakWindow {
        start_time: time(12, 0),
        end_time: time(13, 0),
        label: Some("Lunch".to_string()),
    }];

    let candidates = recurrence::expand(&definition);
    let times: Vec<NaiveTime> = candidates.iter().map(|c| c.time).collect();

    // 12:00 falls inside the break, 13:00 (the break's end) does not.
    assert!(!times.contains(&time(12, 0)));
    assert!(times.contains(&time(13, 0)));
    assert_eq!(times, vec![time(9, 0), time(10, 0), time(11, 0), time(13, 0)]);
}

#[test]
fn test_expand_two_hour_interval_drops_ragged_tail() {
    let mut definition = base_definition();
    definition.interval_minutes = 120;
    definition.end_time = time(12, 0);

    // 09:00-12:00 at 120 minutes: 09:00 and 11:00 both start before noon.
    let candidates = recurrence::expand(&definition);
    let times: Vec<NaiveTime> = candidates.iter().map(|c| c.time).collect();
    assert_eq!(times, vec![time(9, 0), time(11, 0)]);
}

#[test]
fn test_expand_open_ended_caps_at_horizon() {
    let mut definition = base_definition();
    definition.end_date = None;

    let candidates = recurrence::expand(&definition);
    let horizon = definition.start_date + chrono::Duration::days(90);

    assert!(!candidates.is_empty());
    assert!(candidates.iter().all(|c| c.date <= horizon));
    assert!(candidates
        .iter()
        .all(|c| c.date.weekday() == Weekday::Mon));
    // A 90-day window starting on a Monday contains 13 Mondays.
    let mondays: std::collections::BTreeSet<_> = candidates.iter().map(|c| c.date).collect();
    assert_eq!(mondays.len(), 13);
}

#[test]
fn test_expand_explicit_end_date_also_capped() {
    let mut definition = base_definition();
    definition.end_date = Some(definition.start_date + chrono::Duration::days(365));

    let candidates = recurrence::expand(&definition);
    let horizon = definition.start_date + chrono::Duration::days(90);
    assert!(candidates.iter().all(|c| c.date <= horizon));
}

#[test]
fn test_expand_is_deterministic() {
    let definition = base_definition();
    assert_eq!(recurrence::expand(&definition), recurrence::expand(&definition));
}

#[test]
fn test_validate_rejects_bad_interval() {
    let mut definition = base_definition();
    definition.interval_minutes = 45;
    let err = recurrence::validate(&definition).expect_err("45 minutes must be rejected");
    assert_matches!(err, AvailabilityError::Validation(_));
}

#[test]
fn test_validate_rejects_empty_days_and_types() {
    let mut definition = base_definition();
    definition.days = vec![];
    assert!(recurrence::validate(&definition).is_err());

    let mut definition = base_definition();
    definition.session_types = vec![];
    assert!(recurrence::validate(&definition).is_err());
}

#[test]
fn test_validate_rejects_day_out_of_range() {
    let mut definition = base_definition();
    definition.days = vec![1, 7];
    assert!(recurrence::validate(&definition).is_err());
}

#[test]
fn test_validate_rejects_inverted_window() {
    let mut definition = base_definition();
    definition.start_time = time(11, 0);
    definition.end_time = time(9, 0);
    assert!(recurrence::validate(&definition).is_err());
}

#[test]
fn test_validate_rejects_end_date_before_start_date() {
    let mut definition = base_definition();
    definition.end_date = Some(date(2026, 3, 1));
    assert!(recurrence::validate(&definition).is_err());
}

#[test]
fn test_validate_break_rules() {
    // Unaligned break.
    let mut definition = base_definition();
    definition.breaks = vec![BreakWindow {
        start_time: time(9, 30),
        end_time: time(10, 30),
        label: None,
    }];
    assert!(recurrence::validate(&definition).is_err());

    // Too short.
    let mut definition = base_definition();
    definition.breaks = vec![BreakWindow {
        start_time: time(10, 0),
        end_time: time(10, 0),
        label: None,
    }];
    assert!(recurrence::validate(&definition).is_err());

    // Overlapping pair.
    let mut definition = base_definition();
    definition.end_time = time(15, 0);
    definition.breaks = vec![
        BreakWindow {
            start_time: time(10, 0),
            end_time: time(12, 0),
            label: None,
        },
        BreakWindow {
            start_time: time(11, 0),
            end_time: time(13, 0),
            label: None,
        },
    ];
    assert!(recurrence::validate(&definition).is_err());

    // Adjacent breaks are fine.
    let mut definition = base_definition();
    definition.end_time = time(15, 0);
    definition.breaks = vec![
        BreakWindow {
            start_time: time(10, 0),
            end_time: time(11, 0),
            label: None,
        },
        BreakWindow {
            start_time: time(11, 0),
            end_time: time(12, 0),
            label: None,
        },
    ];
    assert!(recurrence::validate(&definition).is_ok());
}

#[test]
fn test_weekday_index_is_sunday_based() {
    assert_eq!(recurrence::weekday_index(date(2026, 3, 1)), 0); // Sunday
    assert_eq!(recurrence::weekday_index(date(2026, 3, 2)), 1); // Monday
    assert_eq!(recurrence::weekday_index(date(2026, 3, 7)), 6); // Saturday
}
