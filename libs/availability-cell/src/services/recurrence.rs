use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};

use shared_utils::slot_clock::minute_of_day;

use crate::models::{AvailabilityError, BreakWindow, RecurrenceDefinition, SlotCandidate};

/// Open-ended definitions generate at most this far past their start date.
pub const GENERATION_HORIZON_DAYS: i64 = 90;

/// One session plus an optional break; nothing else fits the slot grid.
pub const ALLOWED_INTERVALS: [u32; 2] = [60, 120];

pub const MIN_BREAK_MINUTES: u32 = 60;

/// Weekday index with 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    match date.weekday() {
        Weekday::Sun => 0,
        Weekday::Mon => 1,
        Weekday::Tue => 2,
        Weekday::Wed => 3,
        Weekday::Thu => 4,
        Weekday::Fri => 5,
        Weekday::Sat => 6,
    }
}

/// Half-open interval intersection: `[a_start, a_end)` vs `[b_start, b_end)`.
pub fn windows_overlap(
    a_start: NaiveTime,
    a_end: NaiveTime,
    b_start: NaiveTime,
    b_end: NaiveTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

pub fn validate(definition: &RecurrenceDefinition) -> Result<(), AvailabilityError> {
    if definition.days.is_empty() {
        return Err(AvailabilityError::Validation(
            "At least one weekday must be selected".to_string(),
        ));
    }
    if let Some(day) = definition.days.iter().find(|d| **d > 6) {
        return Err(AvailabilityError::Validation(format!(
            "Day of week must be between 0 (Sunday) and 6 (Saturday), got {}",
            day
        )));
    }
    if !ALLOWED_INTERVALS.contains(&definition.interval_minutes) {
        return Err(AvailabilityError::Validation(format!(
            "Slot interval must be 60 or 120 minutes, got {}",
            definition.interval_minutes
        )));
    }
    if definition.session_types.is_empty() {
        return Err(AvailabilityError::Validation(
            "At least one session type must be selected".to_string(),
        ));
    }
    if definition.start_time >= definition.end_time {
        return Err(AvailabilityError::Validation(
            "Start time must be before end time".to_string(),
        ));
    }
    if let Some(end_date) = definition.end_date {
        if end_date < definition.start_date {
            return Err(AvailabilityError::Validation(
                "End date must not be before start date".to_string(),
            ));
        }
    }
    validate_breaks(&definition.breaks)
}

fn validate_breaks(breaks: &[BreakWindow]) -> Result<(), AvailabilityError> {
    for brk in breaks {
        if brk.start_time.minute() != 0 || brk.end_time.minute() != 0 {
            return Err(AvailabilityError::Validation(
                "Break times must be aligned to the hour".to_string(),
            ));
        }
        if brk.start_time >= brk.end_time {
            return Err(AvailabilityError::Validation(
                "Break start must be before break end".to_string(),
            ));
        }
        let length = minute_of_day(brk.end_time) - minute_of_day(brk.start_time);
        if length < MIN_BREAK_MINUTES {
            return Err(AvailabilityError::Validation(format!(
                "Breaks must be at least {} minutes",
                MIN_BREAK_MINUTES
            )));
        }
    }
    for (i, a) in breaks.iter().enumerate() {
        for b in breaks.iter().skip(i + 1) {
            if windows_overlap(a.start_time, a.end_time, b.start_time, b.end_time) {
                return Err(AvailabilityError::Validation(
                    "Breaks must not overlap each other".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Expand a recurrence definition into its full set of slot candidates.
/// Pure and deterministic: same definition, same output.
pub fn expand(definition: &RecurrenceDefinition) -> Vec<SlotCandidate> {
    let horizon = definition.start_date + Duration::days(GENERATION_HORIZON_DAYS);
    let window_end = match definition.end_date {
        Some(end_date) => end_date.min(horizon),
        None => horizon,
    };

    let start_minute = minute_of_day(definition.start_time);
    let end_minute = minute_of_day(definition.end_time);

    let mut candidates = Vec::new();
    let mut date = definition.start_date;
    while date <= window_end {
        if definition.days.contains(&weekday_index(date)) {
            // Step in whole intervals; a ragged final partial period simply
            // goes unscheduled.
            let mut minute = start_minute;
            while minute < end_minute {
                let time = time_from_minute(minute);
                if !falls_in_break(time, &definition.breaks) {
                    for session_type in &definition.session_types {
                        candidates.push(SlotCandidate {
                            date,
                            time,
                            session_type: *session_type,
                        });
                    }
                }
                minute += definition.interval_minutes.max(1);
            }
        }
        date += Duration::days(1);
    }

    candidates
}

/// Break test uses half-open semantics: `start <= t < end`.
fn falls_in_break(time: NaiveTime, breaks: &[BreakWindow]) -> bool {
    breaks
        .iter()
        .any(|brk| brk.start_time <= time && time < brk.end_time)
}

fn time_from_minute(minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0).unwrap_or(NaiveTime::MIN)
}
