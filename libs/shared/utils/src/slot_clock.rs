use chrono::{Duration, NaiveTime, Timelike};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClockError {
    #[error("Malformed time: {0}")]
    MalformedTime(String),
}

#[derive(Clone, Copy)]
enum Meridiem {
    Am,
    Pm,
}

/// Parse a wall-clock time string. Accepts `"H:MM"`/`"HH:MM"` in 24-hour
/// form and `"H:MM AM"`/`"H:MM PM"` (meridiem case-insensitive, space
/// optional). All times are therapist-local wall clock; there is no
/// timezone handling anywhere in the scheduling core.
pub fn parse_time(input: &str) -> Result<NaiveTime, ClockError> {
    let malformed = || ClockError::MalformedTime(input.to_string());

    let upper = input.trim().to_ascii_uppercase();
    let (clock, meridiem) = if let Some(rest) = upper.strip_suffix("AM") {
        (rest.trim_end(), Some(Meridiem::Am))
    } else if let Some(rest) = upper.strip_suffix("PM") {
        (rest.trim_end(), Some(Meridiem::Pm))
    } else {
        (upper.as_str(), None)
    };

    let (hour_part, minute_part) = clock.split_once(':').ok_or_else(malformed)?;
    if hour_part.is_empty() || minute_part.is_empty() {
        return Err(malformed());
    }

    let hour: u32 = hour_part.parse().map_err(|_| malformed())?;
    let minute: u32 = minute_part.parse().map_err(|_| malformed())?;
    if minute > 59 {
        return Err(malformed());
    }

    let hour = match meridiem {
        Some(m) => {
            // A meridiem attached to an hour outside 1-12 is ambiguous.
            if !(1..=12).contains(&hour) {
                return Err(malformed());
            }
            match (m, hour) {
                (Meridiem::Am, 12) => 0,
                (Meridiem::Am, h) => h,
                (Meridiem::Pm, 12) => 12,
                (Meridiem::Pm, h) => h + 12,
            }
        }
        None => {
            if hour > 23 {
                return Err(malformed());
            }
            hour
        }
    };

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(malformed)
}

/// Format as zero-padded 24-hour `"HH:MM"`.
pub fn to_24_hour(t: NaiveTime) -> String {
    format!("{:02}:{:02}", t.hour(), t.minute())
}

/// Format as `"h:MM AM"`/`"h:MM PM"`.
pub fn to_12_hour(t: NaiveTime) -> String {
    let (is_pm, hour) = t.hour12();
    format!(
        "{}:{:02} {}",
        hour,
        t.minute(),
        if is_pm { "PM" } else { "AM" }
    )
}

/// Minute arithmetic on a wall clock, wrapping at midnight.
pub fn add_minutes(t: NaiveTime, minutes: i64) -> NaiveTime {
    t.overflowing_add_signed(Duration::minutes(minutes)).0
}

pub fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}
