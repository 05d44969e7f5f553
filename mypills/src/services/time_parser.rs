//! Reminder time parsing
//!
//! Turns the free-form time a user typed for a pill ("8:00 AM", "2:00pm",
//! "14:30") into the next instant that time occurs on the device clock.

use chrono::{DateTime, Duration, NaiveTime, TimeZone};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeParseError {
    #[error("time is empty")]
    Empty,

    #[error("unrecognized time format: {0:?}")]
    UnrecognizedFormat(String),

    #[error("hour {0} is out of range")]
    HourOutOfRange(u32),

    #[error("minute {0} is out of range")]
    MinuteOutOfRange(u32),

    #[error("{0} does not exist on the local clock today")]
    NonexistentLocalTime(NaiveTime),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

/// Parse `raw` and return its next occurrence strictly after `now`.
///
/// The result is `now`'s calendar day at the parsed hour and minute, pushed
/// forward by exactly one day when that instant is not in the future, so it
/// always lands in `(now, now + 24h]`.
pub fn parse<Tz: TimeZone>(raw: &str, now: &DateTime<Tz>) -> Result<DateTime<Tz>, TimeParseError> {
    let time = parse_time_of_day(raw)?;
    next_occurrence(time, now)
}

/// Parse a 12-hour ("8:00 AM") or 24-hour ("14:00") time of day.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, TimeParseError> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
    if normalized.is_empty() {
        return Err(TimeParseError::Empty);
    }

    let (clock, meridiem) = if let Some(rest) = normalized.strip_suffix("AM") {
        (rest.trim_end(), Some(Meridiem::Am))
    } else if let Some(rest) = normalized.strip_suffix("PM") {
        (rest.trim_end(), Some(Meridiem::Pm))
    } else {
        (normalized.as_str(), None)
    };

    let unrecognized = || TimeParseError::UnrecognizedFormat(raw.to_string());

    let (hour_part, minute_part) = clock.split_once(':').ok_or_else(unrecognized)?;
    let all_digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !all_digits(hour_part) || hour_part.len() > 2 {
        return Err(unrecognized());
    }
    if !all_digits(minute_part) || minute_part.len() != 2 {
        return Err(unrecognized());
    }

    let hour: u32 = hour_part.parse().map_err(|_| unrecognized())?;
    let minute: u32 = minute_part.parse().map_err(|_| unrecognized())?;

    if minute > 59 {
        return Err(TimeParseError::MinuteOutOfRange(minute));
    }

    let hour = match meridiem {
        Some(meridiem) => {
            if !(1..=12).contains(&hour) {
                return Err(TimeParseError::HourOutOfRange(hour));
            }
            match (meridiem, hour) {
                (Meridiem::Am, 12) => 0,
                (Meridiem::Am, h) => h,
                (Meridiem::Pm, 12) => 12,
                (Meridiem::Pm, h) => h + 12,
            }
        }
        None => {
            if hour > 23 {
                return Err(TimeParseError::HourOutOfRange(hour));
            }
            hour
        }
    };

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or(TimeParseError::HourOutOfRange(hour))
}

/// Next instant strictly after `now` at wall-clock `time`.
pub fn next_occurrence<Tz: TimeZone>(
    time: NaiveTime,
    now: &DateTime<Tz>,
) -> Result<DateTime<Tz>, TimeParseError> {
    let tz = now.timezone();
    let naive = now.date_naive().and_time(time);

    // A DST gap swallows the requested wall time; fire at the first valid minute after it.
    let candidate = tz
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .ok_or(TimeParseError::NonexistentLocalTime(time))?;

    if candidate <= *now {
        Ok(candidate + Duration::days(1))
    } else {
        Ok(candidate)
    }
}
