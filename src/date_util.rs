use std::sync::LazyLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;

use crate::error::{Error, Result};

static RE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[T ].*)?$").unwrap());
static RE_US: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})(?:\s.*)?$").unwrap());
static RE_YMD_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})(?:\s.*)?$").unwrap());

/// Largest serial day a spreadsheet will render (9999-12-31).
const MAX_SERIAL: f64 = 2_958_465.0;

/// Fractions this close to the next whole day are treated as that day.
const SERIAL_EPSILON: f64 = 1e-6;

/// Day zero of the spreadsheet serial calendar.
pub fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap()
}

/// Convert a spreadsheet serial day number to a calendar date.
///
/// The fractional part is a time of day and is discarded. Values a hair
/// below a whole number (float noise from ms arithmetic) round up to it.
pub fn from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(0.0..=MAX_SERIAL).contains(&serial) {
        return None;
    }
    let mut days = serial.floor();
    if serial - days > 1.0 - SERIAL_EPSILON {
        days += 1.0;
    }
    serial_epoch().checked_add_signed(Duration::days(days as i64))
}

/// Parse a calendar date from the string forms sheets have produced over time:
/// `2025-01-31`, `2025-01-31T08:00:00.000Z`, `1/31/2025`, `2025/01/31`.
/// A bare number is read as a serial day.
pub fn parse_date_str(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DateParse("empty date".into()));
    }

    let ymd = if let Some(caps) = RE_ISO.captures(s) {
        Some((caps[1].parse(), caps[2].parse(), caps[3].parse()))
    } else if let Some(caps) = RE_YMD_SLASH.captures(s) {
        Some((caps[1].parse(), caps[2].parse(), caps[3].parse()))
    } else if let Some(caps) = RE_US.captures(s) {
        Some((caps[3].parse(), caps[1].parse(), caps[2].parse()))
    } else {
        None
    };

    if let Some((Ok(y), Ok(m), Ok(d))) = ymd {
        return NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| Error::DateParse(format!("out of range: {s}")));
    }

    if let Ok(serial) = s.parse::<f64>() {
        return from_serial(serial).ok_or_else(|| Error::DateParse(format!("bad serial: {s}")));
    }

    Err(Error::DateParse(format!("unrecognized date: {s}")))
}

/// Sunday that starts the week containing `d`.
pub fn start_of_week(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.weekday().num_days_from_sunday() as i64)
}

pub fn first_of_month(d: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(d.year(), d.month(), 1).unwrap()
}
