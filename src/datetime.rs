//! SAS date and datetime values
//!
//! The service counts datetimes in seconds and dates in days, both from
//! 1960-01-01 UTC. Fractional seconds are kept to the millisecond.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::{AdapterError, AdapterResult};

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1960, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Seconds since the SAS epoch to a UTC datetime
pub fn from_sas_datetime(seconds: f64) -> AdapterResult<DateTime<Utc>> {
    if !seconds.is_finite() {
        return Err(AdapterError::Argument(format!(
            "{seconds} is not a valid SAS datetime"
        )));
    }
    let millis = (seconds * 1000.0).round() as i64;
    Duration::try_milliseconds(millis)
        .and_then(|offset| epoch().checked_add_signed(offset))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AdapterError::Argument(format!("SAS datetime {seconds} is out of range")))
}

/// UTC datetime to seconds since the SAS epoch
pub fn to_sas_datetime(datetime: &DateTime<Utc>) -> f64 {
    let offset = datetime.naive_utc() - epoch();
    offset.num_milliseconds() as f64 / 1000.0
}

/// Days since the SAS epoch to a calendar date
pub fn from_sas_date(days: i64) -> AdapterResult<NaiveDate> {
    Duration::try_days(days)
        .and_then(|offset| epoch().date().checked_add_signed(offset))
        .ok_or_else(|| AdapterError::Argument(format!("SAS date {days} is out of range")))
}

pub fn to_sas_date(date: NaiveDate) -> i64 {
    (date - epoch().date()).num_days()
}
