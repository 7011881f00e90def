//! Renewal-adjusted due dates and urgency bands.
//!
//! Due dates arrive as calendar dates, not instants. They are pinned to
//! local midnight so that an item due "2024-01-10" is due on the 10th
//! wherever the user is, then pushed out by any renewals still available.

use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDate, NaiveTime, TimeZone};
use thiserror::Error;

use crate::models::{ComputedCheckout, RawCheckout};

/// Renewals the library allows per checkout.
pub const MAX_RENEWS: u32 = 2;

/// Each renewal extends the loan by three weeks.
pub const RENEWAL_PERIOD_DAYS: i64 = 21;

const WEEK_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// The stored due date is not a calendar date.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid due date {value:?}")]
pub struct DueDateError {
    pub value: String,
}

/// Parse the `YYYY-MM-DD` prefix of a due date, ignoring any time or zone suffix.
pub fn parse_due_date(value: &str) -> Result<NaiveDate, DueDateError> {
    let err = || DueDateError {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let date_part = trimmed.get(..10).ok_or_else(err)?;
    match trimmed.as_bytes().get(10) {
        None | Some(b'T' | b't' | b' ' | b'Z' | b'z' | b'+' | b'-') => {}
        Some(_) => return Err(err()),
    }

    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| err())
}

/// Start of `date` in the local time zone.
///
/// Where a DST change skips midnight the first valid instant of the day
/// is used instead.
pub fn local_midnight(date: NaiveDate) -> Option<DateTime<Local>> {
    let midnight = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
}

/// Derive the display-ready checkout from its stored form.
///
/// Once the original due date has passed the item is not projected forward
/// by its remaining renewals, so an overdue loan is reported as overdue.
pub fn compute(rec: &RawCheckout, now: DateTime<Local>) -> Result<ComputedCheckout, DueDateError> {
    let date = parse_due_date(&rec.due_date)?;
    let original = local_midnight(date).ok_or_else(|| DueDateError {
        value: rec.due_date.clone(),
    })?;

    let renews_left = MAX_RENEWS.saturating_sub(rec.times_renewed);

    let projected = original >= now && renews_left > 0;
    let real_due = if projected {
        // Calendar days, so a DST change inside the window keeps local midnight
        let days = RENEWAL_PERIOD_DAYS as u64 * u64::from(renews_left);
        date.checked_add_days(Days::new(days))
            .and_then(local_midnight)
            .ok_or_else(|| DueDateError {
                value: rec.due_date.clone(),
            })?
    } else {
        original
    };

    let real_due_ms = real_due.timestamp_millis();
    let diff = real_due_ms - now.timestamp_millis();

    Ok(ComputedCheckout {
        raw: rec.clone(),
        renews_left,
        real_due_ms,
        overdue: diff < 0,
        due_within_week: (0..WEEK_MS).contains(&diff),
        due_within_2wks: (WEEK_MS..2 * WEEK_MS).contains(&diff),
        display_date: format!("{}/{}", real_due.month(), real_due.day()),
        renew_label: projected.then(|| format!("+{}wk", renews_left * 3)),
    })
}
