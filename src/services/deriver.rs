//! Event derivation - classified attendees to ordered lifecycle events
//!
//! Each attendee yields at most two events, registration before attendance.
//! Unparseable dates never fail the batch; they fall back to the derivation time.

use crate::domain::event::epoch_secs;
use crate::domain::types::{non_blank, ClassifiedAttendee, EventSettings};
use crate::domain::{DomainEvent, EventKind, EventMetadata};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use smallvec::SmallVec;
use tracing::debug;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%B %d, %Y %H:%M",
    "%b %d, %Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y"];

/// Parse an export date string to unix seconds. Naive values are read as UTC.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.timestamp());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
        }
    }
    None
}

/// Timestamp for an optional date field, or now
fn timestamp_or_now(value: Option<&str>, now: i64) -> i64 {
    match non_blank(value) {
        Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
            debug!(value = %raw, "date_unparseable_using_now");
            now
        }),
        None => now,
    }
}

/// Expand one attendee into zero, one or two events
pub fn derive_for_attendee(
    classified: &ClassifiedAttendee,
    settings: &EventSettings,
    now: i64,
) -> SmallVec<[DomainEvent; 2]> {
    let mut events = SmallVec::new();
    let attendee = &classified.attendee;

    let metadata = EventMetadata {
        event_name: non_blank(settings.event_name.as_deref()).map(str::to_string),
        event_date: settings.combined_event_date(),
        ticket_type: non_blank(attendee.ticket_type.as_deref()).map(str::to_string),
        presenter: non_blank(settings.presenter.as_deref()).map(str::to_string),
    };

    let make = |kind: EventKind, occurred_at: i64| DomainEvent {
        kind,
        occurred_at,
        email: attendee.email.clone(),
        name: attendee.name.clone(),
        phone: attendee.phone.clone(),
        metadata: metadata.clone(),
    };

    if classified.has_registration {
        let ts = timestamp_or_now(attendee.registration_date.as_deref(), now);
        events.push(make(EventKind::Registered, ts));
    }
    if classified.has_attendance {
        let ts = timestamp_or_now(attendee.attendance_date.as_deref(), now);
        events.push(make(EventKind::Attended, ts));
    }

    events
}

/// Flatten a batch into one ordered event sequence
pub fn derive_events(attendees: &[ClassifiedAttendee], settings: &EventSettings) -> Vec<DomainEvent> {
    let now = epoch_secs();
    attendees.iter().flat_map(|a| derive_for_attendee(a, settings, now)).collect()
}
