//! Disposition classification - registration/attendance flags per attendee
//!
//! Pure and infallible. An attendee with no matching signal gets both flags
//! false and later contributes no events.

use crate::domain::types::{non_blank, Attendee, ClassifiedAttendee};

const REGISTRATION_MARKERS: [&str; 2] = ["registered", "registration"];
const ATTENDANCE_MARKERS: [&str; 3] = ["attended", "checked", "present"];

pub fn classify(attendee: Attendee) -> ClassifiedAttendee {
    let status = attendee.status.as_deref().map(str::to_lowercase).unwrap_or_default();

    let has_registration = non_blank(attendee.registration_date.as_deref()).is_some()
        || REGISTRATION_MARKERS.iter().any(|m| status.contains(m));

    let has_attendance = attendee.has_joined_event == Some(true)
        || non_blank(attendee.attendance_date.as_deref()).is_some()
        || ATTENDANCE_MARKERS.iter().any(|m| status.contains(m));

    ClassifiedAttendee { attendee, has_registration, has_attendance }
}

/// Classify a batch, preserving order
pub fn classify_all(attendees: Vec<Attendee>) -> Vec<ClassifiedAttendee> {
    attendees.into_iter().map(classify).collect()
}
