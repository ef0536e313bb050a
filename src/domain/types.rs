//! Input-side types: raw records, column mapping, attendees and event settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One raw tabular row, keyed by column header
pub type Record = HashMap<String, String>;

/// Names which input column supplies each attendee field.
///
/// `email` is mandatory for a batch to be accepted. It is kept optional here so a
/// missing mapping surfaces as a validation error instead of a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Used only when `name` is not mapped
    #[serde(default)]
    pub first_name: Option<String>,
    /// Used only when `name` is not mapped
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub registration_date: Option<String>,
    #[serde(default)]
    pub attendance_date: Option<String>,
    #[serde(default)]
    pub ticket_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub has_joined_event: Option<String>,
}

impl ColumnMapping {
    /// Mapping with only the email column set
    pub fn with_email(column: &str) -> Self {
        Self { email: Some(column.to_string()), ..Default::default() }
    }

    /// The email column, if mapped to a non-blank header
    pub fn email_column(&self) -> Option<&str> {
        self.email.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// A normalized attendee row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendee {
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub registration_date: Option<String>,
    pub attendance_date: Option<String>,
    pub ticket_type: Option<String>,
    pub status: Option<String>,
    pub has_joined_event: Option<bool>,
}

impl Attendee {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            name: None,
            phone: None,
            registration_date: None,
            attendance_date: None,
            ticket_type: None,
            status: None,
            has_joined_event: None,
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn with_registration_date(mut self, date: &str) -> Self {
        self.registration_date = Some(date.to_string());
        self
    }

    pub fn with_attendance_date(mut self, date: &str) -> Self {
        self.attendance_date = Some(date.to_string());
        self
    }

    pub fn with_joined(mut self, joined: bool) -> Self {
        self.has_joined_event = Some(joined);
        self
    }
}

/// Attendee plus the registration/attendance disposition derived from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedAttendee {
    pub attendee: Attendee,
    pub has_registration: bool,
    pub has_attendance: bool,
}

/// Event-level metadata shared by every attendee in a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSettings {
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub presenter: Option<String>,
}

impl EventSettings {
    /// `eventDate eventTime` when both are set, else whichever one is
    pub fn combined_event_date(&self) -> Option<String> {
        let date = non_blank(self.event_date.as_deref());
        let time = non_blank(self.event_time.as_deref());
        match (date, time) {
            (Some(d), Some(t)) => Some(format!("{} {}", d, t)),
            (Some(d), None) => Some(d.to_string()),
            (None, Some(t)) => Some(t.to_string()),
            (None, None) => None,
        }
    }
}

/// Trimmed value, or None when blank
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
