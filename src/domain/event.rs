//! Lifecycle events derived from attendees and the per-event publish outcome

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch seconds
#[inline]
pub fn epoch_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Kind of lifecycle fact sent to the CRM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Registered,
    Attended,
}

impl EventKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Registered => "registered",
            EventKind::Attended => "attended",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured metadata attached to an event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMetadata {
    pub event_name: Option<String>,
    pub event_date: Option<String>,
    pub ticket_type: Option<String>,
    pub presenter: Option<String>,
}

impl EventMetadata {
    /// Flat wire object. Missing and blank values are dropped; the CRM rejects
    /// empty strings on structured fields.
    pub fn to_wire(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut obj = serde_json::Map::new();
        let fields = [
            ("event_name", &self.event_name),
            ("event_date", &self.event_date),
            ("ticket_type", &self.ticket_type),
            ("presenter", &self.presenter),
        ];
        for (key, value) in fields {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                obj.insert(key.to_string(), serde_json::Value::String(v.to_string()));
            }
        }
        obj
    }

    pub fn is_empty(&self) -> bool {
        self.to_wire().is_empty()
    }
}

/// One lifecycle fact about an attendee, ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEvent {
    pub kind: EventKind,
    /// Unix seconds
    pub occurred_at: i64,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub metadata: EventMetadata,
}

/// Result of publishing one event. Failures are data, never errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub success: bool,
    pub email: String,
    pub event_kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn succeeded(event: &DomainEvent) -> Self {
        Self { success: true, email: event.email.clone(), event_kind: event.kind, error: None }
    }

    pub fn failed(event: &DomainEvent, error: String) -> Self {
        Self {
            success: false,
            email: event.email.clone(),
            event_kind: event.kind,
            error: Some(error),
        }
    }
}
