//! Batch-level validation errors
//!
//! Detected before any remote call is issued. Any of these rejects the whole
//! batch; no partial processing is attempted.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("email column mapping is required")]
    MissingEmailMapping,

    #[error("no records to import")]
    EmptyInput,

    #[error("no rows with a valid email address ({rejected} rejected)")]
    NoValidAttendees { rejected: usize },

    #[error("no registration or attendance events found in {attendees} attendee(s)")]
    NoEvents { attendees: usize },

    #[error("no API token configured for the {0} environment")]
    MissingCredentials(String),
}
