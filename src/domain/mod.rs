//! Domain models - attendee input and derived lifecycle events
//!
//! This module contains the canonical data types used throughout the system:
//! - `Record` - one raw tabular row keyed by column header
//! - `ColumnMapping` - which column feeds which attendee field
//! - `Attendee` / `ClassifiedAttendee` - normalized rows and their disposition
//! - `EventSettings` - batch-wide event metadata
//! - `DomainEvent` - a "registered" or "attended" fact bound for the CRM
//! - `PublishOutcome` - per-event success/failure record

pub mod event;
pub mod types;

// Re-export commonly used types at module level
pub use event::{DomainEvent, EventKind, EventMetadata, PublishOutcome};
pub use types::{Attendee, ClassifiedAttendee, ColumnMapping, EventSettings, Record};
