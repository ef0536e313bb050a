//! Services - business logic
//!
//! Pipeline stages, in the order a batch passes through them:
//! - `normalizer` - raw records to attendees, with row warnings
//! - `classifier` - registration/attendance flags
//! - `deriver` - attendees to domain events
//! - `contact_resolver` - make sure the CRM contact exists
//! - `publisher` - contact resolution plus event submission for one event
//! - `orchestrator` - sequential, paced publishing of a whole batch
//! - `importer` - ties the stages together and drives the progress stream

pub mod classifier;
pub mod contact_resolver;
pub mod deriver;
pub mod importer;
pub mod normalizer;
pub mod orchestrator;
pub mod publisher;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use contact_resolver::{ContactResolution, ContactResolver};
pub use importer::{prepare_import, ImportRequest, Importer, PreparedImport};
pub use orchestrator::{publish_stream, BatchProgress, BatchTally};
pub use publisher::EventPublisher;
