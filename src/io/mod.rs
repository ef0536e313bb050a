//! IO modules - external system interfaces
//!
//! - `crm` - remote CRM API trait and its reqwest client
//! - `progress` - progress wire messages, sinks and the streamer state machine
//! - `server` - HTTP boundary for import requests
//! - `csv_source` - CSV file input for the CLI

pub mod crm;
pub mod csv_source;
pub mod progress;
pub mod server;

// Re-export commonly used types
pub use crm::{CrmApi, CrmError, HttpCrmClient};
pub use progress::{ChannelSink, ProgressMessage, ProgressSink, ProgressStreamer, WriterSink};
