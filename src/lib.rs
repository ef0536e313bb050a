//! Attendee sync library
//!
//! Turns attendee exports into registration/attendance events in a CRM.
//! Exposes modules for integration testing and binary reuse.

pub mod domain;
pub mod infra;
pub mod io;
pub mod services;
