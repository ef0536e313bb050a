//! Infrastructure - configuration and batch validation errors
//!
//! This module contains infrastructure concerns:
//! - `config` - Application configuration (TOML loading, defaults, credentials)
//! - `error` - Input validation errors that reject a whole batch

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Config, CrmEnvironment};
pub use error::ImportError;
