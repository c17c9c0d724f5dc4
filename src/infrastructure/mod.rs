//! Infrastructure layer module
//!
//! - Configuration management (figment: defaults, YAML, environment)
//! - Logging infrastructure (tracing, rolling files)

pub mod config;
pub mod logging;
