//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation
//!
//! The triggerable document itself is loaded raw and validated against the
//! dashboard manifest by the services layer.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
