//! Domain layer for the buildbot synchronizer
//!
//! Request and commit-set models, the triggerable configuration, buildbot
//! entry snapshots and the ports the services talk through.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ConfigurationError, DomainError, DomainResult};
