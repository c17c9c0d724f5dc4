//! buildbot-sync - schedules performance A/B test requests onto buildbot
//!
//! The synchronizer reads open build requests for a triggerable from the
//! performance dashboard, observes what a buildbot master is building,
//! submits the next eligible request of each test group to an idle builder
//! and writes every status change back to the dashboard.
//!
//! # Architecture
//!
//! Hexagonal layout:
//!
//! - **Domain Layer** (`domain`): request, commit-set and configuration models plus the ports
//! - **Service Layer** (`services`): validation, polling, scheduling and the sync pass
//! - **Adapters** (`adapters`): HTTP clients for buildbot and the dashboard, in-memory mocks
//! - **Infrastructure Layer** (`infrastructure`): configuration loading and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ConfigurationError, DomainError, DomainResult};
pub use domain::models::{Config, TriggerableConfig};
pub use domain::ports::{BuildFarm, Dashboard};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{SyncReport, Triggerable};
