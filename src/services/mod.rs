//! Synchronization services
//!
//! Configuration validation, property resolution, remote state polling,
//! per-builder scheduling and the triggerable's synchronization pass.

pub mod builder_syncer;
pub mod config_validator;
pub mod property_resolver;
pub mod state_poller;
pub mod triggerable;

#[cfg(test)]
pub(crate) mod test_support;

pub use builder_syncer::{BuilderSyncer, PlannedSubmission};
pub use config_validator::ConfigValidator;
pub use property_resolver::PropertyResolver;
pub use state_poller::RemoteStatePoller;
pub use triggerable::{SyncReport, Triggerable};
