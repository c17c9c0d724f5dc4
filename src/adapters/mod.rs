//! Adapters for the external systems behind the domain ports.

pub mod buildbot;
pub mod dashboard;
pub mod mock;
