//! Port trait definitions (Hexagonal Architecture)
//!
//! - BuildFarm: the remote buildbot master
//! - Dashboard: the persistence collaborator storing requests

pub mod build_farm;
pub mod dashboard;

pub use build_farm::BuildFarm;
pub use dashboard::{Dashboard, RepositoryGroupReport, TestPlatformPair, TriggerableReport};
