//! Buildbot master adapter.
//!
//! Speaks the buildbot 0.8 JSON status API for polling and the force-build
//! form for submissions.

pub mod client;

pub use client::BuildbotClient;
