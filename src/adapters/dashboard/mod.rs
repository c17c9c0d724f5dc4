//! Dashboard adapter.
//!
//! Reads the manifest and open build requests, and writes status updates and
//! triggerable registrations, through the dashboard's JSON API.

pub mod client;
pub mod models;

pub use client::DashboardClient;
