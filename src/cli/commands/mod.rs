//! CLI command implementations.

pub mod sync;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::buildbot::BuildbotClient;
use crate::adapters::dashboard::DashboardClient;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::triggerable::Triggerable;

/// Load the daemon configuration from `path`, or from the default locations.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Wire a [`Triggerable`] to the live buildbot master and dashboard.
pub fn connect(config: &Config, triggerable_path: &Path) -> Result<Triggerable> {
    let document = ConfigLoader::load_triggerable_document(triggerable_path)?;
    let farm = BuildbotClient::new(&config.buildbot).context("Failed to create buildbot client")?;
    let dashboard = DashboardClient::new(&config.dashboard).context("Failed to create dashboard client")?;
    Ok(Triggerable::new(document, Arc::new(farm), Arc::new(dashboard)))
}
