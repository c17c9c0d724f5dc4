use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure for the synchronizer daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Path to the triggerable configuration (JSON or YAML)
    #[serde(default = "default_triggerable_config")]
    pub triggerable_config: PathBuf,

    /// Dashboard (persistence) server
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Buildbot master
    #[serde(default)]
    pub buildbot: BuildbotConfig,

    /// Daemon loop settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_triggerable_config() -> PathBuf {
    PathBuf::from("triggerable.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            triggerable_config: default_triggerable_config(),
            dashboard: DashboardConfig::default(),
            buildbot: BuildbotConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Dashboard server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_url")]
    pub url: String,

    /// Slave credentials attached to every write
    #[serde(default)]
    pub slave_name: Option<String>,
    #[serde(default)]
    pub slave_password: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_dashboard_url() -> String {
    "http://localhost/".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            url: default_dashboard_url(),
            slave_name: None,
            slave_password: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Buildbot master configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BuildbotConfig {
    #[serde(default = "default_buildbot_url")]
    pub url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for idempotent reads; force-build posts are never retried
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_buildbot_url() -> String {
    "http://localhost:8010/".to_string()
}

const fn default_max_retries() -> u32 {
    3
}

impl Default for BuildbotConfig {
    fn default() -> Self {
        Self {
            url: default_buildbot_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Daemon loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SyncConfig {
    #[serde(default = "default_seconds_to_sleep")]
    pub seconds_to_sleep: u64,

    #[serde(default)]
    pub run_once: bool,
}

const fn default_seconds_to_sleep() -> u64 {
    120
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            seconds_to_sleep: default_seconds_to_sleep(),
            run_once: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub enable_stdout: bool,

    /// Rotation of log files (daily, hourly, never)
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_stdout: true,
            rotation: default_rotation(),
        }
    }
}
