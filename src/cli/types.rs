//! CLI type definitions
//!
//! Clap command structures for the synchronizer binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::commands::sync::SyncArgs;
use super::commands::validate::ValidateArgs;

#[derive(Parser, Debug)]
#[command(name = "buildbot-sync")]
#[command(about = "Schedules dashboard build requests onto buildbot builders", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Daemon configuration file (defaults to buildbot-sync.yaml in the working directory)
    #[arg(short, long, global = true, env = "BUILDBOT_SYNC_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize build requests with the buildbot master
    Sync(SyncArgs),

    /// Validate the triggerable configuration against the dashboard manifest
    Validate(ValidateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_once() {
        let cli = Cli::try_parse_from(["buildbot-sync", "--json", "sync", "--once"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Sync(SyncArgs { once: true, .. })));
    }

    #[test]
    fn test_parse_validate_with_config() {
        let cli = Cli::try_parse_from([
            "buildbot-sync",
            "validate",
            "--config",
            "/etc/buildbot-sync/daemon.yaml",
            "--triggerable",
            "webkit.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/buildbot-sync/daemon.yaml")));
        match cli.command {
            Commands::Validate(args) => assert_eq!(args.triggerable, Some(PathBuf::from("webkit.json"))),
            Commands::Sync(_) => panic!("expected validate"),
        }
    }
}
