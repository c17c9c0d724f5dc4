//! buildbot-sync CLI entry point.

use clap::Parser;

use buildbot_sync::cli::commands::{load_config, sync, validate};
use buildbot_sync::cli::{handle_error, Cli, Commands};
use buildbot_sync::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LogConfig::try_from(&config.logging).and_then(|log_config| LoggerImpl::init(&log_config)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Sync(args) => sync::execute(args, &config, cli.json).await,
        Commands::Validate(args) => validate::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
