//! Syncbench CLI entry point.

use clap::Parser;

use syncbench::cli::{self, Cli, Commands};
use syncbench::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => cli::handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from_settings(&config.logging, &config.workspace())) {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => cli::commands::run::execute(args, config, cli.json).await,
        Commands::Publish(args) => cli::commands::publish::execute(args, config, cli.json).await,
        Commands::Config => cli::commands::config::execute(config, cli.json),
    };

    if let Err(err) = result {
        cli::handle_error(err, cli.json);
    }
}
