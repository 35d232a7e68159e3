//! Almanac CLI entry point.

use clap::Parser;

use almanac::cli::{dispatch, handle_error, AppContext, Cli};
use almanac::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    // Held for the life of the process so buffered file logs are flushed on exit.
    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let ctx = match AppContext::open(config).await {
        Ok(ctx) => ctx,
        Err(err) => handle_error(err, cli.json),
    };

    if let Err(err) = dispatch(cli.command, &ctx, cli.json).await {
        handle_error(err, cli.json);
    }
}
