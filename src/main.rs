//! Chorecast CLI entry point.

use clap::Parser;

use chorecast::cli::commands::CommandContext;
use chorecast::cli::{handle_error, Cli, Commands};
use chorecast::infrastructure::config::ConfigLoader;
use chorecast::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&LogConfig::from(&config.logging)) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let ctx = CommandContext {
        config,
        user: cli.user,
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Init(args) => chorecast::cli::commands::init::execute(args, ctx.json).await,
        Commands::Task(args) => chorecast::cli::commands::task::execute(args, &ctx).await,
        Commands::Occurrence(args) => chorecast::cli::commands::occurrence::execute(args, &ctx).await,
        Commands::Scheduler(args) => chorecast::cli::commands::scheduler::execute(args, &ctx).await,
    };

    if let Err(err) = result {
        handle_error(err, ctx.json);
    }
}
