pub mod app;
pub mod cli;
pub mod logging;
pub mod persistence;
pub mod render;

use std::process::ExitCode;

use cli::{Cli, Command};

/// Sets up logging from the saved settings and runs the chosen command.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = persistence::load_config(&cli.config);
    logging::initialize(config.log_destination, logging::level_for(cli.verbose));

    match cli.command {
        Command::Download(args) => app::run_download(args, config, &cli.config).await,
        Command::Convert(args) => app::run_convert(args).await,
    }
}
