use std::process::ExitCode;
use clap::Parser;
use tracing::{debug, error};

use logging::init_logging;
use stoic::{Cli, Stoic, EXIT_CONFIG, EXIT_FAILURE};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let app = match Stoic::from_config_file(&cli.config) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Error: cannot load configuration {}: {:#}", cli.config.display(), e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let _guard = match init_logging(&app.config().logging, cli.verbose) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: cannot initialize logging: {:#}", e);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    debug!("Running {}", cli.command.name());

    match app.run(&cli.command).await {
        Ok(outcome) => {
            debug!("{} finished: {:?}", cli.command.name(), outcome);
            ExitCode::from(outcome.exit_code())
        }
        Err(e) => {
            error!("{} failed: {:#}", cli.command.name(), e);
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
