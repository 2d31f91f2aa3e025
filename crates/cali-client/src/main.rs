//! cali CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use cali_client::cli::{Cli, Command};
use cali_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = match (&cli.command, cli.debug) {
        (Command::Server, true) => TracingConfig::daemon().with_level(Level::DEBUG),
        (Command::Server, false) => TracingConfig::daemon(),
        (_, true) => TracingConfig::cli_debug(),
        (_, false) => TracingConfig::default(),
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: {}", e);
    }

    let mut stdout = std::io::stdout();
    match cali_client::execute(cli, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
