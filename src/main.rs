mod cli;
mod commands;
mod logging;

use clap::Parser;
use std::process::ExitCode;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init(cli.common.log_level.as_deref());

    let result = match &cli.command {
        Commands::Run(args) => commands::run::run(&cli.common, args).await,
        Commands::Cache(args) => commands::cache::cache(&cli.common, args).map(|()| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!(error = %e, code = e.error_code(), "command failed");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
