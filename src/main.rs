use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env early; ignore if missing.
    dotenvy::dotenv().ok();

    let cli = remote_edit::Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match remote_edit::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if !remote_edit::already_reported(&err) {
                eprintln!("{} {err:#}", "error:".red().bold());
            }
            ExitCode::from(remote_edit::exit_code(&err))
        }
    }
}
