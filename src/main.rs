mod cds;
mod cli;
mod config;
mod dispatch;
mod download;
mod request;

use std::process::ExitCode;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli};
use config::Settings;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode, Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::default().with_output_dir(cli.output_dir.clone());

    if cli.dry_run {
        println!("{}", command::plan(&settings, &cli.variable)?);
        return Ok(ExitCode::SUCCESS);
    }

    let outcomes = match command::fetch(&settings, &cli.variable, cli.workers).await {
        Ok(outcomes) => outcomes,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(filename) => println!("File saved to `{}`", filename.display()),
            Err(e) => {
                eprintln!("Error: {:#}", e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        eprintln!("{} of {} chunks failed", failed, outcomes.len());
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
