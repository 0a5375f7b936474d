mod cli;
mod config;
mod driver;

use std::process::ExitCode;

use clap::Parser;
use engine_logging::{engine_error, engine_info};

use crate::cli::Cli;
use crate::config::AppConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            engine_error!("{:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// True when every document converted (or there was nothing to convert).
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = AppConfig::load(cli)?;
    engine_logging::initialize(&config.log_options());
    engine_info!(
        "PdfConverter {} starting (soffice: {})",
        env!("CARGO_PKG_VERSION"),
        config.soffice_path.display()
    );

    let service = driver::office_service(&config);
    let summary = driver::run(cli, &config, service)?;
    Ok(summary.map_or(true, |summary| summary.is_complete_success()))
}
