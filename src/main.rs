//! Command-line entry point of the client generator.
//!
//! # Usage
//!
//! ```bash
//! client-from-source --server-root ./server --output-dir ./web/src/api
//! ```
//!
//! Route files and shared crates can be listed on the command line or in a TOML
//! config file:
//!
//! ```bash
//! client-from-source --config client-gen.toml --no-yaml -v
//! ```

use clap::Parser;
use client_from_source::cli;
use log::{error, info};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("client-from-source starting...");

    let result = cli::parse_args_from_parsed(args).and_then(cli::run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}
