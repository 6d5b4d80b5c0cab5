mod announce;
mod batch;
mod cli;
mod config;
mod error;
mod model;
mod pipeline;
mod prompt;
mod reserve;
mod source;
mod storage;
mod vcs;

use std::{io, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = cli::run(&cli, &config) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Logs go to stderr. `--verbose` wins over `RUST_LOG`.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("secrel=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("secrel=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
