pub mod cli;
pub mod config;
pub mod downloader;

use anyhow::Context;
use clap::Parser;
use std::process::ExitCode;

use cli::Arguments;
use config::{AppConfig, RuntimeConfig};

pub fn run() -> ExitCode {
    let args = Arguments::parse();

    let level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(args: Arguments) -> anyhow::Result<()> {
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let runtime = RuntimeConfig::resolve(&config);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?
        .block_on(cli::handle_command(args.command, &runtime))
}
