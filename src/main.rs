//! Assetry - asset build orchestrator for PHP sites.

mod cli;
mod config;
mod logger;
mod pipeline;
mod reload;
mod serve;
mod utils;
mod watch;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use config::{BuildConfig, Command, defaults};
use serve::serve_site;
use std::process;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = match cli.command.parse::<Command>() {
        Ok(command) => command,
        Err(err) => {
            log!("error"; "{err}");
            process::exit(1);
        }
    };

    let root = cli.root.unwrap_or_else(defaults::dirs::root);
    let config = BuildConfig::for_command(root, command);

    match command {
        Command::Clean => clean(&config),
        Command::Build | Command::Dev => build_all(&config),
    }
}

/// Remove generated output and intermediates.
fn clean(config: &BuildConfig) -> Result<()> {
    config.paths.clean()?;
    log!("clean"; "cleaned ./dist and ./tmp");
    Ok(())
}

/// Run every pipeline once; in dev mode keep watching and serve until Ctrl+C.
fn build_all(config: &BuildConfig) -> Result<()> {
    config.validate()?;
    let session = pipeline::run_all(config)?;

    if config.mode.serve {
        serve_site(config)?;
    }

    session.close();
    Ok(())
}
