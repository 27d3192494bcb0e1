#![warn(clippy::pedantic)]

use anyhow::Result;
use clap::Parser;
use corral::cli::CLI;
use corral::commands::handle_command;
use corral::state::{State, StateOptions};
use corral::utils;

#[tokio::main]
async fn main() -> Result<()> {
    // setup panic hook
    utils::set_hook();

    let cli = CLI::parse();

    utils::logs(cli.verbose);

    let state = State::new(StateOptions {
        override_url: cli.url,
        override_access_key: cli.access_key,
        override_secret_key: cli.secret_key,
    })?;

    if let Err(error) = handle_command(cli.commands, state).await {
        log::error!("{}", error);
        std::process::exit(1);
    }

    Ok(())
}
