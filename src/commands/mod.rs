pub mod create;
pub mod rollback;
pub mod up;
pub mod util;

use anyhow::Result;
use clap::Subcommand;

use crate::state::State;

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[clap(name = "up", about = "Create and start services from compose files")]
    Up(up::Options),

    #[clap(name = "create", about = "Create services without starting them")]
    Create(create::Options),

    #[clap(name = "rollback", about = "Roll services back to their last revision")]
    Rollback(rollback::Options),
}

pub async fn handle_command(command: Commands, state: State) -> Result<()> {
    match command {
        Commands::Up(options) => up::handle(options, state).await,
        Commands::Create(options) => create::handle(options, state).await,
        Commands::Rollback(options) => rollback::handle(options, state).await,
    }
}
