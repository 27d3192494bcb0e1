use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use super::util::ProjectOptions;
use crate::project;
use crate::state::State;

#[derive(Debug, Parser)]
pub struct Options {
    #[clap(flatten)]
    pub project: ProjectOptions,

    #[clap(
        long = "timeout",
        help = "Seconds to wait for a remote transition before giving up"
    )]
    pub timeout: Option<u64>,
}

pub async fn handle(options: Options, state: State) -> Result<()> {
    let project = options.project.load_project(&state).await?;

    project
        .rollback(project::Options {
            wait_timeout: options.timeout.map(Duration::from_secs),
            ..Default::default()
        })
        .await?;

    Ok(())
}
