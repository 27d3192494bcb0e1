use anyhow::Result;
use clap::Parser;

use super::util::ProjectOptions;
use crate::project;
use crate::state::State;

#[derive(Debug, Parser)]
pub struct Options {
    #[clap(flatten)]
    pub project: ProjectOptions,
}

pub async fn handle(options: Options, state: State) -> Result<()> {
    let project = options.project.load_project(&state).await?;

    project.create(project::Options::default()).await?;

    Ok(())
}
