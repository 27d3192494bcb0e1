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

    #[clap(long = "pull", help = "Pull images before upgrading")]
    pub pull: bool,

    #[clap(
        short = 'u',
        long = "upgrade",
        help = "Upgrade active services whose configuration changed"
    )]
    pub upgrade: bool,

    #[clap(long = "force-upgrade", help = "Upgrade regardless of detected changes")]
    pub force_upgrade: bool,

    #[clap(
        short = 'c',
        long = "confirm-upgrade",
        help = "Finish upgrades instead of leaving them pending"
    )]
    pub confirm_upgrade: bool,

    #[clap(short = 'r', long = "rollback", help = "Roll back instead of upgrading")]
    pub rollback: bool,

    #[clap(
        long = "timeout",
        help = "Seconds to wait for a remote transition before giving up"
    )]
    pub timeout: Option<u64>,
}

pub async fn handle(options: Options, state: State) -> Result<()> {
    let project = options.project.load_project(&state).await?;

    project
        .up(project::Options {
            pull: options.pull,
            upgrade: options.upgrade || options.force_upgrade,
            force_upgrade: options.force_upgrade,
            confirm_upgrade: options.confirm_upgrade,
            rollback: options.rollback,
            wait_timeout: options.timeout.map(Duration::from_secs),
            ..Default::default()
        })
        .await?;

    Ok(())
}
