use clap::Parser;

use crate::commands::Commands;

#[derive(Debug, Parser)]
#[clap(
    name = "corral",
    about = "🤠 Deploy compose stacks to Rancher from your terminal",
    version,
    author
)]
pub struct CLI {
    #[clap(subcommand)]
    pub commands: Commands,

    #[clap(
        long = "url",
        help = "Rancher API endpoint, defaults to $RANCHER_URL",
        global = true
    )]
    pub url: Option<String>,

    #[clap(
        long = "access-key",
        help = "API access key, defaults to $RANCHER_ACCESS_KEY",
        global = true
    )]
    pub access_key: Option<String>,

    #[clap(
        long = "secret-key",
        help = "API secret key, defaults to $RANCHER_SECRET_KEY",
        global = true
    )]
    pub secret_key: Option<String>,

    #[clap(
        short = 'v',
        long = "verbose",
        help = "Print more information",
        global = true
    )]
    pub verbose: bool,
}

#[cfg(test)]
mod test {
    #[test]
    fn test_cli() {
        use super::*;
        use clap::CommandFactory;

        CLI::command().debug_assert();
    }
}
