use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::lookup::envfile::env_file_lookup;
use crate::lookup::questions::question_lookup;
use crate::lookup::{os_env_lookup, ComposableEnvLookup, EnvironmentLookup};
use crate::project::Project;
use crate::state::State;

#[derive(Debug, Parser)]
pub struct ProjectOptions {
    #[clap(
        short = 'f',
        long = "file",
        help = "Compose files to resolve, in order. Defaults to compose.yml"
    )]
    pub files: Vec<PathBuf>,

    #[clap(
        short = 's',
        long = "stack",
        help = "Stack to deploy into, defaults to the current directory name"
    )]
    pub stack: Option<String>,

    #[clap(
        short = 'e',
        long = "env-file",
        help = "KEY=value file used for ${VAR} interpolation"
    )]
    pub env_file: Option<PathBuf>,

    #[clap(
        long = "answers",
        help = "Questions file whose defaults answer template variables"
    )]
    pub answers: Option<PathBuf>,
}

impl ProjectOptions {
    pub async fn load_project(&self, state: &State) -> Result<Project> {
        let name = match &self.stack {
            Some(stack) => stack.clone(),
            None => current_dir_name()?,
        };

        let mut lookups: Vec<Box<dyn EnvironmentLookup>> = vec![Box::new(os_env_lookup())];

        if let Some(env_file) = &self.env_file {
            lookups.push(Box::new(env_file_lookup(env_file, None)?));
        }

        if let Some(answers) = &self.answers {
            lookups.push(Box::new(question_lookup(answers, None)?));
        }

        let mut project = Project::new(&name, state.platform.clone())
            .with_environment_lookup(Box::new(ComposableEnvLookup::new(lookups)));

        let files = if self.files.is_empty() {
            vec![PathBuf::from("compose.yml")]
        } else {
            self.files.clone()
        };

        for file in files {
            if !file.exists() {
                bail!("File {} does not exist", file.display());
            }

            let contents = tokio::fs::read(&file).await?;

            project.load(&file.to_string_lossy(), &contents)?;
        }

        Ok(project)
    }
}

fn current_dir_name() -> Result<String> {
    let dir = std::env::current_dir()?;

    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .context("Could not derive a stack name from the current directory, use --stack")
}
