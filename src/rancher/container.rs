use std::collections::BTreeMap;
use std::sync::Arc;

use super::context::Context;
use super::digest;
use super::links;
use super::service::build_launch_config;
use super::types::Container;
use crate::config::ServiceConfig;
use crate::consts::SERVICE_HASH_LABEL;
use crate::errors::{Error, Result};

/// Standalone container reconciliation: create when absent, otherwise only
/// compare hashes and warn on drift. Containers are never mutated in place.
pub struct RancherContainer {
    name: String,
    config: ServiceConfig,
    context: Arc<Context>,
}

impl RancherContainer {
    pub fn new(name: String, config: ServiceConfig, context: Arc<Context>) -> Self {
        Self {
            name,
            config,
            context,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn dependent_services(&self) -> Vec<links::ServiceRelationship> {
        links::dependent_services(&self.config)
    }

    pub async fn create(&self) -> Result<()> {
        self.converge().await
    }

    pub async fn up(&self) -> Result<()> {
        self.converge().await
    }

    async fn converge(&self) -> Result<()> {
        let _guard = self
            .context
            .lock(&self.context.stack.id, &self.name)
            .await;

        let existing = self.find_existing(&self.name).await?;
        let desired = self.desired_container().await?;

        if let Some(existing) = existing {
            let stored = existing.launch_config.labels.get(SERVICE_HASH_LABEL);
            let computed = desired.launch_config.labels.get(SERVICE_HASH_LABEL);

            if stored != computed {
                log::warn!(
                    "Container {} is out of sync with local configuration file",
                    self.name
                );
            }

            return Ok(());
        }

        log::info!("Creating container {}", self.name);

        self.context.platform.create_container(&desired).await?;

        Ok(())
    }

    /// Resolve a container by name, optionally scoped to another stack with
    /// the `stack/name` form.
    async fn find_existing(&self, name: &str) -> Result<Option<Container>> {
        let platform = self.context.platform.clone();

        let (stack_name, container_name) = links::split_scoped_name(name);

        let stack_id = match stack_name {
            Some(stack_name) => match platform.find_stack(stack_name).await? {
                Some(stack) => stack.id,
                None => return Err(Error::StackNotFound(stack_name.to_string())),
            },
            None => self.context.stack.id.clone(),
        };

        platform.find_container(container_name, &stack_id).await
    }

    async fn desired_container(&self) -> Result<Container> {
        let mut container = Container {
            name: self.name.clone(),
            stack_id: self.context.stack.id.clone(),
            launch_config: build_launch_config(&self.config),
            instance_links: self.links().await?,
            ..Default::default()
        };

        let hash = digest::container_hash(&container)?;

        container
            .launch_config
            .labels
            .insert(SERVICE_HASH_LABEL.to_string(), hash);

        Ok(container)
    }

    async fn links(&self) -> Result<BTreeMap<String, String>> {
        let mut resolved = BTreeMap::new();

        for entry in self
            .config
            .links
            .iter()
            .chain(self.config.external_links.iter())
        {
            let link = links::split_link(entry);

            match self.find_existing(&link.service_name).await? {
                Some(container) => {
                    resolved.insert(link.alias, container.id);
                }
                None if self.context.config.containers.contains_key(&link.service_name) => {
                    log::warn!("Failed to find container {} to link to", link.service_name);
                }
                None => {
                    log::warn!(
                        "Missing dependency: {} is not defined in this project",
                        link.service_name
                    );
                }
            }
        }

        Ok(resolved)
    }
}
