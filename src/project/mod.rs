pub mod options;

pub use options::Options;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{Config, ServiceConfig};
use crate::errors::Result;
use crate::lookup::resource::{FileResourceLookup, ResourceLookup};
use crate::lookup::{os_env_lookup, ComposableEnvLookup, EnvironmentLookup};
use crate::parser;
use crate::rancher::links::{dependent_services, ServiceRelationship};
use crate::rancher::types::Stack;
use crate::rancher::wait::wait_for;
use crate::rancher::{Context, Platform, RancherContainer, RancherService};
use crate::template::{NoopTemplate, TemplateEngine};

/// One named deployment: the accumulated canonical config plus the handles
/// needed to resolve documents and reconcile the remote stack of the same
/// name.
pub struct Project {
    pub name: String,
    pub config: Config,
    platform: Arc<dyn Platform>,
    environment_lookup: Box<dyn EnvironmentLookup>,
    resource_lookup: Option<Box<dyn ResourceLookup>>,
    template: Box<dyn TemplateEngine>,
}

impl Project {
    pub fn new(name: &str, platform: Arc<dyn Platform>) -> Self {
        Self {
            name: name.to_string(),
            config: Config::default(),
            platform,
            environment_lookup: Box::new(ComposableEnvLookup::new(vec![Box::new(
                os_env_lookup(),
            )])),
            resource_lookup: Some(Box::new(FileResourceLookup)),
            template: Box::new(NoopTemplate),
        }
    }

    pub fn with_environment_lookup(mut self, lookup: Box<dyn EnvironmentLookup>) -> Self {
        self.environment_lookup = lookup;
        self
    }

    pub fn with_resource_lookup(mut self, lookup: Option<Box<dyn ResourceLookup>>) -> Self {
        self.resource_lookup = lookup;
        self
    }

    pub fn with_template(mut self, template: Box<dyn TemplateEngine>) -> Self {
        self.template = template;
        self
    }

    /// Resolve one document and fold it into the accumulated config. Later
    /// files merge onto the services of earlier ones.
    pub fn load(&mut self, file: &str, contents: &[u8]) -> Result<()> {
        let config = parser::merge(
            &self.config.services,
            &*self.environment_lookup,
            self.resource_lookup.as_deref(),
            &*self.template,
            file,
            contents,
        )?;

        self.config.services = config.services;
        self.config.containers.extend(config.containers);
        self.config.volumes.extend(config.volumes);
        self.config.networks.extend(config.networks);
        self.config.hosts.extend(config.hosts);
        self.config.secrets.extend(config.secrets);
        self.config.dependencies.extend(config.dependencies);

        Ok(())
    }

    /// Create every service without starting anything.
    pub async fn create(&self, options: Options) -> Result<()> {
        self.apply(options, false).await
    }

    /// Create and start everything, upgrading where requested.
    pub async fn up(&self, options: Options) -> Result<()> {
        self.apply(options, true).await
    }

    pub async fn rollback(&self, mut options: Options) -> Result<()> {
        options.rollback = true;
        self.apply(options, true).await
    }

    /// Ordering edges for one service, for an external scheduler.
    pub fn dependent_services(&self, name: &str) -> Vec<ServiceRelationship> {
        self.config
            .services
            .get(name)
            .map(dependent_services)
            .unwrap_or_default()
    }

    async fn apply(&self, options: Options, start: bool) -> Result<()> {
        let stack = self.ensure_stack(&options).await?;

        let context = Arc::new(Context::new(
            self.platform.clone(),
            stack,
            self.name.clone(),
            self.config.clone(),
            options,
        ));

        for name in order_by_dependencies(&self.config.services) {
            let service = RancherService::new(
                name.clone(),
                self.config.services[&name].clone(),
                context.clone(),
            );

            if start {
                service.up().await?;
            } else {
                service.create().await?;
            }
        }

        for (name, config) in &self.config.containers {
            let container =
                RancherContainer::new(name.clone(), config.clone(), context.clone());

            if start {
                container.up().await?;
            } else {
                container.create().await?;
            }
        }

        Ok(())
    }

    async fn ensure_stack(&self, options: &Options) -> Result<Stack> {
        if let Some(stack) = self.platform.find_stack(&self.name).await? {
            return Ok(stack);
        }

        log::info!("Creating stack {}", self.name);

        let stack = self
            .platform
            .create_stack(&Stack {
                name: self.name.clone(),
                ..Default::default()
            })
            .await?;

        wait_for(&*self.platform, stack, options.wait_timeout).await
    }
}

/// Order services so link targets reconcile before their dependents. Targets
/// outside the local set don't constrain the order; a cycle falls back to
/// name order for the remainder.
fn order_by_dependencies(services: &BTreeMap<String, ServiceConfig>) -> Vec<String> {
    let mut ordered: Vec<String> = Vec::new();
    let mut remaining: Vec<String> = services.keys().cloned().collect();

    while !remaining.is_empty() {
        let ready: Vec<String> = remaining
            .iter()
            .filter(|name| {
                dependent_services(&services[*name]).iter().all(|dep| {
                    dep.target == **name
                        || !services.contains_key(&dep.target)
                        || ordered.contains(&dep.target)
                })
            })
            .cloned()
            .collect();

        if ready.is_empty() {
            log::warn!(
                "Dependency cycle between services: {}",
                remaining.join(", ")
            );
            ordered.append(&mut remaining);
            break;
        }

        remaining.retain(|name| !ready.contains(name));
        ordered.extend(ready);
    }

    ordered
}

#[cfg(test)]
mod test {
    use super::*;

    fn service(yaml: &str) -> ServiceConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_order_by_dependencies() {
        let services = BTreeMap::from([
            ("web".to_string(), service("image: nginx\nlinks: ['api']")),
            ("api".to_string(), service("image: api\nlinks: ['db']")),
            ("db".to_string(), service("image: postgres")),
            (
                "other".to_string(),
                service("image: x\nexternal_links: ['shared/cache']"),
            ),
        ]);

        let ordered = order_by_dependencies(&services);

        let position = |name: &str| ordered.iter().position(|n| n == name).unwrap();

        assert_eq!(ordered.len(), 4);
        assert!(position("db") < position("api"));
        assert!(position("api") < position("web"));
    }

    #[test]
    fn test_cycle_falls_back_to_name_order() {
        let services = BTreeMap::from([
            ("a".to_string(), service("image: x\nlinks: ['b']")),
            ("b".to_string(), service("image: x\nlinks: ['a']")),
        ]);

        let ordered = order_by_dependencies(&services);

        assert_eq!(ordered, vec!["a".to_string(), "b".to_string()]);
    }
}
