use std::collections::BTreeMap;

use super::client::Platform;
use crate::config::{Config, ServiceConfig};
use crate::errors::Result;

/// One `name[:alias]` entry, split on the first `:`. A one-part entry uses
/// the name as its own alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub service_name: String,
    pub alias: String,
}

pub fn split_link(entry: &str) -> Link {
    match entry.split_once(':') {
        Some((name, alias)) => Link {
            service_name: name.trim().to_string(),
            alias: alias.trim().to_string(),
        },
        None => Link {
            service_name: entry.trim().to_string(),
            alias: entry.trim().to_string(),
        },
    }
}

/// `stack/name` scopes a target to another stack.
pub fn split_scoped_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once('/') {
        Some((stack, name)) => (Some(stack), name),
        None => (None, name),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelType {
    Link,
}

/// Ordering edge handed to the scheduler: this service must come after its
/// target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRelationship {
    pub target: String,
    pub kind: RelType,
}

/// Edges for every link and external link, plus, for load balancers, every
/// port-rule target that is not cross-stack qualified.
pub fn dependent_services(config: &ServiceConfig) -> Vec<ServiceRelationship> {
    let mut relationships = Vec::new();

    for entry in config.links.iter().chain(config.external_links.iter()) {
        relationships.push(ServiceRelationship {
            target: split_link(entry).service_name,
            kind: RelType::Link,
        });
    }

    if let Some(lb_config) = &config.lb_config {
        for rule in &lb_config.port_rules {
            if let Some(service) = &rule.service {
                if !service.is_empty() && !service.contains('/') {
                    relationships.push(ServiceRelationship {
                        target: service.clone(),
                        kind: RelType::Link,
                    });
                }
            }
        }
    }

    relationships
}

/// Resolve link entries to alias → remote service id pairs. Unresolved
/// targets are warnings, never hard failures; a target that is also absent
/// from the local service set is logged as a missing dependency.
pub(crate) async fn resolve_service_links<'a>(
    platform: &dyn Platform,
    stack_id: &str,
    config: &Config,
    entries: impl Iterator<Item = &'a String>,
) -> Result<BTreeMap<String, String>> {
    let mut resolved = BTreeMap::new();

    for entry in entries {
        let link = split_link(entry);
        let (stack_name, service_name) = split_scoped_name(&link.service_name);

        let target = match stack_name {
            Some(stack_name) => match platform.find_stack(stack_name).await? {
                Some(stack) => platform.find_service(service_name, &stack.id).await?,
                None => {
                    log::warn!("Failed to find stack {stack_name} for link {entry}");
                    None
                }
            },
            None => platform.find_service(service_name, stack_id).await?,
        };

        match target {
            Some(service) => {
                resolved.insert(link.alias, service.id);
            }
            None if config.services.contains_key(&link.service_name) => {
                log::warn!("Failed to find service {} to link to", link.service_name);
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

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{LbConfig, PortRule};

    #[test]
    fn test_split_link_forms() {
        assert_eq!(
            split_link("db"),
            Link {
                service_name: "db".to_string(),
                alias: "db".to_string(),
            }
        );
        assert_eq!(
            split_link("db:database"),
            Link {
                service_name: "db".to_string(),
                alias: "database".to_string(),
            }
        );
        assert_eq!(
            split_link(" other/db : database "),
            Link {
                service_name: "other/db".to_string(),
                alias: "database".to_string(),
            }
        );
    }

    #[test]
    fn test_split_scoped_name() {
        assert_eq!(split_scoped_name("db"), (None, "db"));
        assert_eq!(split_scoped_name("other/db"), (Some("other"), "db"));
    }

    #[test]
    fn test_dependent_services_include_lb_targets() {
        let config = ServiceConfig {
            links: vec!["db:database".to_string()],
            external_links: vec!["shared/cache".to_string()],
            lb_config: Some(LbConfig {
                port_rules: vec![
                    PortRule {
                        service: Some("web".to_string()),
                        ..Default::default()
                    },
                    PortRule {
                        service: Some("other/stacked".to_string()),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }),
            ..Default::default()
        };

        let targets: Vec<String> = dependent_services(&config)
            .into_iter()
            .map(|relationship| relationship.target)
            .collect();

        // cross-stack qualified port rules are not ordering edges
        assert_eq!(
            targets,
            vec![
                "db".to_string(),
                "shared/cache".to_string(),
                "web".to_string()
            ]
        );
    }
}
