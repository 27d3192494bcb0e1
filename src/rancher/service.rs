use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use super::client::Platform;
use super::context::Context;
use super::digest;
use super::links;
use super::types::{
    InstanceHealthCheck, LaunchConfig, LogConfig, PullTask, RestartPolicy, Service, ServiceLink,
};
use super::wait::wait_for;
use crate::config::{Command, HealthCheck, ServiceConfig};
use crate::consts::{
    EXTERNAL_SERVICE_IMAGE, SELECTOR_CONTAINER_LABEL, SELECTOR_LINK_LABEL, SERVICE_HASH_LABEL,
    SIDEKICK_LABEL,
};
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Rancher,
    LoadBalancer,
    ExternalService,
}

pub fn service_kind(config: &ServiceConfig) -> ServiceKind {
    if config.lb_config.is_some() {
        ServiceKind::LoadBalancer
    } else if config.image.as_deref() == Some(EXTERNAL_SERVICE_IMAGE)
        || !config.external_ips.is_empty()
    {
        ServiceKind::ExternalService
    } else {
        ServiceKind::Rancher
    }
}

/// Drives one service toward its desired remote state: create, upgrade,
/// rollback and activate decisions, link setup, and the blocking wait for
/// the remote side to settle.
pub struct RancherService {
    name: String,
    config: ServiceConfig,
    context: Arc<Context>,
}

impl RancherService {
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

    pub fn kind(&self) -> ServiceKind {
        service_kind(&self.config)
    }

    pub fn dependent_services(&self) -> Vec<links::ServiceRelationship> {
        links::dependent_services(&self.config)
    }

    /// Create the service when absent and leave it inactive. No activation,
    /// no wait.
    pub async fn create(&self) -> Result<()> {
        let _guard = self
            .context
            .lock(&self.context.stack.id, &self.name)
            .await;

        match self.find_existing().await? {
            Some(service) => self.setup_links(&service, service.state == "inactive").await,
            None => {
                let service = self.create_remote().await?;
                self.setup_links(&service, true).await
            }
        }
    }

    /// Converge toward a running service.
    pub async fn up(&self) -> Result<()> {
        let _guard = self
            .context
            .lock(&self.context.stack.id, &self.name)
            .await;

        let platform = self.context.platform.clone();
        let options = self.context.options.clone();

        let mut service = self.find_existing().await?;

        if options.rollback {
            if let Some(service) = service {
                log::info!("Rolling back service {}", self.name);
                platform.service_action(&service, "rollback", None).await?;
            }

            return Ok(());
        }

        let desired = self.desired_service()?;
        let desired_hash = launch_config_label(&desired, SERVICE_HASH_LABEL);

        if let Some(existing) = service.take() {
            let stored = launch_config_label(&existing, SERVICE_HASH_LABEL);
            let drifted = stored != desired_hash;

            if (drifted || options.force_upgrade) && existing.state == "active" && options.upgrade {
                if options.pull {
                    self.pull().await?;
                }

                service = Some(self.upgrade(&existing, &desired).await?);
            } else {
                if drifted {
                    // drift is advisory here, reconciliation proceeds
                    log::warn!(
                        "Service {} is out of sync with local configuration file",
                        self.name
                    );
                }

                service = Some(existing);
            }
        }

        let mut service = match service {
            Some(service) => {
                self.setup_links(&service, true).await?;
                service
            }
            None => {
                let service = self.create_remote().await?;
                self.setup_links(&service, true).await?;
                wait_for(&*platform, service, options.wait_timeout).await?
            }
        };

        if service.state == "upgraded" && options.confirm_upgrade {
            service = platform
                .service_action(&service, "finishupgrade", None)
                .await?;
            service = wait_for(&*platform, service, options.wait_timeout).await?;
        }

        if service.state == "active" {
            return Ok(());
        }

        if service.actions.contains_key("activate") {
            log::info!("Starting service {}", self.name);
            let service = platform.service_action(&service, "activate", None).await?;
            wait_for(&*platform, service, options.wait_timeout).await?;
        }

        Ok(())
    }

    /// Pull every referenced image, the primary plus its sidekicks, one task
    /// per distinct image. A failed pull does not cancel the others; the
    /// last-observed error is returned once all tasks finish.
    pub async fn pull(&self) -> Result<()> {
        let Some(image) = &self.config.image else {
            return Ok(());
        };

        if self.kind() != ServiceKind::Rancher {
            return Ok(());
        }

        let mut to_pull = BTreeSet::from([image.clone()]);
        let mut labels = self.config.labels.clone();

        if let Some(sidekicks) = self.config.labels.get(SIDEKICK_LABEL) {
            for sidekick in sidekicks.split(',').map(str::trim) {
                let Some(sidekick_config) = self.context.config.services.get(sidekick) else {
                    continue;
                };

                labels.extend(sidekick_config.labels.clone());

                if let Some(image) = &sidekick_config.image {
                    to_pull.insert(image.clone());
                }
            }
        }

        let tasks: Vec<_> = to_pull
            .into_iter()
            .map(|image| {
                let platform = self.context.platform.clone();
                let labels = labels.clone();
                let deadline = self.context.options.wait_timeout;

                tokio::spawn(async move { pull_image(platform, image, labels, deadline).await })
            })
            .collect();

        let mut last_error = None;

        for result in join_all(tasks).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => last_error = Some(err),
                Err(err) => last_error = Some(Error::Api(err.to_string())),
            }
        }

        match last_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn find_existing(&self) -> Result<Option<Service>> {
        self.context
            .platform
            .find_service(&self.name, &self.context.stack.id)
            .await
    }

    async fn create_remote(&self) -> Result<Service> {
        log::info!("Creating service {}", self.name);

        let desired = self.desired_service()?;

        self.context.platform.create_service(&desired).await
    }

    async fn upgrade(&self, existing: &Service, desired: &Service) -> Result<Service> {
        log::info!("Upgrading service {}", self.name);

        let platform = self.context.platform.clone();
        let options = &self.context.options;
        let strategy = self.config.upgrade_strategy.clone().unwrap_or_default();

        let mut input = serde_json::json!({
            "inServiceStrategy": {
                "launchConfig": desired.launch_config,
                "secondaryLaunchConfigs": desired.secondary_launch_configs,
                "batchSize": strategy.batch_size.unwrap_or(1),
                "intervalMillis": strategy.interval_millis.unwrap_or(2000),
                "startFirst": strategy.start_first.unwrap_or(false),
                "forceUpgrade": options.force_upgrade,
            },
        });

        // caller-supplied overrides win over the computed strategy
        if let serde_json::Value::Object(object) = &mut input {
            for (key, value) in &options.args {
                object.insert(key.clone(), value.clone());
            }
        }

        let service = platform
            .service_action(existing, "upgrade", Some(input))
            .await?;

        wait_for(&*platform, service, options.wait_timeout).await
    }

    /// Replace the remote link set with the locally resolved one. Selector
    /// based linking and cattle-managed kinds manage their links exogenously.
    async fn setup_links(&self, service: &Service, update: bool) -> Result<()> {
        if !service.selector_link.is_empty()
            || matches!(
                self.kind(),
                ServiceKind::LoadBalancer | ServiceKind::ExternalService
            )
        {
            return Ok(());
        }

        let platform = self.context.platform.clone();

        let mut current = platform.list_service_links(service).await?;

        if !current.is_empty() && !update {
            return Ok(());
        }

        let resolved = links::resolve_service_links(
            &*platform,
            &self.context.stack.id,
            &self.context.config,
            self.config.links.iter().chain(self.config.external_links.iter()),
        )
        .await?;

        let desired: Vec<ServiceLink> = resolved
            .into_iter()
            .map(|(name, service_id)| ServiceLink { name, service_id })
            .collect();

        current.sort();

        if current == desired {
            return Ok(());
        }

        platform.set_service_links(service, &desired).await?;

        Ok(())
    }

    pub(crate) fn desired_service(&self) -> Result<Service> {
        let config = &self.config;

        let mut service = Service {
            name: self.name.clone(),
            stack_id: self.context.stack.id.clone(),
            scale: Some(config.scale.unwrap_or(1)),
            launch_config: Some(build_launch_config(config)),
            selector_link: config
                .labels
                .get(SELECTOR_LINK_LABEL)
                .cloned()
                .unwrap_or_default(),
            selector_container: config
                .labels
                .get(SELECTOR_CONTAINER_LABEL)
                .cloned()
                .unwrap_or_default(),
            lb_config: config
                .lb_config
                .as_ref()
                .map(serde_json::to_value)
                .transpose()?,
            external_ip_addresses: config.external_ips.clone(),
            hostname: config.hostname.clone(),
            metadata: config
                .metadata
                .iter()
                .map(|(key, value)| Ok((key.clone(), serde_json::to_value(value)?)))
                .collect::<Result<_>>()?,
            ..Default::default()
        };

        let hash = digest::service_hash(&service)?;

        if let Some(launch_config) = &mut service.launch_config {
            launch_config
                .labels
                .insert(SERVICE_HASH_LABEL.to_string(), hash);
        }

        Ok(service)
    }
}

async fn pull_image(
    platform: Arc<dyn Platform>,
    image: String,
    labels: BTreeMap<String, String>,
    deadline: Option<Duration>,
) -> Result<()> {
    log::info!("Pulling {image}");

    let task = platform
        .create_pull_task(&PullTask {
            mode: "all".to_string(),
            image: format!("docker:{image}"),
            labels,
            ..Default::default()
        })
        .await?;

    wait_for(&*platform, task, deadline).await?;

    Ok(())
}

fn launch_config_label(service: &Service, label: &str) -> Option<String> {
    service
        .launch_config
        .as_ref()
        .and_then(|launch_config| launch_config.labels.get(label))
        .cloned()
}

/// Project the canonical service config into the wire launch specification.
pub(crate) fn build_launch_config(config: &ServiceConfig) -> LaunchConfig {
    LaunchConfig {
        image_uuid: config.image.as_ref().map(|image| format!("docker:{image}")),
        command: config
            .command
            .as_ref()
            .map(Command::to_args)
            .unwrap_or_default(),
        environment: config.environment.to_map(),
        labels: config.labels.clone(),
        ports: config.ports.clone(),
        data_volumes: config.volumes.clone(),
        restart_policy: restart_policy(config.restart.as_deref()),
        health_check: config.health_check.as_ref().map(to_instance_health_check),
        network_mode: config.network_mode.clone(),
        log_config: config.logging.as_ref().map(|logging| LogConfig {
            driver: logging.driver.clone(),
            config: logging.options.clone(),
        }),
    }
}

fn to_instance_health_check(health_check: &HealthCheck) -> InstanceHealthCheck {
    InstanceHealthCheck {
        port: health_check.port,
        interval: health_check.interval,
        healthy_threshold: health_check.healthy_threshold,
        unhealthy_threshold: health_check.unhealthy_threshold,
        response_timeout: health_check.response_timeout,
        request_line: health_check.request_line.clone(),
        strategy: health_check.strategy.clone(),
    }
}

fn restart_policy(restart: Option<&str>) -> Option<RestartPolicy> {
    let restart = restart?;

    match restart {
        "no" | "" => Some(RestartPolicy {
            name: "no".to_string(),
            maximum_retry_count: None,
        }),
        "always" => Some(RestartPolicy {
            name: "always".to_string(),
            maximum_retry_count: None,
        }),
        other => {
            let (name, count) = match other.split_once(':') {
                Some((name, count)) => (name, count.parse::<i64>().ok()),
                None => (other, None),
            };

            Some(RestartPolicy {
                name: name.to_string(),
                maximum_retry_count: count,
            })
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::project::Options;
    use crate::rancher::types::{Container, Stack};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;

    /// Records every platform call; find answers with the canned service.
    struct MockPlatform {
        calls: Mutex<Vec<String>>,
        existing: Option<Service>,
    }

    impl MockPlatform {
        fn new(existing: Option<Service>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                existing,
            }
        }

        fn record(&self, call: &str) {
            self.calls.lock().unwrap().push(call.to_string());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn mutations(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|call| {
                    call.starts_with("create") || call.starts_with("action") || call.starts_with("set")
                })
                .collect()
        }
    }

    #[async_trait]
    impl Platform for MockPlatform {
        async fn find_service(&self, _: &str, _: &str) -> Result<Option<Service>> {
            self.record("find_service");
            Ok(self.existing.clone())
        }

        async fn create_service(&self, service: &Service) -> Result<Service> {
            self.record("create_service");

            let mut service = service.clone();
            service.id = "1s1".to_string();
            service.state = "inactive".to_string();
            Ok(service)
        }

        async fn reload_service(&self, service: &Service) -> Result<Service> {
            self.record("reload_service");

            let mut service = service.clone();
            service.transitioning = "no".to_string();
            Ok(service)
        }

        async fn service_action(
            &self,
            service: &Service,
            action: &str,
            _: Option<Value>,
        ) -> Result<Service> {
            self.record(&format!("action:{action}"));

            let mut service = service.clone();
            service.state = match action {
                "upgrade" => "upgraded".to_string(),
                "activate" | "finishupgrade" => "active".to_string(),
                _ => service.state,
            };
            service.transitioning = "no".to_string();
            Ok(service)
        }

        async fn list_service_links(&self, _: &Service) -> Result<Vec<ServiceLink>> {
            self.record("list_service_links");
            Ok(Vec::new())
        }

        async fn set_service_links(&self, _: &Service, _: &[ServiceLink]) -> Result<Service> {
            self.record("set_service_links");
            Ok(Service::default())
        }

        async fn find_stack(&self, _: &str) -> Result<Option<Stack>> {
            self.record("find_stack");
            Ok(None)
        }

        async fn create_stack(&self, stack: &Stack) -> Result<Stack> {
            self.record("create_stack");
            Ok(stack.clone())
        }

        async fn reload_stack(&self, stack: &Stack) -> Result<Stack> {
            self.record("reload_stack");
            Ok(stack.clone())
        }

        async fn find_container(&self, _: &str, _: &str) -> Result<Option<Container>> {
            self.record("find_container");
            Ok(None)
        }

        async fn create_container(&self, container: &Container) -> Result<Container> {
            self.record("create_container");
            Ok(container.clone())
        }

        async fn reload_container(&self, container: &Container) -> Result<Container> {
            self.record("reload_container");
            Ok(container.clone())
        }

        async fn create_pull_task(&self, task: &PullTask) -> Result<PullTask> {
            self.record("create_pull_task");
            Ok(task.clone())
        }

        async fn reload_pull_task(&self, task: &PullTask) -> Result<PullTask> {
            self.record("reload_pull_task");
            Ok(task.clone())
        }
    }

    fn web_config() -> ServiceConfig {
        ServiceConfig {
            image: Some("nginx".to_string()),
            ..Default::default()
        }
    }

    fn engine(
        platform: Arc<MockPlatform>,
        config: ServiceConfig,
        options: Options,
    ) -> RancherService {
        let context = Arc::new(Context::new(
            platform,
            Stack {
                id: "1st1".to_string(),
                name: "demo".to_string(),
                ..Default::default()
            },
            "demo".to_string(),
            Config {
                services: std::collections::BTreeMap::from([("web".to_string(), web_config())]),
                ..Default::default()
            },
            options,
        ));

        RancherService::new("web".to_string(), config, context)
    }

    #[tokio::test]
    async fn test_create_only_leaves_service_inactive() {
        let platform = Arc::new(MockPlatform::new(None));
        let service = engine(platform.clone(), web_config(), Options::default());

        service.create().await.unwrap();

        let calls = platform.calls();
        assert!(calls.contains(&"create_service".to_string()));
        assert!(!calls.iter().any(|call| call.starts_with("action:")));
        assert!(!calls.iter().any(|call| call.starts_with("reload")));
    }

    #[tokio::test]
    async fn test_unchanged_active_service_is_a_noop() {
        // an existing resource carrying exactly the hash we would compute
        let probe = engine(Arc::new(MockPlatform::new(None)), web_config(), Options::default());
        let mut existing = probe.desired_service().unwrap();
        existing.id = "1s1".to_string();
        existing.state = "active".to_string();

        let platform = Arc::new(MockPlatform::new(Some(existing)));
        let service = engine(platform.clone(), web_config(), Options::default());

        service.up().await.unwrap();

        assert!(platform.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_drift_without_upgrade_semantics_only_warns() {
        let probe = engine(Arc::new(MockPlatform::new(None)), web_config(), Options::default());
        let mut existing = probe.desired_service().unwrap();
        existing.id = "1s1".to_string();
        existing.state = "active".to_string();

        let mut changed = web_config();
        changed.image = Some("nginx:1.25".to_string());

        let platform = Arc::new(MockPlatform::new(Some(existing)));
        let service = engine(platform.clone(), changed, Options::default());

        service.up().await.unwrap();

        assert!(platform.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_drift_with_upgrade_semantics_upgrades() {
        let probe = engine(Arc::new(MockPlatform::new(None)), web_config(), Options::default());
        let mut existing = probe.desired_service().unwrap();
        existing.id = "1s1".to_string();
        existing.state = "active".to_string();

        let mut changed = web_config();
        changed.image = Some("nginx:1.25".to_string());

        let platform = Arc::new(MockPlatform::new(Some(existing)));
        let service = engine(
            platform.clone(),
            changed,
            Options {
                upgrade: true,
                confirm_upgrade: true,
                ..Default::default()
            },
        );

        service.up().await.unwrap();

        let calls = platform.calls();
        assert!(calls.contains(&"action:upgrade".to_string()));
        assert!(calls.contains(&"action:finishupgrade".to_string()));
    }

    #[tokio::test]
    async fn test_inactive_service_is_activated() {
        let probe = engine(Arc::new(MockPlatform::new(None)), web_config(), Options::default());
        let mut existing = probe.desired_service().unwrap();
        existing.id = "1s1".to_string();
        existing.state = "inactive".to_string();
        existing
            .actions
            .insert("activate".to_string(), "http://example/activate".to_string());

        let platform = Arc::new(MockPlatform::new(Some(existing)));
        let service = engine(platform.clone(), web_config(), Options::default());

        service.up().await.unwrap();

        assert!(platform.calls().contains(&"action:activate".to_string()));
    }

    #[tokio::test]
    async fn test_rollback_short_circuits() {
        let probe = engine(Arc::new(MockPlatform::new(None)), web_config(), Options::default());
        let mut existing = probe.desired_service().unwrap();
        existing.id = "1s1".to_string();
        existing.state = "active".to_string();

        let platform = Arc::new(MockPlatform::new(Some(existing)));
        let service = engine(
            platform.clone(),
            web_config(),
            Options {
                rollback: true,
                ..Default::default()
            },
        );

        service.up().await.unwrap();

        assert_eq!(platform.mutations(), vec!["action:rollback".to_string()]);
    }

    #[test]
    fn test_restart_policy_parsing() {
        assert_eq!(restart_policy(Some("no")).unwrap().name, "no");
        assert_eq!(restart_policy(Some("always")).unwrap().name, "always");

        let on_failure = restart_policy(Some("on-failure:5")).unwrap();
        assert_eq!(on_failure.name, "on-failure");
        assert_eq!(on_failure.maximum_retry_count, Some(5));

        assert!(restart_policy(None).is_none());
    }
}
