use std::collections::BTreeMap;

use crate::config::{BuildConfig, LoggingConfig, ServiceConfig, ServiceConfigV1};

/// Upgrade legacy typed services to the canonical v2 shape. Fields with the
/// same meaning carry over verbatim; the relocated ones map as:
/// `build`/`dockerfile` into the build block, `log_driver`/`log_opt` into the
/// logging block, `net` into `network_mode`.
pub fn convert_services(
    v1_services: BTreeMap<String, ServiceConfigV1>,
) -> BTreeMap<String, ServiceConfig> {
    v1_services
        .into_iter()
        .map(|(name, service)| (name, convert_service(service)))
        .collect()
}

pub fn convert_service(v1: ServiceConfigV1) -> ServiceConfig {
    let build = if v1.build.is_some() || v1.dockerfile.is_some() {
        Some(BuildConfig {
            context: v1.build,
            dockerfile: v1.dockerfile,
            args: BTreeMap::new(),
        })
    } else {
        None
    };

    let logging = if v1.log_driver.is_some() || !v1.log_opt.is_empty() {
        Some(LoggingConfig {
            driver: v1.log_driver,
            options: v1.log_opt,
        })
    } else {
        None
    };

    ServiceConfig {
        image: v1.image,
        build,
        command: v1.command,
        links: v1.links,
        external_links: v1.external_links,
        volumes: v1.volumes,
        volumes_from: v1.volumes_from,
        ports: v1.ports,
        environment: v1.environment,
        labels: v1.labels,
        restart: v1.restart,
        network_mode: v1.net,
        logging,
        scale: v1.scale,
        hostname: v1.hostname,
        external_ips: v1.external_ips,
        health_check: v1.health_check,
        upgrade_strategy: v1.upgrade_strategy,
        lb_config: v1.lb_config,
        storage_driver: v1.storage_driver,
        network_driver: v1.network_driver,
        metadata: v1.metadata,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Environment;

    #[test]
    fn test_relocated_fields() {
        let v1 = ServiceConfigV1 {
            build: Some("./app".to_string()),
            dockerfile: Some("Dockerfile.dev".to_string()),
            log_driver: Some("syslog".to_string()),
            log_opt: BTreeMap::from([("tag".to_string(), "web".to_string())]),
            net: Some("host".to_string()),
            ..Default::default()
        };

        let v2 = convert_service(v1);

        let build = v2.build.unwrap();
        assert_eq!(build.context.as_deref(), Some("./app"));
        assert_eq!(build.dockerfile.as_deref(), Some("Dockerfile.dev"));

        let logging = v2.logging.unwrap();
        assert_eq!(logging.driver.as_deref(), Some("syslog"));
        assert_eq!(logging.options.get("tag"), Some(&"web".to_string()));

        assert_eq!(v2.network_mode.as_deref(), Some("host"));
    }

    #[test]
    fn test_verbatim_fields_carry_over() {
        let v1 = ServiceConfigV1 {
            image: Some("nginx".to_string()),
            links: vec!["db:database".to_string()],
            environment: Environment(vec!["A=1".to_string()]),
            restart: Some("always".to_string()),
            scale: Some(3),
            ..Default::default()
        };

        let v2 = convert_service(v1);

        assert_eq!(v2.image.as_deref(), Some("nginx"));
        assert_eq!(v2.links, vec!["db:database".to_string()]);
        assert_eq!(v2.environment.0, vec!["A=1".to_string()]);
        assert_eq!(v2.restart.as_deref(), Some("always"));
        assert_eq!(v2.scale, Some(3));
        assert!(v2.build.is_none());
        assert!(v2.logging.is_none());
    }
}
