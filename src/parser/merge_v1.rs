use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::Value;

use super::raw::{RawService, RawServiceMap};
use super::validate::{validate, Version};
use super::{is_valid_remote, read_env_file, service_value};
use crate::config::ServiceConfigV1;
use crate::errors::{Error, Result};
use crate::lookup::resource::{join_clean, ResourceLookup};

/// Validate and transform a legacy service map, then project it into the
/// legacy typed model.
pub fn merge_services_v1(
    resource_lookup: Option<&dyn ResourceLookup>,
    file: &str,
    services: RawServiceMap,
) -> Result<BTreeMap<String, ServiceConfigV1>> {
    validate(&services, Version::V1)?;

    let mut configs = BTreeMap::new();

    for (name, mut service) in services {
        if let Err(err) = parse_v1(resource_lookup, file, &mut service) {
            log::error!("Failed to parse service {name}: {err}");
            return Err(err);
        }

        let config = serde_yaml::from_value::<ServiceConfigV1>(service_value(service)).map_err(
            |err| Error::Convert {
                service: name.clone(),
                reason: err.to_string(),
            },
        )?;

        configs.insert(name, config);
    }

    Ok(configs)
}

fn parse_v1(
    resource_lookup: Option<&dyn ResourceLookup>,
    in_file: &str,
    service: &mut RawService,
) -> Result<()> {
    read_env_file(resource_lookup, in_file, service)?;
    resolve_context_v1(in_file, service);

    Ok(())
}

/// Legacy documents store the build context directly on `build`.
fn resolve_context_v1(in_file: &str, service: &mut RawService) {
    let context = service
        .get("build")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if context.is_empty() || is_valid_remote(&context) {
        return;
    }

    let current = Path::new(in_file).parent().unwrap_or_else(|| Path::new(""));

    let resolved = if context == "." {
        current.to_path_buf()
    } else {
        join_clean(current, Path::new(&context))
    };

    service.insert(
        "build".to_string(),
        Value::String(resolved.to_string_lossy().into_owned()),
    );
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw_service(yaml: &str) -> RawService {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_build_context_resolution() {
        let mut service = raw_service("build: .");
        resolve_context_v1("a/b/compose.yml", &mut service);
        assert_eq!(service["build"].as_str(), Some("a/b"));

        let mut service = raw_service("build: ./sub");
        resolve_context_v1("a/b/compose.yml", &mut service);
        assert_eq!(service["build"].as_str(), Some("a/b/sub"));

        let mut service = raw_service("build: https://example.com/repo.git");
        resolve_context_v1("a/b/compose.yml", &mut service);
        assert_eq!(
            service["build"].as_str(),
            Some("https://example.com/repo.git")
        );
    }

    #[test]
    fn test_projection_into_v1_model() {
        let services = RawServiceMap::from([(
            "web".to_string(),
            raw_service("image: nginx\nnet: host\nlog_driver: syslog\n"),
        )]);

        let configs = merge_services_v1(None, "compose.yml", services).unwrap();

        let web = &configs["web"];
        assert_eq!(web.image.as_deref(), Some("nginx"));
        assert_eq!(web.net.as_deref(), Some("host"));
        assert_eq!(web.log_driver.as_deref(), Some("syslog"));
    }
}
