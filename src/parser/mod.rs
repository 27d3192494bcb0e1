pub mod convert;
pub mod interpolation;
pub mod merge_v1;
pub mod merge_v2;
pub mod preprocess;
pub mod raw;
pub mod validate;

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::config::merge::{merge_services, MergeRules};
use crate::config::{
    Config, DependencyConfig, Environment, HostConfig, NetworkConfig, SecretConfig, ServiceConfig,
    VolumeConfig,
};
use crate::errors::{Error, Result};
use crate::lookup::resource::ResourceLookup;
use crate::lookup::EnvironmentLookup;
use crate::template::TemplateEngine;
use raw::RawService;

/// Resolve one compose document into the canonical model, merging it onto the
/// services resolved from earlier files. Either the full config is produced
/// or an error is returned; there is no partial success.
pub fn merge(
    existing_services: &BTreeMap<String, ServiceConfig>,
    environment_lookup: &dyn EnvironmentLookup,
    resource_lookup: Option<&dyn ResourceLookup>,
    template: &dyn TemplateEngine,
    file: &str,
    contents: &[u8],
) -> Result<Config> {
    let variables = environment_lookup.variables();

    let contents = template.apply(contents, &variables)?;

    let mut raw = raw::create_raw_config(&contents)?;

    interpolation::interpolate_raw_service_map(&mut raw.services, &variables);
    interpolation::interpolate_raw_service_map(&mut raw.containers, &variables);

    for (name, value) in raw.volumes.iter_mut() {
        interpolation::interpolate(name, value, &variables);
    }
    for (name, value) in raw.networks.iter_mut() {
        interpolation::interpolate(name, value, &variables);
    }

    let raw_services = preprocess::pre_process_service_map(std::mem::take(&mut raw.services));
    let raw_containers = preprocess::pre_process_service_map(std::mem::take(&mut raw.containers));

    let v2 = raw.version == "2";

    let services = if v2 {
        merge_v2::merge_services_v2(resource_lookup, file, raw_services)?
    } else {
        convert::convert_services(merge_v1::merge_services_v1(
            resource_lookup,
            file,
            raw_services,
        )?)
    };

    let mut services = merge_services(existing_services, services, MergeRules::default())?;

    let mut containers = if v2 {
        merge_v2::merge_services_v2(resource_lookup, file, raw_containers)?
    } else {
        BTreeMap::new()
    };

    adjust_values(&mut services);
    adjust_values(&mut containers);

    Ok(Config {
        services,
        containers,
        volumes: convert_map::<VolumeConfig>(raw.volumes)?,
        networks: convert_map::<NetworkConfig>(raw.networks)?,
        hosts: convert_map::<HostConfig>(raw.hosts)?,
        secrets: convert_map::<SecretConfig>(raw.secrets)?,
        dependencies: convert_map::<DependencyConfig>(raw.dependencies)?,
    })
}

/// The yaml parser can turn `no` into `false`, which is not a valid restart
/// policy.
fn adjust_values(services: &mut BTreeMap<String, ServiceConfig>) {
    for service in services.values_mut() {
        if service.restart.as_deref() == Some("false") {
            service.restart = Some("no".to_string());
        }
    }
}

/// Merge `env_file` contents into the service's environment. Files load in
/// reverse declared order; a key already present inline or supplied by an
/// earlier-processed file is never overwritten.
pub(crate) fn read_env_file(
    resource_lookup: Option<&dyn ResourceLookup>,
    in_file: &str,
    service: &mut RawService,
) -> Result<()> {
    let Some(env_file_value) = service.get("env_file") else {
        return Ok(());
    };

    let env_files = string_or_slice(env_file_value);
    if env_files.is_empty() {
        return Ok(());
    }

    let Some(resource_lookup) = resource_lookup else {
        return Err(Error::MissingResourceLookup {
            file: in_file.to_string(),
        });
    };

    let mut vars = match service.get("environment") {
        Some(value) => {
            serde_yaml::from_value::<Environment>(value.clone())
                .map_err(Error::Parse)?
                .0
        }
        None => Vec::new(),
    };

    for env_file in env_files.iter().rev() {
        let (content, _) = resource_lookup.lookup(env_file, in_file)?;
        let content = String::from_utf8_lossy(&content);

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // key includes the separator so FOO never shadows FOOBAR
            let key = match line.find('=') {
                Some(pos) => &line[..=pos],
                None => line,
            };

            if !vars.iter().any(|entry| entry.starts_with(key)) {
                vars.push(line.to_string());
            }
        }
    }

    service.insert(
        "environment".to_string(),
        Value::Sequence(vars.into_iter().map(Value::String).collect()),
    );
    service.remove("env_file");

    Ok(())
}

/// Whether a build context is a remote the daemon resolves itself.
pub fn is_valid_remote(context: &str) -> bool {
    context.starts_with("http://")
        || context.starts_with("https://")
        || context.starts_with("git://")
        || context.starts_with("git@")
        || context.starts_with("github.com/")
        || context.ends_with(".git")
}

fn string_or_slice(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn service_value(service: RawService) -> Value {
    Value::Mapping(
        service
            .into_iter()
            .map(|(key, value)| (Value::String(key), value))
            .collect(),
    )
}

fn convert_map<T>(raw: BTreeMap<String, Value>) -> Result<BTreeMap<String, T>>
where
    T: DeserializeOwned + Default,
{
    raw.into_iter()
        .map(|(name, value)| {
            let typed = match value {
                Value::Null => T::default(),
                value => serde_yaml::from_value(value).map_err(|err| Error::Convert {
                    service: name.clone(),
                    reason: err.to_string(),
                })?,
            };

            Ok((name, typed))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lookup::MapEnvLookup;
    use crate::template::NoopTemplate;
    use std::collections::HashMap;

    fn resolve(existing: &BTreeMap<String, ServiceConfig>, contents: &str) -> Config {
        let lookup = MapEnvLookup {
            env: HashMap::new(),
        };

        merge(
            existing,
            &lookup,
            None,
            &NoopTemplate,
            "compose.yml",
            contents.as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_v1_service_count() {
        let config = resolve(
            &BTreeMap::new(),
            "
web:
  image: nginx
db:
  image: postgres
'.catalog':
  questions: []
",
        );

        assert_eq!(config.services.len(), 2);
    }

    #[test]
    fn test_restart_policy_fixup() {
        let config = resolve(&BTreeMap::new(), "web:\n  image: nginx\n  restart: false\n");

        assert_eq!(config.services["web"].restart.as_deref(), Some("no"));
    }

    #[test]
    fn test_cross_file_merge_replaces_links() {
        let first = resolve(
            &BTreeMap::new(),
            "
version: '2'
services:
  web:
    image: nginx
    links:
      - db
",
        );

        let second = resolve(
            &first.services,
            "
version: '2'
services:
  web:
    links:
      - cache
",
        );

        let web = &second.services["web"];
        assert_eq!(web.image.as_deref(), Some("nginx"));
        assert_eq!(web.links, vec!["cache".to_string()]);
    }

    #[test]
    fn test_interpolation_feeds_the_model() {
        let lookup = MapEnvLookup {
            env: HashMap::from([("TAG".to_string(), "1.25".to_string())]),
        };

        let config = merge(
            &BTreeMap::new(),
            &lookup,
            None,
            &NoopTemplate,
            "compose.yml",
            b"version: '2'\nservices:\n  web:\n    image: 'nginx:${TAG}'\n",
        )
        .unwrap();

        assert_eq!(
            config.services["web"].image.as_deref(),
            Some("nginx:1.25")
        );
    }

    #[test]
    fn test_null_volume_defaults() {
        let config = resolve(
            &BTreeMap::new(),
            "
version: '2'
services:
  web:
    image: nginx
volumes:
  data:
  fast:
    driver: local
",
        );

        assert_eq!(config.volumes.len(), 2);
        assert!(config.volumes["data"].driver.is_none());
        assert_eq!(config.volumes["fast"].driver.as_deref(), Some("local"));
    }

    #[test]
    fn test_malformed_document_aborts() {
        let lookup = MapEnvLookup {
            env: HashMap::new(),
        };

        let result = merge(
            &BTreeMap::new(),
            &lookup,
            None,
            &NoopTemplate,
            "compose.yml",
            b"version: '2'\nservices: \"not a map\"\n",
        );

        assert!(result.is_err());
    }
}
