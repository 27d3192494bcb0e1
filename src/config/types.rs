use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;

use crate::utils::parse_key_val;

/// Terminal artifact of the resolve pipeline and the sole input to the
/// reconciliation stage. All maps default to empty, never absent.
#[derive(Debug, Default, Clone)]
pub struct Config {
    pub services: BTreeMap<String, ServiceConfig>,
    pub containers: BTreeMap<String, ServiceConfig>,
    pub volumes: BTreeMap<String, VolumeConfig>,
    pub networks: BTreeMap<String, NetworkConfig>,
    pub hosts: BTreeMap<String, HostConfig>,
    pub secrets: BTreeMap<String, SecretConfig>,
    pub dependencies: BTreeMap<String, DependencyConfig>,
}

/// Canonical, version-independent projection of one raw service. Legacy (v1)
/// documents are parsed into [`ServiceConfigV1`] first and converted.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_links: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes_from: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "Environment::is_empty")]
    pub environment: Environment,
    #[serde(
        deserialize_with = "de_string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub labels: BTreeMap<String, String>,
    #[serde(
        deserialize_with = "de_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub restart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_ips: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_strategy: Option<UpgradeStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lb_config: Option<LbConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_driver: Option<StorageDriver>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_driver: Option<NetworkDriver>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

/// Legacy schema: build is a bare context path and logging/network settings
/// live in flat fields.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfigV1 {
    pub image: Option<String>,
    pub build: Option<String>,
    pub dockerfile: Option<String>,
    pub command: Option<Command>,
    pub links: Vec<String>,
    pub external_links: Vec<String>,
    pub volumes: Vec<String>,
    pub volumes_from: Vec<String>,
    pub ports: Vec<String>,
    pub environment: Environment,
    #[serde(deserialize_with = "de_string_map")]
    pub labels: BTreeMap<String, String>,
    #[serde(deserialize_with = "de_opt_string")]
    pub restart: Option<String>,
    pub net: Option<String>,
    pub log_driver: Option<String>,
    #[serde(deserialize_with = "de_string_map")]
    pub log_opt: BTreeMap<String, String>,
    pub scale: Option<i64>,
    pub hostname: Option<String>,
    pub external_ips: Vec<String>,
    pub health_check: Option<HealthCheck>,
    pub upgrade_strategy: Option<UpgradeStrategy>,
    pub lb_config: Option<LbConfig>,
    pub storage_driver: Option<StorageDriver>,
    pub network_driver: Option<NetworkDriver>,
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
    #[serde(
        deserialize_with = "de_string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub args: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    Shell(String),
    Args(Vec<String>),
}

impl Command {
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Command::Shell(line) => line.split_whitespace().map(str::to_string).collect(),
            Command::Args(args) => args.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(
        deserialize_with = "de_string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_timeout: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpgradeStrategy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_millis: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_first: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub certs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_cert: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub port_rules: Vec<PortRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stickiness_policy: Option<StickinessPolicy>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickinessPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageDriver {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_device_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_access_mode: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_capabilities: Vec<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkDriver {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub cni_config: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_network: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(
        deserialize_with = "de_string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub driver_opts: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_container: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(
        deserialize_with = "de_string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub driver_opts: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(flatten)]
    pub dynamic: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Ordered `KEY=value` pairs. Compose allows both the mapping and the list
/// form; either way the stringified pairs keep their declared order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct Environment(pub Vec<String>);

impl Environment {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0
            .iter()
            .any(|entry| entry.split_once('=').map_or(entry.as_str(), |(k, _)| k) == key)
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.0
            .iter()
            .map(|entry| {
                parse_key_val(entry).unwrap_or_else(|| (entry.clone(), String::new()))
            })
            .collect()
    }
}

impl<'de> Deserialize<'de> for Environment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;

        match value {
            Value::Null => Ok(Environment(Vec::new())),

            Value::Sequence(seq) => {
                let mut entries = Vec::new();

                for item in seq {
                    let item = scalar_to_string(&item).ok_or_else(|| {
                        serde::de::Error::custom("environment entries must be scalars")
                    })?;

                    entries.push(item);
                }

                Ok(Environment(entries))
            }

            Value::Mapping(mapping) => {
                let mut entries = Vec::new();

                for (key, value) in mapping {
                    let key = key
                        .as_str()
                        .ok_or_else(|| serde::de::Error::custom("environment keys must be strings"))?;

                    let value = scalar_to_string(&value).ok_or_else(|| {
                        serde::de::Error::custom("environment values must be scalars")
                    })?;

                    entries.push(format!("{key}={value}"));
                }

                Ok(Environment(entries))
            }

            _ => Err(serde::de::Error::custom(
                "environment must be a mapping or a list",
            )),
        }
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Accepts the mapping form and the `key=value` list form, stringifying any
/// scalar values the yaml parser typed.
fn de_string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(BTreeMap::new()),

        Value::Mapping(mapping) => {
            let mut map = BTreeMap::new();

            for (key, value) in mapping {
                let key = key
                    .as_str()
                    .ok_or_else(|| serde::de::Error::custom("keys must be strings"))?;

                let value = scalar_to_string(&value)
                    .ok_or_else(|| serde::de::Error::custom("values must be scalars"))?;

                map.insert(key.to_string(), value);
            }

            Ok(map)
        }

        Value::Sequence(seq) => {
            let mut map = BTreeMap::new();

            for item in seq {
                let item = item
                    .as_str()
                    .ok_or_else(|| serde::de::Error::custom("entries must be strings"))?;

                let (key, value) =
                    parse_key_val(item).unwrap_or_else(|| (item.to_string(), String::new()));

                map.insert(key, value);
            }

            Ok(map)
        }

        _ => Err(serde::de::Error::custom("expected a mapping or a list")),
    }
}

/// The yaml parser types bare `false`/`true`; restart policies and similar
/// fields need the textual form back.
fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    match value {
        Value::Null => Ok(None),
        other => scalar_to_string(&other)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a scalar")),
    }
}
