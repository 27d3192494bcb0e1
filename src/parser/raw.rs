use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_yaml::{Mapping, Value};

use crate::config::schema;
use crate::consts::{DNS_SERVICE_IMAGE, EXTERNAL_SERVICE_IMAGE};
use crate::errors::{Error, Result};

pub type RawService = BTreeMap<String, Value>;
pub type RawServiceMap = BTreeMap<String, RawService>;

/// Version-tagged raw document. Alternate resource kinds are folded into the
/// unified service map by [`create_raw_config`]; callers never observe an
/// absent mapping.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    #[serde(deserialize_with = "de_version")]
    pub version: String,
    #[serde(deserialize_with = "de_service_map")]
    pub services: RawServiceMap,
    #[serde(deserialize_with = "de_service_map")]
    pub containers: RawServiceMap,
    pub volumes: BTreeMap<String, Value>,
    pub networks: BTreeMap<String, Value>,
    pub hosts: BTreeMap<String, Value>,
    pub secrets: BTreeMap<String, Value>,
    pub dependencies: BTreeMap<String, Value>,
    #[serde(deserialize_with = "de_service_map")]
    pub load_balancers: RawServiceMap,
    #[serde(deserialize_with = "de_service_map")]
    pub storage_drivers: RawServiceMap,
    #[serde(deserialize_with = "de_service_map")]
    pub network_drivers: RawServiceMap,
    #[serde(deserialize_with = "de_service_map")]
    pub virtual_machines: RawServiceMap,
    #[serde(deserialize_with = "de_service_map")]
    pub external_services: RawServiceMap,
    #[serde(deserialize_with = "de_service_map")]
    pub aliases: RawServiceMap,
}

/// Parse a (template-expanded) document into its raw, version-tagged shape.
/// Anything other than `version: "2"` is treated as a legacy document and
/// re-parsed directly into the service-map shape.
pub fn create_raw_config(contents: &[u8]) -> Result<RawConfig> {
    let mut raw: RawConfig = serde_yaml::from_slice(contents)?;

    if raw.version != "2" {
        let document: Value = serde_yaml::from_slice(contents)?;
        raw.services = value_to_service_map(document)?;
    }

    // catalog metadata, not a service
    raw.services.remove(".catalog");

    for (name, mut service) in std::mem::take(&mut raw.load_balancers) {
        transfer_fields(&mut service, "lb_config", schema::LB_CONFIG_FIELDS);
        raw.services.insert(name, service);
    }

    for (name, mut service) in std::mem::take(&mut raw.storage_drivers) {
        transfer_fields(&mut service, "storage_driver", schema::STORAGE_DRIVER_FIELDS);
        raw.services.insert(name, service);
    }

    for (name, mut service) in std::mem::take(&mut raw.network_drivers) {
        transfer_fields(&mut service, "network_driver", schema::NETWORK_DRIVER_FIELDS);
        raw.services.insert(name, service);
    }

    for (name, service) in std::mem::take(&mut raw.virtual_machines) {
        raw.services.insert(name, service);
    }

    for (name, mut service) in std::mem::take(&mut raw.external_services) {
        service.insert(
            "image".to_string(),
            Value::String(EXTERNAL_SERVICE_IMAGE.to_string()),
        );
        raw.services.insert(name, service);
    }

    for (name, mut service) in std::mem::take(&mut raw.aliases) {
        if let Some(aliases) = service.remove("services") {
            service.insert(
                "image".to_string(),
                Value::String(DNS_SERVICE_IMAGE.to_string()),
            );
            service.insert("links".to_string(), aliases);
            raw.services.insert(name, service);
        }
    }

    Ok(raw)
}

/// Nest the fields the schema declares for the kind under its prefixed key.
/// The flat copies stay in place; unknown fields are never projected.
fn transfer_fields(service: &mut RawService, prefix: &str, fields: &[&str]) {
    let mut nested = match service.get(prefix) {
        Some(Value::Mapping(mapping)) => mapping.clone(),
        _ => Mapping::new(),
    };

    for field in fields {
        if let Some(value) = service.get(*field) {
            nested.insert(Value::String((*field).to_string()), value.clone());
        }
    }

    if !nested.is_empty() {
        service.insert(prefix.to_string(), Value::Mapping(nested));
    }
}

fn value_to_service_map(value: Value) -> Result<RawServiceMap> {
    let mapping = match value {
        Value::Null => return Ok(RawServiceMap::new()),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(Error::Document(
                "top level must be a mapping of services".to_string(),
            ))
        }
    };

    let mut services = RawServiceMap::new();

    for (name, value) in mapping {
        let name = key_to_string(&name)
            .ok_or_else(|| Error::Document("service names must be scalars".to_string()))?;

        services.insert(name.clone(), value_to_service(&name, value)?);
    }

    Ok(services)
}

fn value_to_service(name: &str, value: Value) -> Result<RawService> {
    let mapping = match value {
        Value::Null => return Ok(RawService::new()),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(Error::Document(format!(
                "service {name} must be a mapping"
            )))
        }
    };

    let mut service = RawService::new();

    for (field, value) in mapping {
        let field = key_to_string(&field)
            .ok_or_else(|| Error::Document(format!("service {name} has a non-scalar key")))?;

        service.insert(field, value);
    }

    Ok(service)
}

fn key_to_string(key: &Value) -> Option<String> {
    match key {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn de_version<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s),
        _ => Err(serde::de::Error::custom("version must be a scalar")),
    }
}

fn de_service_map<'de, D>(deserializer: D) -> std::result::Result<RawServiceMap, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;

    value_to_service_map(value).map_err(|err| serde::de::Error::custom(err.to_string()))
}
