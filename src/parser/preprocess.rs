use serde_yaml::Value;

use super::raw::RawServiceMap;
use crate::config::schema;

/// Normalize every raw service's values before projection: leaves under
/// `environment`/`labels` become strings, string leaves under the declared
/// rancher object fields become integers where they parse as one.
pub fn pre_process_service_map(service_map: RawServiceMap) -> RawServiceMap {
    service_map
        .into_iter()
        .map(|(name, service)| {
            let service = service
                .into_iter()
                .map(|(field, value)| {
                    let value = pre_process(value, field == "environment" || field == "labels");
                    let value = coerce_ints(value, schema::is_rancher_object(&field));

                    (field, value)
                })
                .collect();

            (name, service)
        })
        .collect()
}

fn pre_process(value: Value, stringify: bool) -> Value {
    match value {
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .into_iter()
                .map(|(key, value)| (key, pre_process(value, stringify)))
                .collect(),
        ),

        Value::Sequence(seq) => Value::Sequence(
            seq.into_iter()
                .map(|value| pre_process(value, stringify))
                .collect(),
        ),

        Value::Tagged(mut tagged) => {
            let inner = std::mem::replace(&mut tagged.value, Value::Null);
            tagged.value = pre_process(inner, stringify);
            Value::Tagged(tagged)
        }

        Value::Bool(b) if stringify => Value::String(b.to_string()),
        Value::Number(n) if stringify => Value::String(n.to_string()),

        other => other,
    }
}

fn coerce_ints(value: Value, convert: bool) -> Value {
    match value {
        Value::Mapping(mapping) => Value::Mapping(
            mapping
                .into_iter()
                .map(|(key, value)| (key, coerce_ints(value, convert)))
                .collect(),
        ),

        Value::Sequence(seq) => Value::Sequence(
            seq.into_iter()
                .map(|value| coerce_ints(value, convert))
                .collect(),
        ),

        Value::Tagged(mut tagged) => {
            let inner = std::mem::replace(&mut tagged.value, Value::Null);
            tagged.value = coerce_ints(inner, convert);
            Value::Tagged(tagged)
        }

        Value::String(s) if convert => match s.parse::<i64>() {
            Ok(n) => Value::Number(n.into()),
            Err(_) => Value::String(s),
        },

        other => other,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::raw::{RawService, RawServiceMap};

    fn service_map(yaml: &str) -> RawServiceMap {
        let service: RawService = serde_yaml::from_str(yaml).unwrap();
        RawServiceMap::from([("web".to_string(), service)])
    }

    #[test]
    fn test_environment_leaves_become_strings() {
        let processed = pre_process_service_map(service_map(
            "environment:\n  PORT: 1\n  DEBUG: true\n  NAME: web\n",
        ));

        let environment = processed["web"]["environment"].as_mapping().unwrap();

        assert_eq!(environment["PORT"].as_str(), Some("1"));
        assert_eq!(environment["DEBUG"].as_str(), Some("true"));
        assert_eq!(environment["NAME"].as_str(), Some("web"));
    }

    #[test]
    fn test_rancher_object_strings_become_ints() {
        let processed = pre_process_service_map(service_map(
            "health_check:\n  port: '80'\n  request_line: GET /ping\n",
        ));

        let health_check = processed["web"]["health_check"].as_mapping().unwrap();

        assert_eq!(health_check["port"].as_i64(), Some(80));
        assert_eq!(health_check["request_line"].as_str(), Some("GET /ping"));
    }

    #[test]
    fn test_other_fields_pass_through() {
        let processed =
            pre_process_service_map(service_map("image: nginx\nports:\n  - '80'\n"));

        assert_eq!(processed["web"]["image"].as_str(), Some("nginx"));
        assert_eq!(processed["web"]["ports"][0].as_str(), Some("80"));
    }
}
