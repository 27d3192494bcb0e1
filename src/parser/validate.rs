use serde_yaml::Value;

use super::raw::RawServiceMap;
use crate::config::schema::{self, FieldKind};
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

/// Structural check of every declared field against the schema descriptor.
/// Fields the schema does not declare pass through opaquely.
pub fn validate(services: &RawServiceMap, version: Version) -> Result<()> {
    for (name, service) in services {
        for (field, value) in service {
            let Some(descriptor) = schema::find(field) else {
                continue;
            };

            // legacy documents store the context directly on `build`
            let kind = if field == "build" && version == Version::V1 {
                FieldKind::Scalar
            } else {
                descriptor.kind
            };

            if let Some(reason) = shape_mismatch(kind, value) {
                return Err(Error::Validation {
                    service: name.clone(),
                    field: field.clone(),
                    reason: reason.to_string(),
                });
            }
        }
    }

    Ok(())
}

fn shape_mismatch(kind: FieldKind, value: &Value) -> Option<&'static str> {
    if value.is_null() {
        return None;
    }

    match kind {
        FieldKind::Scalar => match value {
            Value::Sequence(_) | Value::Mapping(_) => Some("must be a scalar"),
            _ => None,
        },

        FieldKind::List => match value {
            Value::Sequence(_) => None,
            _ => Some("must be a list"),
        },

        FieldKind::Map | FieldKind::Object => match value {
            Value::Mapping(_) => None,
            _ => Some("must be a mapping"),
        },

        FieldKind::MapOrList => match value {
            Value::Mapping(_) | Value::Sequence(_) => None,
            _ => Some("must be a mapping or a list"),
        },

        FieldKind::ScalarOrMap => match value {
            Value::Sequence(_) => Some("must be a scalar or a mapping"),
            _ => None,
        },

        FieldKind::ScalarOrList => match value {
            Value::Mapping(_) => Some("must be a scalar or a list"),
            _ => None,
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::raw::RawService;

    fn service_map(yaml: &str) -> RawServiceMap {
        let service: RawService = serde_yaml::from_str(yaml).unwrap();
        RawServiceMap::from([("web".to_string(), service)])
    }

    #[test]
    fn test_error_names_service_and_field() {
        let services = service_map("image: nginx\nlinks: not-a-list\n");

        let err = validate(&services, Version::V2).unwrap_err();

        match err {
            Error::Validation { service, field, .. } => {
                assert_eq!(service, "web");
                assert_eq!(field, "links");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_v1_build_must_be_scalar() {
        let services = service_map("build:\n  context: ./app\n");

        assert!(validate(&services, Version::V1).is_err());
        assert!(validate(&services, Version::V2).is_ok());
    }

    #[test]
    fn test_unknown_fields_pass_through() {
        let services = service_map("mystery_field:\n  anything: goes\n");

        assert!(validate(&services, Version::V2).is_ok());
    }
}
