use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::{Mapping, Value};

use super::raw::{RawService, RawServiceMap};
use super::validate::{validate, Version};
use super::{is_valid_remote, read_env_file, service_value};
use crate::config::ServiceConfig;
use crate::errors::{Error, Result};
use crate::lookup::resource::{join_clean, ResourceLookup};

/// Validate and transform a v2 service map, then project it into the
/// canonical model.
pub fn merge_services_v2(
    resource_lookup: Option<&dyn ResourceLookup>,
    file: &str,
    services: RawServiceMap,
) -> Result<BTreeMap<String, ServiceConfig>> {
    validate(&services, Version::V2)?;

    let mut configs = BTreeMap::new();

    for (name, mut service) in services {
        if let Err(err) = parse_v2(resource_lookup, file, &mut service) {
            log::error!("Failed to parse service {name}: {err}");
            return Err(err);
        }

        let config = serde_yaml::from_value::<ServiceConfig>(service_value(service)).map_err(
            |err| Error::Convert {
                service: name.clone(),
                reason: err.to_string(),
            },
        )?;

        configs.insert(name, config);
    }

    Ok(configs)
}

fn parse_v2(
    resource_lookup: Option<&dyn ResourceLookup>,
    in_file: &str,
    service: &mut RawService,
) -> Result<()> {
    read_env_file(resource_lookup, in_file, service)?;
    resolve_context_v2(in_file, service);

    Ok(())
}

/// A v2 `build` is either a bare context path or a mapping carrying one;
/// both normalize to the mapping form with a resolved context.
fn resolve_context_v2(in_file: &str, service: &mut RawService) {
    let Some(build) = service.get("build").cloned() else {
        return;
    };

    let mut build = match build {
        Value::String(context) => {
            let mut mapping = Mapping::new();
            mapping.insert(
                Value::String("context".to_string()),
                Value::String(context),
            );
            mapping
        }
        Value::Mapping(mapping) => mapping,
        _ => return,
    };

    let context = build
        .get("context")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if !context.is_empty() && !is_valid_remote(&context) {
        let current = Path::new(in_file).parent().unwrap_or_else(|| Path::new(""));

        let resolved = if context == "." {
            current.to_path_buf()
        } else {
            join_clean(current, Path::new(&context))
        };

        build.insert(
            Value::String("context".to_string()),
            Value::String(resolved.to_string_lossy().into_owned()),
        );
    }

    service.insert("build".to_string(), Value::Mapping(build));
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw_service(yaml: &str) -> RawService {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_context_resolves_under_build() {
        let mut service = raw_service("build:\n  context: ./sub\n  dockerfile: Dockerfile.dev\n");
        resolve_context_v2("a/b/compose.yml", &mut service);

        let build = service["build"].as_mapping().unwrap();
        assert_eq!(build["context"].as_str(), Some("a/b/sub"));
        assert_eq!(build["dockerfile"].as_str(), Some("Dockerfile.dev"));
    }

    #[test]
    fn test_string_build_normalizes_to_mapping() {
        let mut service = raw_service("build: .");
        resolve_context_v2("a/b/compose.yml", &mut service);

        let build = service["build"].as_mapping().unwrap();
        assert_eq!(build["context"].as_str(), Some("a/b"));
    }

    #[test]
    fn test_remote_context_untouched() {
        let mut service = raw_service("build: git@github.com:corral-sh/corral.git");
        resolve_context_v2("a/b/compose.yml", &mut service);

        let build = service["build"].as_mapping().unwrap();
        assert_eq!(
            build["context"].as_str(),
            Some("git@github.com:corral-sh/corral.git")
        );
    }

    #[test]
    fn test_env_file_merge_order() {
        use crate::lookup::resource::ResourceLookup;

        struct FakeLookup;

        impl ResourceLookup for FakeLookup {
            fn lookup(&self, path: &str, _relative_to: &str) -> Result<(Vec<u8>, String)> {
                let contents: &[u8] = match path {
                    "a.env" => b"X=1\n",
                    "b.env" => b"# comment\nX=2\nY=3\n",
                    _ => return Err(Error::MissingResourceLookup { file: path.into() }),
                };

                Ok((contents.to_vec(), path.to_string()))
            }
        }

        let services = RawServiceMap::from([(
            "web".to_string(),
            raw_service("image: nginx\nenv_file:\n  - a.env\n  - b.env\n"),
        )]);

        let configs = merge_services_v2(Some(&FakeLookup), "compose.yml", services).unwrap();
        let environment = configs["web"].environment.to_map();

        // last-declared file wins; earlier files never override it
        assert_eq!(environment.get("X"), Some(&"2".to_string()));
        assert_eq!(environment.get("Y"), Some(&"3".to_string()));
    }

    #[test]
    fn test_inline_environment_beats_env_file() {
        use crate::lookup::resource::ResourceLookup;

        struct FakeLookup;

        impl ResourceLookup for FakeLookup {
            fn lookup(&self, _path: &str, _relative_to: &str) -> Result<(Vec<u8>, String)> {
                Ok((b"X=from-file\nZ=9\n".to_vec(), "vars.env".to_string()))
            }
        }

        let services = RawServiceMap::from([(
            "web".to_string(),
            raw_service("image: nginx\nenvironment:\n  X: inline\nenv_file: vars.env\n"),
        )]);

        let configs = merge_services_v2(Some(&FakeLookup), "compose.yml", services).unwrap();
        let environment = configs["web"].environment.to_map();

        assert_eq!(environment.get("X"), Some(&"inline".to_string()));
        assert_eq!(environment.get("Z"), Some(&"9".to_string()));
    }

    #[test]
    fn test_env_file_without_lookup_is_fatal() {
        let services = RawServiceMap::from([(
            "web".to_string(),
            raw_service("image: nginx\nenv_file: vars.env\n"),
        )]);

        let err = merge_services_v2(None, "compose.yml", services).unwrap_err();

        assert!(matches!(err, Error::MissingResourceLookup { .. }));
    }
}
