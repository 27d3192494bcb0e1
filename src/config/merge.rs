use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::config::ServiceConfig;
use crate::errors::Result;

/// Field identifiers whose values are replaced wholesale instead of deep
/// merged. Link semantics are positional, unioning them is unsound.
pub const DEFAULT_NO_MERGE: &[&str] = &["links", "volumes_from"];

#[derive(Debug, Clone, Copy)]
pub struct MergeRules<'a> {
    pub no_merge: &'a [&'a str],
}

impl Default for MergeRules<'static> {
    fn default() -> Self {
        Self {
            no_merge: DEFAULT_NO_MERGE,
        }
    }
}

/// Merge a newly parsed service set onto a previously resolved one. Services
/// present on only one side pass through unchanged.
pub fn merge_services(
    existing: &BTreeMap<String, ServiceConfig>,
    new: BTreeMap<String, ServiceConfig>,
    rules: MergeRules,
) -> Result<BTreeMap<String, ServiceConfig>> {
    let mut merged = existing.clone();

    for (name, service) in new {
        let service = match existing.get(&name) {
            Some(base) => merge_service(base, &service, rules)?,
            None => service,
        };

        merged.insert(name, service);
    }

    Ok(merged)
}

/// Field-by-field merge of one service, done on the raw tree so unknown
/// fields take part as well.
pub fn merge_service(
    base: &ServiceConfig,
    new: &ServiceConfig,
    rules: MergeRules,
) -> Result<ServiceConfig> {
    let base = as_mapping(serde_yaml::to_value(base)?);
    let new = as_mapping(serde_yaml::to_value(new)?);

    let merged = merge_raw_service(base, new, rules);

    Ok(serde_yaml::from_value(Value::Mapping(merged))?)
}

pub fn merge_raw_service(mut base: Mapping, new: Mapping, rules: MergeRules) -> Mapping {
    for (key, value) in new {
        // image and build are mutually exclusive in merge
        if key.as_str() == Some("image") {
            base.remove("build");
        } else if key.as_str() == Some("build") {
            base.remove("image");
        }

        let no_merge = key
            .as_str()
            .is_some_and(|name| rules.no_merge.contains(&name));

        if no_merge {
            base.insert(key, value);
            continue;
        }

        match base.remove(&key) {
            Some(existing) => base.insert(key, merge_value(existing, value)),
            None => base.insert(key, value),
        };
    }

    base
}

/// Maps merge key-by-key recursively, lists extend with entries not already
/// present, scalars are replaced by the new value.
fn merge_value(existing: Value, new: Value) -> Value {
    match (existing, new) {
        (Value::Mapping(mut base), Value::Mapping(new)) => {
            for (key, value) in new {
                match base.remove(&key) {
                    Some(existing) => base.insert(key, merge_value(existing, value)),
                    None => base.insert(key, value),
                };
            }

            Value::Mapping(base)
        }

        (Value::Sequence(mut base), Value::Sequence(new)) => {
            for item in new {
                if !base.contains(&item) {
                    base.push(item);
                }
            }

            Value::Sequence(base)
        }

        (_, new) => new,
    }
}

fn as_mapping(value: Value) -> Mapping {
    match value {
        Value::Mapping(mapping) => mapping,
        _ => Mapping::new(),
    }
}
