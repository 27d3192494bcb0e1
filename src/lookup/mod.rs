pub mod envfile;
pub mod questions;
pub mod resource;

use std::collections::HashMap;

use crate::config::ServiceConfig;

/// A source of `${VAR}` values. `lookup` resolves one key into a
/// `"KEY=value"` pair, `variables` exposes everything the source knows.
pub trait EnvironmentLookup: Send + Sync {
    fn lookup(&self, key: &str, service: Option<&ServiceConfig>) -> Option<String>;

    fn variables(&self) -> HashMap<String, String>;
}

/// Ordered list of lookups. Later entries override earlier ones, both for
/// single-key resolution and for the merged variable map.
#[derive(Default)]
pub struct ComposableEnvLookup {
    pub lookups: Vec<Box<dyn EnvironmentLookup>>,
}

impl ComposableEnvLookup {
    pub fn new(lookups: Vec<Box<dyn EnvironmentLookup>>) -> Self {
        Self { lookups }
    }
}

impl EnvironmentLookup for ComposableEnvLookup {
    fn lookup(&self, key: &str, service: Option<&ServiceConfig>) -> Option<String> {
        let mut result = None;

        for lookup in &self.lookups {
            if let Some(env) = lookup.lookup(key, service) {
                result = Some(env);
            }
        }

        result
    }

    fn variables(&self) -> HashMap<String, String> {
        let mut variables = HashMap::new();

        for lookup in &self.lookups {
            variables.extend(lookup.variables());
        }

        variables
    }
}

/// A variable map with an optional parent; own entries win over the parent.
pub struct CommonLookup {
    variables: HashMap<String, String>,
    parent: Option<Box<dyn EnvironmentLookup>>,
}

impl CommonLookup {
    pub fn new(
        variables: HashMap<String, String>,
        parent: Option<Box<dyn EnvironmentLookup>>,
    ) -> Self {
        Self { variables, parent }
    }
}

impl EnvironmentLookup for CommonLookup {
    fn lookup(&self, key: &str, _service: Option<&ServiceConfig>) -> Option<String> {
        self.variables()
            .get(key)
            .map(|value| format!("{key}={value}"))
    }

    fn variables(&self) -> HashMap<String, String> {
        match &self.parent {
            Some(parent) => {
                let mut variables = parent.variables();
                variables.extend(self.variables.clone());
                variables
            }
            None => self.variables.clone(),
        }
    }
}

/// Plain in-memory variables, mostly used for caller-supplied answers.
pub struct MapEnvLookup {
    pub env: HashMap<String, String>,
}

impl EnvironmentLookup for MapEnvLookup {
    fn lookup(&self, key: &str, _service: Option<&ServiceConfig>) -> Option<String> {
        self.env.get(key).map(|value| format!("{key}={value}"))
    }

    fn variables(&self) -> HashMap<String, String> {
        self.env.clone()
    }
}

/// Lookup backed by the process environment.
pub fn os_env_lookup() -> CommonLookup {
    CommonLookup::new(std::env::vars().collect(), None)
}

#[cfg(test)]
mod test {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_composable_last_hit_wins() {
        let chain = ComposableEnvLookup::new(vec![
            Box::new(MapEnvLookup {
                env: map(&[("A", "first"), ("B", "only")]),
            }),
            Box::new(MapEnvLookup {
                env: map(&[("A", "second")]),
            }),
        ]);

        assert_eq!(chain.lookup("A", None), Some("A=second".to_string()));
        assert_eq!(chain.lookup("B", None), Some("B=only".to_string()));
        assert_eq!(chain.lookup("C", None), None);

        let variables = chain.variables();
        assert_eq!(variables.get("A"), Some(&"second".to_string()));
        assert_eq!(variables.get("B"), Some(&"only".to_string()));
    }

    #[test]
    fn test_common_lookup_own_wins_over_parent() {
        let parent = MapEnvLookup {
            env: map(&[("A", "parent"), ("B", "parent")]),
        };
        let lookup = CommonLookup::new(map(&[("A", "own")]), Some(Box::new(parent)));

        assert_eq!(lookup.lookup("A", None), Some("A=own".to_string()));
        assert_eq!(lookup.lookup("B", None), Some("B=parent".to_string()));
    }
}
