//! Statically declared field metadata for the raw document passes.
//!
//! The normalizer (kind-prefix folding), the value preprocessor (numeric
//! coercion) and structural validation all consult these tables instead of
//! inspecting types at runtime.

/// Shape a declared service field is allowed to take in a raw document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A bare yaml scalar.
    Scalar,
    /// A sequence of scalars.
    List,
    /// A mapping.
    Map,
    /// Either a mapping or a `key=value` list (environment, labels).
    MapOrList,
    /// Either a scalar or a mapping (v2 `build`).
    ScalarOrMap,
    /// Either a scalar or a sequence (command, env_file).
    ScalarOrList,
    /// A nested configuration object.
    Object,
}

pub struct FieldDescriptor {
    /// Field name as it appears in the document.
    pub wire: &'static str,
    pub kind: FieldKind,
    /// Rancher extension blocks declare integer fields the document may carry
    /// as strings; the preprocessor coerces below these fields only.
    pub rancher_object: bool,
}

const fn field(wire: &'static str, kind: FieldKind) -> FieldDescriptor {
    FieldDescriptor {
        wire,
        kind,
        rancher_object: false,
    }
}

const fn rancher_object(wire: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        wire,
        kind: FieldKind::Object,
        rancher_object: true,
    }
}

/// Declared service fields. Anything not listed here is passed through
/// opaquely and never validated or coerced.
pub const SERVICE_FIELDS: &[FieldDescriptor] = &[
    field("image", FieldKind::Scalar),
    field("build", FieldKind::ScalarOrMap),
    field("dockerfile", FieldKind::Scalar),
    field("command", FieldKind::ScalarOrList),
    field("links", FieldKind::List),
    field("external_links", FieldKind::List),
    field("volumes", FieldKind::List),
    field("volumes_from", FieldKind::List),
    field("ports", FieldKind::List),
    field("external_ips", FieldKind::List),
    field("environment", FieldKind::MapOrList),
    field("env_file", FieldKind::ScalarOrList),
    field("labels", FieldKind::MapOrList),
    field("restart", FieldKind::Scalar),
    field("net", FieldKind::Scalar),
    field("network_mode", FieldKind::Scalar),
    field("log_driver", FieldKind::Scalar),
    field("log_opt", FieldKind::Map),
    field("logging", FieldKind::Object),
    field("scale", FieldKind::Scalar),
    field("hostname", FieldKind::Scalar),
    rancher_object("health_check"),
    rancher_object("upgrade_strategy"),
    rancher_object("lb_config"),
    rancher_object("storage_driver"),
    rancher_object("network_driver"),
    rancher_object("metadata"),
];

/// Fields projected under `lb_config` when a `load_balancers` block is folded
/// into the service map.
pub const LB_CONFIG_FIELDS: &[&str] = &[
    "config",
    "certs",
    "default_cert",
    "port_rules",
    "stickiness_policy",
];

/// Fields projected under `storage_driver` for `storage_drivers` blocks.
pub const STORAGE_DRIVER_FIELDS: &[&str] = &[
    "name",
    "description",
    "scope",
    "block_device_path",
    "volume_access_mode",
    "volume_capabilities",
];

/// Fields projected under `network_driver` for `network_drivers` blocks.
pub const NETWORK_DRIVER_FIELDS: &[&str] =
    &["name", "description", "cni_config", "default_network"];

pub fn find(wire: &str) -> Option<&'static FieldDescriptor> {
    SERVICE_FIELDS.iter().find(|descriptor| descriptor.wire == wire)
}

pub fn is_rancher_object(wire: &str) -> bool {
    find(wire).is_some_and(|descriptor| descriptor.rancher_object)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rancher_objects_are_nested() {
        assert!(is_rancher_object("health_check"));
        assert!(is_rancher_object("lb_config"));
        assert!(!is_rancher_object("environment"));
        assert!(!is_rancher_object("unknown_field"));
    }
}
