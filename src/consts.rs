use std::time::Duration;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const RANCHER_URL_ENV: &str = "RANCHER_URL";
pub const RANCHER_ACCESS_KEY_ENV: &str = "RANCHER_ACCESS_KEY";
pub const RANCHER_SECRET_KEY_ENV: &str = "RANCHER_SECRET_KEY";

/// Image assigned to `external_services` blocks when they are folded into the
/// service map.
pub const EXTERNAL_SERVICE_IMAGE: &str = "rancher/external-service";
/// Image assigned to alias blocks carrying a `services` list.
pub const DNS_SERVICE_IMAGE: &str = "rancher/dns-service";

/// Label holding the content hash of the last applied specification.
pub const SERVICE_HASH_LABEL: &str = "io.rancher.service.hash";
pub const SIDEKICK_LABEL: &str = "io.rancher.sidekicks";
pub const SELECTOR_LINK_LABEL: &str = "io.rancher.service.selector.link";
pub const SELECTOR_CONTAINER_LABEL: &str = "io.rancher.service.selector.container";

pub const TRANSITION_POLL_INTERVAL: Duration = Duration::from_millis(150);
