use std::collections::BTreeMap;
use std::time::Duration;

/// Caller intent for one apply pass.
#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Pull referenced images before upgrading.
    pub pull: bool,
    /// Allow upgrading an active service whose hash drifted.
    pub upgrade: bool,
    /// Recreate even when the remote side matches.
    pub force_upgrade: bool,
    /// Finish an upgrade once the remote side reports it.
    pub confirm_upgrade: bool,
    /// Roll services back instead of converging forward.
    pub rollback: bool,
    /// Caller-supplied overrides merged into the upgrade payload.
    pub args: BTreeMap<String, serde_json::Value>,
    /// Bound every wait on remote transitions; unbounded when unset.
    pub wait_timeout: Option<Duration>,
}
