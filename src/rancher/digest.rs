use sha2::{Digest, Sha256};

use super::types::{Container, LaunchConfig, Service};
use crate::consts::SERVICE_HASH_LABEL;
use crate::errors::Result;

/// Digest of a desired service specification. Server-assigned and volatile
/// fields (id, state, scale, the hash label itself) stay out so the value is
/// stable across reconciliation passes.
pub fn service_hash(service: &Service) -> Result<String> {
    let mut source = service.clone();

    source.id = String::new();
    source.state = String::new();
    source.transitioning = String::new();
    source.transitioning_message = String::new();
    source.scale = None;
    source.actions.clear();
    source.links.clear();

    if let Some(launch_config) = &mut source.launch_config {
        launch_config.labels.remove(SERVICE_HASH_LABEL);
    }
    for launch_config in &mut source.secondary_launch_configs {
        launch_config.labels.remove(SERVICE_HASH_LABEL);
    }

    digest(&serde_json::to_vec(&source)?)
}

/// Digest of a desired container's launch specification.
pub fn launch_config_hash(launch_config: &LaunchConfig) -> Result<String> {
    let mut source = launch_config.clone();

    source.labels.remove(SERVICE_HASH_LABEL);

    digest(&serde_json::to_vec(&source)?)
}

pub fn container_hash(container: &Container) -> Result<String> {
    let mut source = container.clone();

    source.id = String::new();
    source.state = String::new();
    source.transitioning = String::new();
    source.transitioning_message = String::new();
    source.actions.clear();
    source.links.clear();
    source.launch_config.labels.remove(SERVICE_HASH_LABEL);

    digest(&serde_json::to_vec(&source)?)
}

fn digest(bytes: &[u8]) -> Result<String> {
    Ok(hex::encode(Sha256::digest(bytes)))
}
