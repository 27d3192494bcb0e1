use std::sync::Arc;

use anyhow::{Context, Result};

use crate::consts::{RANCHER_ACCESS_KEY_ENV, RANCHER_SECRET_KEY_ENV, RANCHER_URL_ENV};
use crate::rancher::RancherClient;

#[derive(Clone)]
pub struct State {
    pub platform: Arc<RancherClient>,
}

pub struct StateOptions {
    pub override_url: Option<String>,
    pub override_access_key: Option<String>,
    pub override_secret_key: Option<String>,
}

impl State {
    pub fn new(options: StateOptions) -> Result<Self> {
        let url = options
            .override_url
            .or_else(|| std::env::var(RANCHER_URL_ENV).ok())
            .with_context(|| format!("{RANCHER_URL_ENV} is not set"))?;

        let access_key = options
            .override_access_key
            .or_else(|| std::env::var(RANCHER_ACCESS_KEY_ENV).ok())
            .unwrap_or_default();

        let secret_key = options
            .override_secret_key
            .or_else(|| std::env::var(RANCHER_SECRET_KEY_ENV).ok())
            .unwrap_or_default();

        Ok(Self {
            platform: Arc::new(RancherClient::new(url, access_key, secret_key)?),
        })
    }
}
