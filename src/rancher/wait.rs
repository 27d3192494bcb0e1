use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use super::client::Platform;
use super::types::{Container, PullTask, Service, Stack};
use crate::consts::TRANSITION_POLL_INTERVAL;
use crate::errors::{Error, Result};

/// A remote resource that can report and refresh its transitioning state.
#[async_trait]
pub trait Transitioning: Sized + Send + Sync {
    fn name(&self) -> String;
    fn transitioning(&self) -> &str;
    fn transitioning_message(&self) -> &str;
    async fn reload(&self, platform: &dyn Platform) -> Result<Self>;
}

/// Poll until the transitioning indicator leaves `"yes"`, reloading on a
/// fixed interval. A reload transport error is terminal for the wait, a
/// `"error"` indicator surfaces the remote message, and exceeding the
/// deadline returns the distinct timeout error instead of blocking forever.
pub async fn wait_for<T: Transitioning>(
    platform: &dyn Platform,
    mut resource: T,
    deadline: Option<Duration>,
) -> Result<T> {
    let started = Instant::now();

    loop {
        match resource.transitioning() {
            "yes" => {}
            "error" => {
                return Err(Error::Transition {
                    name: resource.name(),
                    message: resource.transitioning_message().to_string(),
                })
            }
            _ => return Ok(resource),
        }

        if let Some(deadline) = deadline {
            if started.elapsed() >= deadline {
                return Err(Error::WaitTimeout {
                    name: resource.name(),
                });
            }
        }

        sleep(TRANSITION_POLL_INTERVAL).await;

        resource = resource.reload(platform).await?;
    }
}

#[async_trait]
impl Transitioning for Service {
    fn name(&self) -> String {
        format!("service {}", self.name)
    }

    fn transitioning(&self) -> &str {
        &self.transitioning
    }

    fn transitioning_message(&self) -> &str {
        &self.transitioning_message
    }

    async fn reload(&self, platform: &dyn Platform) -> Result<Self> {
        platform.reload_service(self).await
    }
}

#[async_trait]
impl Transitioning for Container {
    fn name(&self) -> String {
        format!("container {}", self.name)
    }

    fn transitioning(&self) -> &str {
        &self.transitioning
    }

    fn transitioning_message(&self) -> &str {
        &self.transitioning_message
    }

    async fn reload(&self, platform: &dyn Platform) -> Result<Self> {
        platform.reload_container(self).await
    }
}

#[async_trait]
impl Transitioning for Stack {
    fn name(&self) -> String {
        format!("stack {}", self.name)
    }

    fn transitioning(&self) -> &str {
        &self.transitioning
    }

    fn transitioning_message(&self) -> &str {
        &self.transitioning_message
    }

    async fn reload(&self, platform: &dyn Platform) -> Result<Self> {
        platform.reload_stack(self).await
    }
}

#[async_trait]
impl Transitioning for PullTask {
    fn name(&self) -> String {
        format!("pull of {}", self.image)
    }

    fn transitioning(&self) -> &str {
        &self.transitioning
    }

    fn transitioning_message(&self) -> &str {
        &self.transitioning_message
    }

    async fn reload(&self, platform: &dyn Platform) -> Result<Self> {
        platform.reload_pull_task(self).await
    }
}
