use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::client::Platform;
use super::types::Stack;
use crate::config::Config;
use crate::project::Options;

/// Shared state for one resolve-and-apply cycle: the platform handle, the
/// target stack, the resolved config and the caller's options.
pub struct Context {
    pub platform: Arc<dyn Platform>,
    pub stack: Stack,
    pub project_name: String,
    pub config: Config,
    pub options: Options,
    locks: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl Context {
    pub fn new(
        platform: Arc<dyn Platform>,
        stack: Stack,
        project_name: String,
        config: Config,
        options: Options,
    ) -> Self {
        Self {
            platform,
            stack,
            project_name,
            config,
            options,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Serialize reconciliation per (stack, name). Two concurrent passes over
    /// the same resource queue up here; different names never contend.
    pub async fn lock(&self, stack_id: &str, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;

            locks
                .entry((stack_id.to_string(), name.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        lock.lock_owned().await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rancher::client::RancherClient;
    use std::time::Duration;

    fn context() -> Arc<Context> {
        let client = RancherClient::new(
            "http://localhost:8080/v2-beta".to_string(),
            String::new(),
            String::new(),
        )
        .unwrap();

        Arc::new(Context::new(
            Arc::new(client),
            Stack::default(),
            "test".to_string(),
            Config::default(),
            Options::default(),
        ))
    }

    #[tokio::test]
    async fn test_same_key_serializes() {
        let context = context();

        let guard = context.lock("1st1", "web").await;

        let contender = {
            let context = context.clone();
            tokio::spawn(async move {
                let _guard = context.lock("1st1", "web").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("lock should be released")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_contend() {
        let context = context();

        let _guard = context.lock("1st1", "web").await;
        let _other = tokio::time::timeout(Duration::from_millis(100), context.lock("1st1", "db"))
            .await
            .expect("different keys must not block");
    }
}
