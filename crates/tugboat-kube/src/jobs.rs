//! Waiting for hook Jobs

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use kube::Client;
use kube::api::Api;
use kube::config::{Config, KubeConfigOptions, Kubeconfig};
use kube::runtime::wait::{await_condition, conditions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::error::{KubeError, Result};

/// Default ceiling for a hook Job to finish before it is deleted anyway
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Blocks until a Job has finished
#[async_trait]
pub trait JobWaiter: Send + Sync {
    async fn wait_for_completion(&self, name: &str, namespace: &str, timeout: Duration)
    -> Result<()>;
}

/// [`JobWaiter`] watching the Job through the Kubernetes API
///
/// The client is created on first use, so building a waiter never requires
/// a reachable cluster. Point it at the same kubeconfig and context as the
/// applier, otherwise Jobs are watched in a different cluster than the one
/// they were created in.
#[derive(Default)]
pub struct KubeJobWaiter {
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
    client: OnceCell<Client>,
}

impl KubeJobWaiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect through an explicit kubeconfig file and/or context
    pub fn with_config(kubeconfig: Option<PathBuf>, context: Option<String>) -> Self {
        Self {
            kubeconfig,
            context,
            client: OnceCell::new(),
        }
    }

    /// Use an existing client
    pub fn with_client(client: Client) -> Self {
        Self {
            client: OnceCell::new_with(Some(client)),
            ..Self::default()
        }
    }

    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubeconfig.as_deref()
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    async fn client(&self) -> std::result::Result<&Client, String> {
        self.client.get_or_try_init(|| self.connect()).await
    }

    async fn connect(&self) -> std::result::Result<Client, String> {
        if self.kubeconfig.is_none() && self.context.is_none() {
            return Client::try_default().await.map_err(|e| e.to_string());
        }

        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..KubeConfigOptions::default()
        };
        let config = match &self.kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                    format!("failed to read kubeconfig {}: {}", path.display(), e)
                })?;
                Config::from_custom_kubeconfig(kubeconfig, &options).await
            }
            None => Config::from_kubeconfig(&options).await,
        }
        .map_err(|e| e.to_string())?;

        Client::try_from(config).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl JobWaiter for KubeJobWaiter {
    async fn wait_for_completion(
        &self,
        name: &str,
        namespace: &str,
        timeout: Duration,
    ) -> Result<()> {
        let client = self.client().await.map_err(|message| KubeError::JobWait {
            name: name.to_string(),
            message: format!("cannot connect to cluster: {}", message),
        })?;
        let jobs: Api<Job> = Api::namespaced(client.clone(), namespace);
        let condition = await_condition(jobs, name, conditions::is_job_completed());

        match tokio::time::timeout(timeout, condition).await {
            Ok(Ok(Some(_))) => Ok(()),
            Ok(Ok(None)) => Err(KubeError::JobWait {
                name: name.to_string(),
                message: "job no longer exists".to_string(),
            }),
            Ok(Err(e)) => Err(KubeError::JobWait {
                name: name.to_string(),
                message: format!("wait condition failed: {}", e),
            }),
            Err(_) => Err(KubeError::JobWait {
                name: name.to_string(),
                message: format!("timed out after {:?}", timeout),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeout_is_thirty_minutes() {
        assert_eq!(DEFAULT_JOB_TIMEOUT.as_secs(), 1800);
    }

    #[test]
    fn test_waiter_builds_without_cluster() {
        let waiter = KubeJobWaiter::new();
        assert!(waiter.client.get().is_none());
        assert!(waiter.kubeconfig().is_none());
    }

    #[test]
    fn test_with_config_keeps_target() {
        let waiter = KubeJobWaiter::with_config(
            Some(PathBuf::from("/etc/tugboat/kubeconfig")),
            Some("staging".to_string()),
        );
        assert_eq!(waiter.kubeconfig(), Some(Path::new("/etc/tugboat/kubeconfig")));
        assert_eq!(waiter.context(), Some("staging"));
        assert!(waiter.client.get().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_kubeconfig_is_job_wait_error() {
        let waiter = KubeJobWaiter::with_config(
            Some(PathBuf::from("/nonexistent/tugboat/kubeconfig")),
            None,
        );
        let err = waiter
            .wait_for_completion("migrate", "prod", Duration::from_secs(1))
            .await
            .unwrap_err();

        match err {
            KubeError::JobWait { name, message } => {
                assert_eq!(name, "migrate");
                assert!(message.contains("/nonexistent/tugboat/kubeconfig"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
