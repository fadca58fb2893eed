/// Kubernetes client construction
use kube::config::{InClusterError, KubeConfigOptions, Kubeconfig, KubeconfigError};
use kube::{Client, Config};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while building the Kubernetes client
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("no kubeconfig provided and not running in-cluster")]
    NoCredentials {
        #[source]
        in_cluster: InClusterError,
    },

    #[error("failed to load kubeconfig {}", path.display())]
    Kubeconfig {
        path: PathBuf,
        #[source]
        source: KubeconfigError,
    },

    #[error("failed to create Kubernetes client")]
    Client(#[from] kube::Error),
}

/// Build a client, preferring the in-cluster service account
///
/// Falls back to the kubeconfig file when not running inside a pod. Having
/// neither is an error.
pub async fn connect(
    kubeconfig: Option<&Path>,
    timeout: Duration,
) -> Result<Client, ConnectionError> {
    let mut config = match Config::incluster() {
        Ok(config) => {
            info!("Using in-cluster configuration");
            config
        }
        Err(in_cluster) => {
            debug!("In-cluster configuration unavailable: {}", in_cluster);
            match kubeconfig {
                Some(path) => config_from_file(path).await?,
                None => return Err(ConnectionError::NoCredentials { in_cluster }),
            }
        }
    };

    config.read_timeout = Some(timeout);

    Ok(Client::try_from(config)?)
}

/// Load client configuration from a kubeconfig file, using its current context
pub async fn config_from_file(path: &Path) -> Result<Config, ConnectionError> {
    info!("Using kubeconfig {}", path.display());

    let to_error = |source: KubeconfigError| ConnectionError::Kubeconfig {
        path: path.to_path_buf(),
        source,
    };
    let kubeconfig = Kubeconfig::read_from(path).map_err(to_error)?;
    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(to_error)
}
