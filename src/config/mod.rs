/// Configuration management for workloadctl
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::utils::RetryConfig;

/// Namespace used when neither the command line nor the config file names one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Main tool configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Namespace for pods and deployments
    pub namespace: String,

    /// Kubeconfig file used when not running in-cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Read timeout for API requests, in seconds
    pub request_timeout_secs: u64,

    /// Retry policy for conflicting updates
    pub retry: RetryConfig,

    /// Shape of newly created deployments
    pub deployment: DeploymentDefaults,
}

/// Template values for newly created deployments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentDefaults {
    /// Name of the single container
    pub container_name: String,

    /// Name of the exposed container port
    pub port_name: String,

    /// Exposed container port
    pub container_port: i32,

    /// Label key used for the selector and pod template (value is the deployment name)
    pub app_label: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            kubeconfig: None,
            request_timeout_secs: 30,
            retry: RetryConfig::default(),
            deployment: DeploymentDefaults::default(),
        }
    }
}

impl Default for DeploymentDefaults {
    fn default() -> Self {
        Self {
            container_name: "web".to_string(),
            port_name: "http".to_string(),
            container_port: 80,
            app_label: "app".to_string(),
        }
    }
}

impl ToolConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ToolConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config file if one was given, defaults otherwise
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line overrides on top of the file values
    pub fn with_overrides(
        mut self,
        namespace: Option<String>,
        kubeconfig: Option<PathBuf>,
    ) -> Self {
        if let Some(namespace) = namespace {
            self.namespace = namespace;
        }
        if kubeconfig.is_some() {
            self.kubeconfig = kubeconfig;
        }
        self
    }

    /// Kubeconfig path with a leading `~` expanded to the home directory
    pub fn kubeconfig_path(&self) -> Option<PathBuf> {
        let path = self.kubeconfig.as_ref()?;
        match (path.strip_prefix("~"), std::env::var_os("HOME")) {
            (Ok(rest), Some(home)) => Some(PathBuf::from(home).join(rest)),
            _ => Some(path.clone()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.namespace.is_empty() {
            anyhow::bail!("namespace cannot be empty");
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be at least 1");
        }

        self.retry.validate()?;

        if self.deployment.container_name.is_empty() {
            anyhow::bail!("deployment.container_name cannot be empty");
        }
        if !(1..=65535).contains(&self.deployment.container_port) {
            anyhow::bail!(
                "deployment.container_port must be between 1 and 65535, got {}",
                self.deployment.container_port
            );
        }

        Ok(())
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            kubeconfig: Some(PathBuf::from("~/.kube/config")),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_validation() {
        let mut config = ToolConfig::example();
        assert!(config.validate().is_ok());

        config.namespace = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_port_validation() {
        let mut config = ToolConfig::default();
        config.deployment.container_port = 0;
        assert!(config.validate().is_err());

        config.deployment.container_port = 8080;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "namespace: staging\nretry:\n  max_attempts: 8").unwrap();

        let config = ToolConfig::from_file(file.path()).unwrap();

        assert_eq!(config.namespace, "staging");
        assert_eq!(config.retry.max_attempts, 8);
        assert_eq!(config.retry.initial_delay_ms, 10);
        assert_eq!(config.deployment, DeploymentDefaults::default());
        assert_eq!(config.kubeconfig, None);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "retry:\n  max_attempts: 0").unwrap();

        assert!(ToolConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_example_round_trips() {
        let yaml = serde_yaml::to_string(&ToolConfig::example()).unwrap();
        let parsed: ToolConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, ToolConfig::example());
    }

    #[test]
    fn test_kubeconfig_tilde_expansion() {
        let config = ToolConfig {
            kubeconfig: Some(PathBuf::from("/etc/kubeconfig")),
            ..ToolConfig::default()
        };
        assert_eq!(
            config.kubeconfig_path(),
            Some(PathBuf::from("/etc/kubeconfig"))
        );

        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(
                ToolConfig::example().kubeconfig_path(),
                Some(PathBuf::from(home).join(".kube/config"))
            );
        }

        assert_eq!(ToolConfig::default().kubeconfig_path(), None);
    }

    #[test]
    fn test_overrides_win_over_file() {
        let config = ToolConfig::example().with_overrides(
            Some("kube-system".to_string()),
            Some(PathBuf::from("/tmp/kubeconfig")),
        );
        assert_eq!(config.namespace, "kube-system");
        assert_eq!(config.kubeconfig, Some(PathBuf::from("/tmp/kubeconfig")));

        let config = ToolConfig::example().with_overrides(None, None);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.kubeconfig, Some(PathBuf::from("~/.kube/config")));
    }
}
