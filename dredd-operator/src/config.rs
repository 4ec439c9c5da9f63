//! Application configuration from YAML.
//!
//! ```yaml
//! kubernetes:
//!   namespace: mongodb
//!   kubeconfig: /home/me/.kube/config
//! ops_manager:
//!   org_id: 5b8d...
//!   base_url: https://cloud.mongodb.com
//!   api_user: alice
//!   api_password: k1
//!   project: dredd
//! logger: DEV
//! ```

use crate::environment::{DEFAULT_CONFIG_MAP_NAME, DEFAULT_SECRET_NAME, EnvironmentConfig};
use crate::error::{OperatorError, OperatorResult};
use crate::resources::{CredentialsSecret, ProjectConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cluster connection and resource names.
    pub kubernetes: KubernetesSettings,

    /// Ops Manager project and API credentials.
    #[serde(default)]
    pub ops_manager: OpsManagerSettings,

    /// `PROD` for JSON logs, `DEV` for pretty logs.
    #[serde(default = "default_logger")]
    pub logger: String,

    /// Bind address of the REST front-end.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
}

/// `kubernetes` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesSettings {
    /// Namespace of the operator environment.
    #[serde(default)]
    pub namespace: String,

    /// Kubeconfig path; in-cluster identity when absent.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    /// Name of the project ConfigMap.
    #[serde(default = "default_config_map_name")]
    pub config_map_name: String,

    /// Name of the credentials Secret.
    #[serde(default = "default_secret_name")]
    pub secret_name: String,

    /// Request persistent storage for new instances.
    #[serde(default)]
    pub persistent: bool,
}

/// `ops_manager` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpsManagerSettings {
    /// Organization id.
    #[serde(default)]
    pub org_id: String,

    /// Ops Manager base URL.
    #[serde(default)]
    pub base_url: String,

    /// API user.
    #[serde(default)]
    pub api_user: String,

    /// API key of the user.
    #[serde(default)]
    pub api_password: String,

    /// Project name.
    #[serde(default)]
    pub project: String,
}

fn default_logger() -> String {
    "PROD".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_config_map_name() -> String {
    DEFAULT_CONFIG_MAP_NAME.to_string()
}

fn default_secret_name() -> String {
    DEFAULT_SECRET_NAME.to_string()
}

impl AppConfig {
    /// Read and validate a configuration file.
    pub fn load(path: &Path) -> OperatorResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OperatorError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate configuration text.
    pub fn parse(raw: &str) -> OperatorResult<Self> {
        let config: AppConfig = serde_yaml::from_str(raw)
            .map_err(|e| OperatorError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> OperatorResult<()> {
        if self.kubernetes.namespace.trim().is_empty() {
            return Err(OperatorError::InvalidConfig(
                "kubernetes.namespace is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Kubeconfig path, `None` (in-cluster identity) when unset or empty.
    pub fn kubeconfig(&self) -> Option<&Path> {
        self.kubernetes
            .kubeconfig
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Environment names derived from the `kubernetes` section.
    pub fn environment(&self) -> EnvironmentConfig {
        let mut env = EnvironmentConfig::new(&self.kubernetes.namespace)
            .with_config_map_name(&self.kubernetes.config_map_name)
            .with_secret_name(&self.kubernetes.secret_name);
        env.persistent_instances = self.kubernetes.persistent;
        env
    }

    /// Project settings for the ConfigMap.
    pub fn project(&self) -> OperatorResult<ProjectConfig> {
        let om = &self.ops_manager;
        require(&om.project, "ops_manager.project")?;
        require(&om.base_url, "ops_manager.base_url")?;
        Ok(ProjectConfig {
            project_name: om.project.clone(),
            org_id: om.org_id.clone(),
            base_url: om.base_url.clone(),
        })
    }

    /// API credentials for the Secret.
    pub fn credentials(&self) -> OperatorResult<CredentialsSecret> {
        let om = &self.ops_manager;
        require(&om.api_user, "ops_manager.api_user")?;
        require(&om.api_password, "ops_manager.api_password")?;
        Ok(CredentialsSecret::new(&om.api_user, &om.api_password))
    }
}

fn require(value: &str, key: &str) -> OperatorResult<()> {
    if value.trim().is_empty() {
        return Err(OperatorError::InvalidConfig(format!("{key} is required")));
    }
    Ok(())
}
