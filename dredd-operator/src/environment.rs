//! Per-environment names and images for the MongoDB operator platform.
//!
//! Every platform resource except the namespace has a well-known name. Those
//! names live here instead of inline literals so that several environments can
//! be driven from one process.

use crate::resources::{PlatformKind, PlatformResourceRef};

/// Default name shared by the operator's ClusterRole, ServiceAccount,
/// ClusterRoleBinding and Deployment.
pub const DEFAULT_OPERATOR_NAME: &str = "mongodb-enterprise-operator";

/// Default name of the ConfigMap holding the Ops Manager project settings.
pub const DEFAULT_CONFIG_MAP_NAME: &str = "dredd-project";

/// Default name of the Secret holding the Ops Manager API credentials.
pub const DEFAULT_SECRET_NAME: &str = "dredd-om-credentials";

/// Container image settings for the operator Deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorImage {
    /// Operator image.
    pub image: String,
    /// Database image the operator launches for each instance.
    pub database_image: String,
    /// Image pull policy for both images.
    pub pull_policy: String,
    /// Comma separated image pull secret names, may be empty.
    pub pull_secrets: String,
    /// Value of `OPERATOR_ENV`.
    pub operator_env: String,
}

impl Default for OperatorImage {
    fn default() -> Self {
        Self {
            image: "quay.io/mongodb/mongodb-enterprise-operator:0.2".to_string(),
            database_image: "quay.io/mongodb/mongodb-enterprise-database:0.2".to_string(),
            pull_policy: "Always".to_string(),
            pull_secrets: String::new(),
            operator_env: "local".to_string(),
        }
    }
}

/// Names and settings of one operator environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Namespace the operator and its instances live in (caller supplied).
    pub namespace: String,
    /// Name of the ClusterRole, ServiceAccount, ClusterRoleBinding and Deployment.
    pub operator_name: String,
    /// Name of the project ConfigMap.
    pub config_map_name: String,
    /// Name of the credentials Secret.
    pub secret_name: String,
    /// Operator workload images.
    pub image: OperatorImage,
    /// Whether new instances request persistent storage.
    pub persistent_instances: bool,
}

impl EnvironmentConfig {
    /// Create an environment with default names in the given namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            operator_name: DEFAULT_OPERATOR_NAME.to_string(),
            config_map_name: DEFAULT_CONFIG_MAP_NAME.to_string(),
            secret_name: DEFAULT_SECRET_NAME.to_string(),
            image: OperatorImage::default(),
            persistent_instances: false,
        }
    }

    /// Override the ConfigMap name.
    pub fn with_config_map_name(mut self, name: impl Into<String>) -> Self {
        self.config_map_name = name.into();
        self
    }

    /// Override the Secret name.
    pub fn with_secret_name(mut self, name: impl Into<String>) -> Self {
        self.secret_name = name.into();
        self
    }

    /// Name of the platform resource of the given kind in this environment.
    pub fn name_of(&self, kind: PlatformKind) -> &str {
        match kind {
            PlatformKind::Namespace => &self.namespace,
            PlatformKind::ClusterRole
            | PlatformKind::ServiceAccount
            | PlatformKind::ClusterRoleBinding
            | PlatformKind::Deployment => &self.operator_name,
            PlatformKind::ConfigMap => &self.config_map_name,
            PlatformKind::Secret => &self.secret_name,
        }
    }

    /// Identity of the platform resource of the given kind in this environment.
    pub fn reference(&self, kind: PlatformKind) -> PlatformResourceRef {
        let namespace = if kind.is_cluster_scoped() {
            None
        } else {
            Some(self.namespace.clone())
        };
        PlatformResourceRef {
            kind,
            name: self.name_of(kind).to_string(),
            namespace,
        }
    }
}
