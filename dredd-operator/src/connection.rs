//! Connection to the Kubernetes control plane.

use crate::client::CustomResourceClient;
use crate::error::{OperatorError, OperatorResult};
use crate::platform::KubePlatformApi;
use k8s_openapi::NamespaceResourceScope;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config, Resource};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::path::Path;

/// An authenticated, verified handle to the control plane.
///
/// Typed handles created from it share one underlying `kube::Client`.
#[derive(Clone)]
pub struct ControlPlaneConnection {
    client: Client,
    server_version: String,
}

impl ControlPlaneConnection {
    /// Connect using the in-cluster identity, or the kubeconfig at `kubeconfig`
    /// when given.
    pub async fn connect(kubeconfig: Option<&Path>) -> OperatorResult<Self> {
        let config = match kubeconfig {
            None => Config::incluster().map_err(|e| {
                OperatorError::Connection(format!("in-cluster configuration unavailable: {e}"))
            })?,
            Some(path) => {
                let raw = Kubeconfig::read_from(path).map_err(|e| {
                    OperatorError::Connection(format!(
                        "failed to read kubeconfig {}: {e}",
                        path.display()
                    ))
                })?;
                Config::from_custom_kubeconfig(raw, &KubeConfigOptions::default())
                    .await
                    .map_err(|e| {
                        OperatorError::Connection(format!(
                            "invalid kubeconfig {}: {e}",
                            path.display()
                        ))
                    })?
            }
        };

        Self::from_config(config).await
    }

    /// Connect with an already resolved client configuration.
    pub async fn from_config(config: Config) -> OperatorResult<Self> {
        let cluster_url = config.cluster_url.to_string();
        let client = Client::try_from(config)
            .map_err(|e| OperatorError::Connection(format!("failed to build client: {e}")))?;

        let info = client.apiserver_version().await.map_err(|e| {
            OperatorError::Connection(format!("control plane {cluster_url} unreachable: {e}"))
        })?;

        tracing::info!(
            cluster = %cluster_url,
            version = %info.git_version,
            "Connected to Kubernetes cluster"
        );

        Ok(Self {
            client,
            server_version: info.git_version,
        })
    }

    /// The underlying client.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// API server version reported when connecting.
    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// Platform operations used by the provisioner.
    pub fn platform(&self) -> KubePlatformApi {
        KubePlatformApi::new(self.client.clone())
    }

    /// A typed client for `K` in `namespace`.
    pub fn resources<K>(&self, namespace: &str) -> CustomResourceClient<K>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        CustomResourceClient::new(self.client.clone(), namespace)
    }
}
