//! Existence probe and create/delete operations for platform resources.
//!
//! [`PlatformApi`] is the seam between the provisioning state machine and the
//! cluster. [`KubePlatformApi`] implements it with typed `kube::Api` handles,
//! one per resource kind.

use crate::error::{OperatorError, OperatorResult};
use crate::resources::{PlatformKind, PlatformResource, PlatformResourceRef};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use kube::api::{DeleteParams, PostParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Operations the provisioner needs from the control plane.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Whether the resource exists. Absence is `Ok(false)`, not an error.
    async fn exists(&self, target: &PlatformResourceRef) -> OperatorResult<bool>;

    /// Create the resource. Fails with [`OperatorError::Conflict`] if it exists.
    async fn create(&self, resource: &PlatformResource) -> OperatorResult<()>;

    /// Delete the resource. Fails with [`OperatorError::NotFound`] if absent.
    async fn delete(&self, target: &PlatformResourceRef) -> OperatorResult<()>;
}

/// [`PlatformApi`] backed by a Kubernetes client.
#[derive(Clone)]
pub struct KubePlatformApi {
    client: Client,
}

impl KubePlatformApi {
    /// Create a platform API over the given client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, target: &PlatformResourceRef) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(
            self.client.clone(),
            target.namespace.as_deref().unwrap_or("default"),
        )
    }

    fn cluster<K>(&self) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::ClusterResourceScope>,
        K::DynamicType: Default,
    {
        Api::all(self.client.clone())
    }
}

#[async_trait]
impl PlatformApi for KubePlatformApi {
    async fn exists(&self, target: &PlatformResourceRef) -> OperatorResult<bool> {
        match target.kind {
            PlatformKind::Namespace => probe::<Namespace>(self.cluster(), target).await,
            PlatformKind::ClusterRole => probe::<ClusterRole>(self.cluster(), target).await,
            PlatformKind::ClusterRoleBinding => {
                probe::<ClusterRoleBinding>(self.cluster(), target).await
            }
            PlatformKind::ServiceAccount => {
                probe::<ServiceAccount>(self.namespaced(target), target).await
            }
            PlatformKind::ConfigMap => probe::<ConfigMap>(self.namespaced(target), target).await,
            PlatformKind::Secret => probe::<Secret>(self.namespaced(target), target).await,
            PlatformKind::Deployment => {
                probe::<Deployment>(self.namespaced(target), target).await
            }
        }
    }

    async fn create(&self, resource: &PlatformResource) -> OperatorResult<()> {
        let target = resource.reference();
        match resource {
            PlatformResource::Namespace(body) => create_in(self.cluster(), &target, body).await,
            PlatformResource::ClusterRole(body) => create_in(self.cluster(), &target, body).await,
            PlatformResource::ClusterRoleBinding(body) => {
                create_in(self.cluster(), &target, body).await
            }
            PlatformResource::ServiceAccount(body) => {
                create_in(self.namespaced(&target), &target, body).await
            }
            PlatformResource::ConfigMap(body) => {
                create_in(self.namespaced(&target), &target, body).await
            }
            PlatformResource::Secret(body) => {
                create_in(self.namespaced(&target), &target, body).await
            }
            PlatformResource::Deployment(body) => {
                create_in(self.namespaced(&target), &target, body).await
            }
        }
    }

    async fn delete(&self, target: &PlatformResourceRef) -> OperatorResult<()> {
        match target.kind {
            PlatformKind::Namespace => delete_in::<Namespace>(self.cluster(), target).await,
            PlatformKind::ClusterRole => delete_in::<ClusterRole>(self.cluster(), target).await,
            PlatformKind::ClusterRoleBinding => {
                delete_in::<ClusterRoleBinding>(self.cluster(), target).await
            }
            PlatformKind::ServiceAccount => {
                delete_in::<ServiceAccount>(self.namespaced(target), target).await
            }
            PlatformKind::ConfigMap => {
                delete_in::<ConfigMap>(self.namespaced(target), target).await
            }
            PlatformKind::Secret => delete_in::<Secret>(self.namespaced(target), target).await,
            PlatformKind::Deployment => {
                delete_in::<Deployment>(self.namespaced(target), target).await
            }
        }
    }
}

async fn probe<K>(api: Api<K>, target: &PlatformResourceRef) -> OperatorResult<bool>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.get(&target.name).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(false),
        Err(e) => Err(OperatorError::Downstream(e)),
    }
}

async fn create_in<K>(api: Api<K>, target: &PlatformResourceRef, body: &K) -> OperatorResult<()>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    api.create(&PostParams::default(), body)
        .await
        .map(|_| ())
        .map_err(|e| {
            OperatorError::from_kube(
                e,
                target.kind.as_str(),
                &target.name,
                target.namespace.as_deref(),
            )
        })
}

async fn delete_in<K>(api: Api<K>, target: &PlatformResourceRef) -> OperatorResult<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.delete(&target.name, &DeleteParams::default())
        .await
        .map(|_| ())
        .map_err(|e| {
            OperatorError::from_kube(
                e,
                target.kind.as_str(),
                &target.name,
                target.namespace.as_deref(),
            )
        })
}
