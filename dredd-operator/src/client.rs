//! Generic namespaced client for one resource kind.
//!
//! [`CustomResourceClient`] is written for the [`crate::crd::MongoDb`] custom
//! resource but works for any namespaced kind that implements
//! [`kube::Resource`], which is how the REST front-end serves ConfigMaps and
//! Secrets through the same code path.

use crate::error::{OperatorError, OperatorResult};
use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{DeleteParams, ListParams, PostParams, WatchEvent, WatchParams};
use kube::{Api, Client, Resource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// A change observed on a watched resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent<K> {
    /// The object was created (or existed when the watch started).
    Added(K),
    /// The object was changed.
    Modified(K),
    /// The object was deleted.
    Deleted(K),
}

impl<K> ResourceEvent<K> {
    /// The object carried by this event.
    pub fn object(&self) -> &K {
        match self {
            ResourceEvent::Added(obj) | ResourceEvent::Modified(obj) | ResourceEvent::Deleted(obj) => {
                obj
            }
        }
    }
}

/// Stream of watch events. Ends when the underlying connection drops.
pub type EventStream<K> = BoxStream<'static, OperatorResult<ResourceEvent<K>>>;

/// CRUD, list and watch over one namespaced resource kind.
#[async_trait]
pub trait ResourceApi<K>: Send + Sync
where
    K: Clone + Send + Sync + 'static,
{
    /// Create a new object. Fails with [`OperatorError::Conflict`] if the name is taken.
    async fn create(&self, object: &K) -> OperatorResult<K>;

    /// Replace the whole object. Fails with [`OperatorError::NotFound`] if absent.
    async fn update(&self, name: &str, object: &K) -> OperatorResult<K>;

    /// Delete an object. Fails with [`OperatorError::NotFound`] if absent.
    async fn delete(&self, name: &str) -> OperatorResult<()>;

    /// Fetch an object. Fails with [`OperatorError::NotFound`] if absent.
    async fn get(&self, name: &str) -> OperatorResult<K>;

    /// List objects matching an optional label selector, in control-plane order.
    async fn list(&self, selector: Option<&str>) -> OperatorResult<Vec<K>>;

    /// Watch objects matching an optional label selector.
    ///
    /// The stream is never resumed after a disconnect; callers reconnect.
    async fn watch(&self, selector: Option<&str>) -> OperatorResult<EventStream<K>>;
}

/// [`ResourceApi`] backed by a namespaced `kube::Api`.
#[derive(Clone)]
pub struct CustomResourceClient<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
{
    api: Api<K>,
    namespace: String,
}

impl<K> CustomResourceClient<K>
where
    K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    K::DynamicType: Default,
{
    /// Create a client for `K` in the given namespace.
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
        }
    }

    /// Namespace this client is scoped to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn kind() -> String {
        K::kind(&K::DynamicType::default()).into_owned()
    }

    fn map_err(&self, err: kube::Error, name: &str) -> OperatorError {
        OperatorError::from_kube(err, &Self::kind(), name, Some(&self.namespace))
    }
}

#[async_trait]
impl<K> ResourceApi<K> for CustomResourceClient<K>
where
    K: Resource<Scope = NamespaceResourceScope>
        + Clone
        + Serialize
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static,
    K::DynamicType: Default,
{
    async fn create(&self, object: &K) -> OperatorResult<K> {
        let name = object.meta().name.clone().unwrap_or_default();
        tracing::debug!(kind = %Self::kind(), name = %name, namespace = %self.namespace, "Creating object");
        self.api
            .create(&PostParams::default(), object)
            .await
            .map_err(|e| self.map_err(e, &name))
    }

    async fn update(&self, name: &str, object: &K) -> OperatorResult<K> {
        tracing::debug!(kind = %Self::kind(), name = %name, namespace = %self.namespace, "Replacing object");
        self.api
            .replace(name, &PostParams::default(), object)
            .await
            .map_err(|e| self.map_err(e, name))
    }

    async fn delete(&self, name: &str) -> OperatorResult<()> {
        tracing::debug!(kind = %Self::kind(), name = %name, namespace = %self.namespace, "Deleting object");
        self.api
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| self.map_err(e, name))
    }

    async fn get(&self, name: &str) -> OperatorResult<K> {
        self.api.get(name).await.map_err(|e| self.map_err(e, name))
    }

    async fn list(&self, selector: Option<&str>) -> OperatorResult<Vec<K>> {
        let mut params = ListParams::default();
        if let Some(selector) = selector {
            params = params.labels(selector);
        }
        let list = self.api.list(&params).await?;
        Ok(list.items)
    }

    async fn watch(&self, selector: Option<&str>) -> OperatorResult<EventStream<K>> {
        let mut params = WatchParams::default();
        if let Some(selector) = selector {
            params = params.labels(selector);
        }

        let kind = Self::kind();
        let stream = self.api.watch(&params, "0").await?;
        tracing::debug!(kind = %kind, namespace = %self.namespace, "Watch stream opened");

        Ok(stream
            .filter_map(move |event| {
                let mapped = match event {
                    Ok(WatchEvent::Added(obj)) => Some(Ok(ResourceEvent::Added(obj))),
                    Ok(WatchEvent::Modified(obj)) => Some(Ok(ResourceEvent::Modified(obj))),
                    Ok(WatchEvent::Deleted(obj)) => Some(Ok(ResourceEvent::Deleted(obj))),
                    Ok(WatchEvent::Bookmark(_)) => None,
                    Ok(WatchEvent::Error(resp)) => {
                        tracing::warn!(kind = %kind, code = resp.code, message = %resp.message, "Watch error event");
                        Some(Err(OperatorError::Downstream(kube::Error::Api(resp))))
                    }
                    Err(e) => Some(Err(OperatorError::Downstream(e))),
                };
                futures::future::ready(mapped)
            })
            .boxed())
    }
}
