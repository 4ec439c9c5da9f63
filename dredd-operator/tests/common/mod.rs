//! Common test utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use dredd_operator::client::{EventStream, ResourceApi, ResourceEvent};
use dredd_operator::environment::EnvironmentConfig;
use dredd_operator::error::{OperatorError, OperatorResult};
use dredd_operator::platform::PlatformApi;
use dredd_operator::resources::{
    CredentialsSecret, PlatformKind, PlatformResource, PlatformResourceRef, ProjectConfig,
};
use futures::StreamExt;
use kube::Resource;
use kube::core::ErrorResponse;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::marker::PhantomData;
use std::sync::Mutex;
use tokio::sync::broadcast;

pub const NAMESPACE: &str = "mongodb";

pub fn environment() -> EnvironmentConfig {
    EnvironmentConfig::new(NAMESPACE)
}

pub fn project() -> ProjectConfig {
    ProjectConfig {
        project_name: "dredd".to_string(),
        org_id: "org-1".to_string(),
        base_url: "https://ops.example.com".to_string(),
    }
}

pub fn credentials() -> CredentialsSecret {
    CredentialsSecret::new("alice", "k1")
}

pub fn server_error(message: &str) -> OperatorError {
    OperatorError::Downstream(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

/// A call observed by [`FakePlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Exists(PlatformKind),
    Create(PlatformKind),
    Delete(PlatformKind),
}

/// In-memory control plane for the seven platform resources.
#[derive(Default)]
pub struct FakePlatform {
    objects: Mutex<BTreeMap<PlatformResourceRef, PlatformResource>>,
    calls: Mutex<Vec<Call>>,
    fail_create: Mutex<HashSet<PlatformKind>>,
    fail_exists: Mutex<HashSet<PlatformKind>>,
    fail_delete: Mutex<HashSet<PlatformKind>>,
    race_create: Mutex<HashSet<PlatformKind>>,
    vanish_on_delete: Mutex<HashSet<PlatformKind>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a resource as if an earlier run had created it.
    pub fn seed(&self, resource: PlatformResource) {
        self.objects
            .lock()
            .unwrap()
            .insert(resource.reference(), resource);
    }

    /// Make creates of `kind` fail with a server error.
    pub fn fail_create(&self, kind: PlatformKind) {
        self.fail_create.lock().unwrap().insert(kind);
    }

    /// Make probes of `kind` fail with a server error.
    pub fn fail_exists(&self, kind: PlatformKind) {
        self.fail_exists.lock().unwrap().insert(kind);
    }

    /// Make deletes of `kind` fail with a server error.
    pub fn fail_delete(&self, kind: PlatformKind) {
        self.fail_delete.lock().unwrap().insert(kind);
    }

    /// Report `kind` absent on probe but answer creates with a conflict.
    pub fn race_create(&self, kind: PlatformKind) {
        self.race_create.lock().unwrap().insert(kind);
    }

    /// Report `kind` present on probe but answer deletes with not found.
    pub fn vanish_on_delete(&self, kind: PlatformKind) {
        self.vanish_on_delete.lock().unwrap().insert(kind);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created_kinds(&self) -> Vec<PlatformKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_kinds(&self) -> Vec<PlatformKind> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(kind) => Some(kind),
                _ => None,
            })
            .collect()
    }

    pub fn get(&self, target: &PlatformResourceRef) -> Option<PlatformResource> {
        self.objects.lock().unwrap().get(target).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    fn conflict(target: &PlatformResourceRef) -> OperatorError {
        OperatorError::Conflict {
            kind: target.kind.to_string(),
            name: target.name.clone(),
            namespace: target.namespace.clone().unwrap_or_default(),
        }
    }

    fn not_found(target: &PlatformResourceRef) -> OperatorError {
        OperatorError::NotFound {
            kind: target.kind.to_string(),
            name: target.name.clone(),
            namespace: target.namespace.clone().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl PlatformApi for FakePlatform {
    async fn exists(&self, target: &PlatformResourceRef) -> OperatorResult<bool> {
        self.calls.lock().unwrap().push(Call::Exists(target.kind));
        if self.fail_exists.lock().unwrap().contains(&target.kind) {
            return Err(server_error("probe failed"));
        }
        Ok(self.objects.lock().unwrap().contains_key(target))
    }

    async fn create(&self, resource: &PlatformResource) -> OperatorResult<()> {
        let target = resource.reference();
        self.calls.lock().unwrap().push(Call::Create(target.kind));
        if self.fail_create.lock().unwrap().contains(&target.kind) {
            return Err(server_error("create failed"));
        }
        if self.race_create.lock().unwrap().contains(&target.kind) {
            return Err(Self::conflict(&target));
        }

        let mut objects = self.objects.lock().unwrap();
        if objects.contains_key(&target) {
            return Err(Self::conflict(&target));
        }
        objects.insert(target, resource.clone());
        Ok(())
    }

    async fn delete(&self, target: &PlatformResourceRef) -> OperatorResult<()> {
        self.calls.lock().unwrap().push(Call::Delete(target.kind));
        if self.fail_delete.lock().unwrap().contains(&target.kind) {
            return Err(server_error("delete failed"));
        }
        if self.vanish_on_delete.lock().unwrap().contains(&target.kind) {
            self.objects.lock().unwrap().remove(target);
            return Err(Self::not_found(target));
        }
        match self.objects.lock().unwrap().remove(target) {
            Some(_) => Ok(()),
            None => Err(Self::not_found(target)),
        }
    }
}

/// In-memory [`ResourceApi`] that stores objects as JSON.
pub struct InMemoryApi<K> {
    objects: Mutex<BTreeMap<String, Value>>,
    events: broadcast::Sender<(&'static str, Value)>,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Default for InMemoryApi<K> {
    fn default() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            objects: Mutex::new(BTreeMap::new()),
            events,
            _kind: PhantomData,
        }
    }
}

impl<K> InMemoryApi<K>
where
    K: Resource + Serialize + DeserializeOwned,
    K::DynamicType: Default,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    fn kind() -> String {
        K::kind(&K::DynamicType::default()).into_owned()
    }

    fn not_found(name: &str) -> OperatorError {
        OperatorError::NotFound {
            kind: Self::kind(),
            name: name.to_string(),
            namespace: NAMESPACE.to_string(),
        }
    }

    fn emit(&self, event: &'static str, value: &Value) {
        // No receivers is fine.
        let _ = self.events.send((event, value.clone()));
    }
}

fn matches_selector(value: &Value, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    let labels = &value["metadata"]["labels"];
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, expected)) => labels[key].as_str() == Some(expected),
            None => !labels[term].is_null(),
        })
}

fn name_of<K: Resource>(object: &K) -> String {
    object.meta().name.clone().unwrap_or_default()
}

#[async_trait]
impl<K> ResourceApi<K> for InMemoryApi<K>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Default,
{
    async fn create(&self, object: &K) -> OperatorResult<K> {
        let name = name_of(object);
        let value = serde_json::to_value(object)?;
        {
            let mut objects = self.objects.lock().unwrap();
            if objects.contains_key(&name) {
                return Err(OperatorError::Conflict {
                    kind: Self::kind(),
                    name,
                    namespace: NAMESPACE.to_string(),
                });
            }
            objects.insert(name, value.clone());
        }
        self.emit("ADDED", &value);
        Ok(serde_json::from_value(value)?)
    }

    async fn update(&self, name: &str, object: &K) -> OperatorResult<K> {
        let value = serde_json::to_value(object)?;
        {
            let mut objects = self.objects.lock().unwrap();
            let slot = objects.get_mut(name).ok_or_else(|| Self::not_found(name))?;
            *slot = value.clone();
        }
        self.emit("MODIFIED", &value);
        Ok(serde_json::from_value(value)?)
    }

    async fn delete(&self, name: &str) -> OperatorResult<()> {
        let removed = self.objects.lock().unwrap().remove(name);
        match removed {
            Some(value) => {
                self.emit("DELETED", &value);
                Ok(())
            }
            None => Err(Self::not_found(name)),
        }
    }

    async fn get(&self, name: &str) -> OperatorResult<K> {
        let value = self
            .objects
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Self::not_found(name))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn list(&self, selector: Option<&str>) -> OperatorResult<Vec<K>> {
        let values: Vec<Value> = self
            .objects
            .lock()
            .unwrap()
            .values()
            .filter(|v| matches_selector(v, selector))
            .cloned()
            .collect();
        values
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(OperatorError::from))
            .collect()
    }

    async fn watch(&self, selector: Option<&str>) -> OperatorResult<EventStream<K>> {
        let selector = selector.map(str::to_string);
        let receiver = self.events.subscribe();

        let stream = futures::stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .filter_map(move |(event, value)| {
            let keep = matches_selector(&value, selector.as_deref());
            async move {
                if !keep {
                    return None;
                }
                let object: K = match serde_json::from_value(value) {
                    Ok(object) => object,
                    Err(e) => return Some(Err(OperatorError::from(e))),
                };
                Some(Ok(match event {
                    "ADDED" => ResourceEvent::Added(object),
                    "MODIFIED" => ResourceEvent::Modified(object),
                    _ => ResourceEvent::Deleted(object),
                }))
            }
        });

        Ok(stream.boxed())
    }
}
