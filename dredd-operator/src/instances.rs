//! Lifecycle of managed MongoDB instances.
//!
//! [`ManagedInstanceFacade`] builds `MongoDB` objects for the three topologies
//! and hands them to a [`ResourceApi`]. Every instance references the
//! environment's credentials Secret and project ConfigMap by name.

use crate::client::{EventStream, ResourceApi};
use crate::crd::{MongoDb, MongoDbSpec, ShardedTopology, Topology};
use crate::environment::EnvironmentConfig;
use crate::error::OperatorResult;
use crate::resources::{MANAGED_BY_LABEL, MANAGED_BY_VALUE, ResourceBuilder};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Span;

/// Request for one managed instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRequest {
    /// Instance name.
    pub name: String,
    /// MongoDB server version.
    pub version: String,
    /// Deployment topology.
    pub topology: Topology,
}

impl InstanceRequest {
    /// Create a request.
    pub fn new(name: impl Into<String>, version: impl Into<String>, topology: Topology) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            topology,
        }
    }
}

impl ResourceBuilder for InstanceRequest {
    type Output = MongoDb;

    fn build(&self, env: &EnvironmentConfig) -> OperatorResult<MongoDb> {
        let mut spec = MongoDbSpec::new(
            self.topology,
            &self.version,
            &env.secret_name,
            &env.config_map_name,
        );
        spec.persistent = env.persistent_instances;

        let mut instance = MongoDb::new(&self.name, spec);
        instance.metadata.namespace = Some(env.namespace.clone());
        instance.metadata.labels = Some(BTreeMap::from([(
            MANAGED_BY_LABEL.to_string(),
            MANAGED_BY_VALUE.to_string(),
        )]));
        Ok(instance)
    }
}

/// Convenience layer over a `MongoDB` resource client.
pub struct ManagedInstanceFacade<C: ResourceApi<MongoDb> + ?Sized> {
    client: Arc<C>,
    env: Arc<EnvironmentConfig>,
    span: Span,
}

impl<C: ResourceApi<MongoDb> + ?Sized> ManagedInstanceFacade<C> {
    /// Create a facade that logs under `span`.
    pub fn new(client: Arc<C>, env: Arc<EnvironmentConfig>, span: Span) -> Self {
        Self { client, env, span }
    }

    /// Build a standalone instance.
    pub fn standalone(&self, name: &str, version: &str) -> OperatorResult<MongoDb> {
        InstanceRequest::new(name, version, Topology::Standalone).build(&self.env)
    }

    /// Build a replica set.
    pub fn replica_set(&self, name: &str, version: &str, members: i32) -> OperatorResult<MongoDb> {
        InstanceRequest::new(name, version, Topology::ReplicaSet { members }).build(&self.env)
    }

    /// Build a sharded cluster.
    pub fn sharded_cluster(
        &self,
        name: &str,
        version: &str,
        topology: ShardedTopology,
    ) -> OperatorResult<MongoDb> {
        InstanceRequest::new(name, version, Topology::ShardedCluster(topology)).build(&self.env)
    }

    /// Build and create a standalone instance.
    pub async fn create_standalone(&self, name: &str, version: &str) -> OperatorResult<MongoDb> {
        let instance = self.standalone(name, version)?;
        self.create(&instance).await
    }

    /// Build and create a replica set.
    pub async fn create_replica_set(
        &self,
        name: &str,
        version: &str,
        members: i32,
    ) -> OperatorResult<MongoDb> {
        let instance = self.replica_set(name, version, members)?;
        self.create(&instance).await
    }

    /// Build and create a sharded cluster.
    pub async fn create_sharded_cluster(
        &self,
        name: &str,
        version: &str,
        topology: ShardedTopology,
    ) -> OperatorResult<MongoDb> {
        let instance = self.sharded_cluster(name, version, topology)?;
        self.create(&instance).await
    }

    /// Create a prebuilt instance.
    pub async fn create(&self, instance: &MongoDb) -> OperatorResult<MongoDb> {
        let created = self.client.create(instance).await?;
        tracing::info!(
            parent: &self.span,
            name = ?created.metadata.name,
            topology = ?created.spec.type_,
            version = %created.spec.version,
            "Created MongoDB instance"
        );
        Ok(created)
    }

    /// Fetch an instance.
    pub async fn get(&self, name: &str) -> OperatorResult<MongoDb> {
        self.client.get(name).await
    }

    /// List instances.
    pub async fn list(&self, selector: Option<&str>) -> OperatorResult<Vec<MongoDb>> {
        self.client.list(selector).await
    }

    /// Delete an instance.
    pub async fn delete(&self, name: &str) -> OperatorResult<()> {
        self.client.delete(name).await?;
        tracing::info!(parent: &self.span, name = %name, "Deleted MongoDB instance");
        Ok(())
    }

    /// Watch instances.
    pub async fn watch(&self, selector: Option<&str>) -> OperatorResult<EventStream<MongoDb>> {
        self.client.watch(selector).await
    }
}
