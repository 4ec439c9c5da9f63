//! dredd operator environment provisioner
//!
//! This crate prepares a Kubernetes cluster to run the MongoDB Enterprise
//! operator and manages `MongoDB` custom resources once it runs.
//!
//! # Platform resources
//!
//! Provisioning creates, in order: Namespace, ClusterRole, ServiceAccount,
//! ClusterRoleBinding, the Ops Manager project ConfigMap, the Ops Manager
//! credentials Secret and the operator Deployment. Decommissioning deletes
//! them in the exact reverse order. Both are idempotent and resumable.
//!
//! # Managed instances
//!
//! ```yaml
//! apiVersion: mongodb.com/v1
//! kind: MongoDB
//! metadata:
//!   name: my-sharded-cluster
//! spec:
//!   type: ShardedCluster
//!   version: 4.0.4
//!   credentials: dredd-om-credentials
//!   project: dredd-project
//!   shardCount: 2
//!   mongodsPerShardCount: 3
//!   mongosCount: 2
//!   configServerCount: 3
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod client;
pub mod config;
pub mod connection;
pub mod crd;
pub mod environment;
pub mod error;
pub mod instances;
pub mod observability;
pub mod platform;
pub mod provision;
pub mod resources;

pub use client::{CustomResourceClient, ResourceApi, ResourceEvent};
pub use crd::{MongoDb, MongoDbSpec, ShardedTopology, Topology};
pub use environment::EnvironmentConfig;
pub use error::{OperatorError, OperatorResult};
pub use instances::ManagedInstanceFacade;
pub use platform::{KubePlatformApi, PlatformApi};
pub use provision::{EnvironmentDecommissioner, EnvironmentProvisioner, ProvisionReport};
