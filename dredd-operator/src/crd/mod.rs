//! Custom Resource Definitions used by the dredd operator.
//!
//! - [`MongoDb`]: a managed MongoDB instance (standalone, replica set or
//!   sharded cluster)

mod mongodb;

pub use mongodb::{
    AdditionalMongodConfig, InstanceType, MongoDb, MongoDbSpec, MongoDbStatus, NetSpec,
    SecuritySpec, ShardedTopology, SslSpec, TlsSpec, Topology,
};

/// API group of the MongoDB custom resources.
pub const GROUP: &str = "mongodb.com";

/// API version of the MongoDB custom resources.
pub const VERSION: &str = "v1";
